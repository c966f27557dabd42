//! Runtime configuration.
//!
//! Configuration is read from environment variables (a `.env` file is loaded
//! by the binary before this runs):
//!
//! | Variable | Default |
//! |----------|---------|
//! | `LINGO_EXPORT_NAMESPACE` | [`defaults::EXPORT_NAMESPACE`] |
//! | `LINGO_PUBLIC_SERVER_ADDRESS` | [`defaults::PUBLIC_SERVER_ADDRESS`] |
//! | `LINGO_DEFAULT_LANGUAGE` | [`defaults::DEFAULT_LANGUAGE`] |
//! | `LINGO_SEARCH_TERM_SENSITIVITY` | [`defaults::SEARCH_TERM_SENSITIVITY`] |
//! | `LINGO_UNMAPPED_POLICY` | `skip` |
//! | `LINGO_EXPORT_DIR` | [`defaults::EXPORT_DIR`] |

use std::env;
use std::path::PathBuf;

use tracing::debug;

use crate::defaults;
use crate::error::{Error, Result};
use crate::models::UnmappedPolicy;

/// Settings shared by import, export and lifecycle runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LingoConfig {
    /// Prefix for exported subject IRIs; always ends with `/` or `#`.
    pub export_namespace: String,
    /// Substituted into newly created scheme URI templates.
    pub public_server_address: String,
    /// Language assumed for untagged literals.
    pub default_language: String,
    /// Base sensitivity for fuzzy search edit distances.
    pub search_term_sensitivity: usize,
    /// What to do with valuetypes and node aliases that have no mapping.
    pub unmapped_policy: UnmappedPolicy,
    /// Where exports are written when no explicit path is given.
    pub export_dir: PathBuf,
}

impl Default for LingoConfig {
    fn default() -> Self {
        Self {
            export_namespace: defaults::EXPORT_NAMESPACE.to_string(),
            public_server_address: defaults::PUBLIC_SERVER_ADDRESS.to_string(),
            default_language: defaults::DEFAULT_LANGUAGE.to_string(),
            search_term_sensitivity: defaults::SEARCH_TERM_SENSITIVITY,
            unmapped_policy: UnmappedPolicy::default(),
            export_dir: PathBuf::from(defaults::EXPORT_DIR),
        }
    }
}

impl LingoConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Self::default();

        let search_term_sensitivity = match lookup("LINGO_SEARCH_TERM_SENSITIVITY") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                Error::Config(format!(
                    "LINGO_SEARCH_TERM_SENSITIVITY must be a non-negative integer, got: {}",
                    raw
                ))
            })?,
            None => base.search_term_sensitivity,
        };

        let unmapped_policy = match lookup("LINGO_UNMAPPED_POLICY") {
            Some(raw) => raw.parse::<UnmappedPolicy>().map_err(Error::Config)?,
            None => base.unmapped_policy,
        };

        let config = Self {
            export_namespace: lookup("LINGO_EXPORT_NAMESPACE").unwrap_or(base.export_namespace),
            public_server_address: lookup("LINGO_PUBLIC_SERVER_ADDRESS")
                .unwrap_or(base.public_server_address),
            default_language: lookup("LINGO_DEFAULT_LANGUAGE").unwrap_or(base.default_language),
            search_term_sensitivity,
            unmapped_policy,
            export_dir: lookup("LINGO_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(base.export_dir),
        };

        config.validate()?;
        debug!(
            subsystem = "core",
            component = "config",
            export_namespace = %config.export_namespace,
            unmapped_policy = %config.unmapped_policy,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if !self.export_namespace.starts_with("http://")
            && !self.export_namespace.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "export namespace must start with http:// or https://, got: {}",
                self.export_namespace
            )));
        }
        if !self.export_namespace.ends_with('/') && !self.export_namespace.ends_with('#') {
            return Err(Error::Config(format!(
                "export namespace must end with '/' or '#', got: {}",
                self.export_namespace
            )));
        }
        if self.default_language.is_empty() {
            return Err(Error::Config(
                "default language cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The URI template assigned to a scheme that has none yet.
    pub fn default_uri_template(&self) -> String {
        format!(
            "{}{}",
            self.public_server_address.trim_end_matches('/'),
            defaults::URI_TEMPLATE_PATH
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = LingoConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, LingoConfig::default());
    }

    #[test]
    fn test_overrides_applied() {
        let config = LingoConfig::from_lookup(lookup_from(&[
            ("LINGO_EXPORT_NAMESPACE", "https://vocab.example.org/"),
            ("LINGO_DEFAULT_LANGUAGE", "de"),
            ("LINGO_SEARCH_TERM_SENSITIVITY", "5"),
            ("LINGO_UNMAPPED_POLICY", "reject"),
        ]))
        .unwrap();
        assert_eq!(config.export_namespace, "https://vocab.example.org/");
        assert_eq!(config.default_language, "de");
        assert_eq!(config.search_term_sensitivity, 5);
        assert_eq!(config.unmapped_policy, UnmappedPolicy::Reject);
    }

    #[test]
    fn test_bad_sensitivity_rejected() {
        let err = LingoConfig::from_lookup(lookup_from(&[(
            "LINGO_SEARCH_TERM_SENSITIVITY",
            "lots",
        )]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_namespace_must_be_terminated() {
        let err = LingoConfig::from_lookup(lookup_from(&[(
            "LINGO_EXPORT_NAMESPACE",
            "http://example.org/data",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("must end with"));
    }

    #[test]
    fn test_default_uri_template() {
        let config = LingoConfig {
            public_server_address: "https://lingo.example.org/".to_string(),
            ..LingoConfig::default()
        };
        assert_eq!(
            config.default_uri_template(),
            "https://lingo.example.org/schemes/<scheme_identifier>/concepts/<concept_identifier>"
        );
    }
}
