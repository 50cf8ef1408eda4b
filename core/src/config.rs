//! Pipeline configuration.
//!
//! [`MvcOptions`] gathers the switches the pipeline consults at request time.
//! Options are built once at startup, either programmatically through the
//! builder or from `MVC_*` environment variables, and shared by reference.
//!
//! # Example
//!
//! ```no_run
//! use composable_mvc_core::config::MvcOptions;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = MvcOptions::from_env()?;
//! println!("request validation: {}", options.request_validation);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed
    #[error("Failed to parse {var}: {message}")]
    Parse {
        /// Variable name
        var: String,
        /// Parser message
        message: String,
    },
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// Switches consulted by the action pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MvcOptions {
    /// Reject form and query values that look like markup unless a field opts out
    pub request_validation: bool,
    /// Add an implicit `Required` validator to non-nullable value kinds
    pub implicit_required_for_value_types: bool,
    /// Produce client validation rules for rendering layers
    pub client_validation: bool,
    /// Sliding window for remembered view locations, in seconds (0 disables caching)
    pub view_location_cache_secs: u64,
    /// File extension probed by the template view engine
    pub view_file_extension: String,
    /// Largest request body the web adapter will buffer, in bytes
    pub max_body_bytes: usize,
}

impl Default for MvcOptions {
    fn default() -> Self {
        Self {
            request_validation: true,
            implicit_required_for_value_types: true,
            client_validation: true,
            view_location_cache_secs: 900,
            view_file_extension: "html".to_string(),
            max_body_bytes: 4 * 1024 * 1024,
        }
    }
}

impl MvcOptions {
    /// Create a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> MvcOptionsBuilder {
        MvcOptionsBuilder {
            options: Self::default(),
        }
    }

    /// Load options from `MVC_*` environment variables, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed, or the
    /// resulting options fail [`MvcOptions::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load options through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`MvcOptions::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let options = Self {
            request_validation: parse_var(&lookup, "MVC_REQUEST_VALIDATION")?
                .unwrap_or(defaults.request_validation),
            implicit_required_for_value_types: parse_var(&lookup, "MVC_IMPLICIT_REQUIRED")?
                .unwrap_or(defaults.implicit_required_for_value_types),
            client_validation: parse_var(&lookup, "MVC_CLIENT_VALIDATION")?
                .unwrap_or(defaults.client_validation),
            view_location_cache_secs: parse_var(&lookup, "MVC_VIEW_LOCATION_CACHE_SECS")?
                .unwrap_or(defaults.view_location_cache_secs),
            view_file_extension: lookup("MVC_VIEW_FILE_EXTENSION")
                .unwrap_or(defaults.view_file_extension),
            max_body_bytes: parse_var(&lookup, "MVC_MAX_BODY_BYTES")?
                .unwrap_or(defaults.max_body_bytes),
        };
        options.validate()?;
        Ok(options)
    }

    /// Validate option values.
    ///
    /// # Errors
    ///
    /// Returns error if the view extension is empty or contains a dot, or the
    /// body limit is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.view_file_extension.is_empty() || self.view_file_extension.contains('.') {
            return Err(ConfigError::Validation(
                "view_file_extension must be a bare extension such as `html`".to_string(),
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Validation(
                "max_body_bytes must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// The view location cache window, or `None` when caching is disabled.
    #[must_use]
    pub const fn view_location_cache_window(&self) -> Option<Duration> {
        if self.view_location_cache_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.view_location_cache_secs))
        }
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Parse {
                var: name.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

/// Builder for [`MvcOptions`].
#[derive(Debug, Clone)]
pub struct MvcOptionsBuilder {
    options: MvcOptions,
}

impl MvcOptionsBuilder {
    /// Enable or disable request validation.
    #[must_use]
    pub const fn request_validation(mut self, enabled: bool) -> Self {
        self.options.request_validation = enabled;
        self
    }

    /// Enable or disable implicit `Required` validators for value kinds.
    #[must_use]
    pub const fn implicit_required_for_value_types(mut self, enabled: bool) -> Self {
        self.options.implicit_required_for_value_types = enabled;
        self
    }

    /// Enable or disable client validation rule generation.
    #[must_use]
    pub const fn client_validation(mut self, enabled: bool) -> Self {
        self.options.client_validation = enabled;
        self
    }

    /// Set the view location cache window in seconds.
    #[must_use]
    pub const fn view_location_cache_secs(mut self, secs: u64) -> Self {
        self.options.view_location_cache_secs = secs;
        self
    }

    /// Set the file extension probed by template view engines.
    #[must_use]
    pub fn view_file_extension(mut self, extension: impl Into<String>) -> Self {
        self.options.view_file_extension = extension.into();
        self
    }

    /// Set the request body limit for the web adapter.
    #[must_use]
    pub const fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.options.max_body_bytes = bytes;
        self
    }

    /// Build and validate the options.
    ///
    /// # Errors
    ///
    /// See [`MvcOptions::validate`].
    pub fn build(self) -> Result<MvcOptions, ConfigError> {
        self.options.validate()?;
        Ok(self.options)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let options = MvcOptions::from_lookup(lookup(&[])).unwrap();
        assert_eq!(options, MvcOptions::default());
    }

    #[test]
    fn test_env_overrides() {
        let options = MvcOptions::from_lookup(lookup(&[
            ("MVC_REQUEST_VALIDATION", "false"),
            ("MVC_VIEW_LOCATION_CACHE_SECS", "0"),
            ("MVC_VIEW_FILE_EXTENSION", "tera"),
        ]))
        .unwrap();
        assert!(!options.request_validation);
        assert_eq!(options.view_location_cache_window(), None);
        assert_eq!(options.view_file_extension, "tera");
    }

    #[test]
    fn test_parse_error_names_variable() {
        let err = MvcOptions::from_lookup(lookup(&[("MVC_MAX_BODY_BYTES", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref var, .. } if var == "MVC_MAX_BODY_BYTES"));
    }

    #[test]
    fn test_builder_rejects_dotted_extension() {
        let err = MvcOptions::builder()
            .view_file_extension(".html")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
