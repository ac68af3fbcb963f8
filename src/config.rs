//! Configuration loading via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::ec2::StaticCredentials;

/// AWS configuration derived from environment variables, configuration
/// files, and CLI flags.
///
/// Required values default to empty strings so that [`AwsConfig::validate`]
/// reports them with actionable messages instead of a loader error.
#[derive(Clone, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "IMAGES_AWS")]
pub struct AwsConfig {
    /// Comma separated regions to operate on, or `all`.
    #[ortho_config(default = String::new())]
    pub region: String,
    /// Comma separated regions to skip, or `all`.
    pub region_exclude: Option<String>,
    /// Access key id used to sign requests.
    #[ortho_config(default = String::new())]
    pub access_key: String,
    /// Secret access key used to sign requests.
    #[ortho_config(default = String::new())]
    pub secret_key: String,
}

impl std::fmt::Debug for AwsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsConfig")
            .field("region", &self.region)
            .field("region_exclude", &self.region_exclude)
            .field("access_key", &self.access_key)
            .field("secret_key", &"** redacted **")
            .finish()
    }
}

/// Command-line values that take precedence over loaded configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConfigOverrides {
    /// Replacement for [`AwsConfig::region`].
    pub region: Option<String>,
    /// Replacement for [`AwsConfig::region_exclude`].
    pub region_exclude: Option<String>,
    /// Replacement for [`AwsConfig::access_key`].
    pub access_key: Option<String>,
    /// Replacement for [`AwsConfig::secret_key`].
    pub secret_key: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    flag: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        flag: &'static str,
        toml_key: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            flag,
            toml_key,
        }
    }
}

impl AwsConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "{} is not set: pass {}, set {}, or add {} to images.toml",
                metadata.description, metadata.flag, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("images")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies command-line overrides on top of the loaded values.
    #[must_use]
    pub fn with_overrides(self, overrides: ConfigOverrides) -> Self {
        Self {
            region: overrides.region.unwrap_or(self.region),
            region_exclude: overrides.region_exclude.or(self.region_exclude),
            access_key: overrides.access_key.unwrap_or(self.access_key),
            secret_key: overrides.secret_key.unwrap_or(self.secret_key),
        }
    }

    /// Exclusion list, empty when unset.
    #[must_use]
    pub fn region_exclude(&self) -> &str {
        self.region_exclude.as_deref().unwrap_or_default()
    }

    /// Credentials shared by every regional client.
    #[must_use]
    pub fn credentials(&self) -> StaticCredentials {
        StaticCredentials::new(self.access_key.trim(), self.secret_key.trim())
    }

    /// Checks that region, access key and secret key are present. Error
    /// messages name the flag, environment variable and file key to set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] for the first blank field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.region,
            &FieldMetadata::new(
                "AWS region",
                "IMAGES_AWS_REGION",
                "--region",
                "region",
            ),
        )?;
        Self::require_field(
            &self.access_key,
            &FieldMetadata::new(
                "AWS access key",
                "IMAGES_AWS_ACCESS_KEY",
                "--access-key",
                "access_key",
            ),
        )?;
        Self::require_field(
            &self.secret_key,
            &FieldMetadata::new(
                "AWS secret key",
                "IMAGES_AWS_SECRET_KEY",
                "--secret-key",
                "secret_key",
            ),
        )?;
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn valid_config() -> AwsConfig {
        AwsConfig {
            region: String::from("us-east-1,eu-west-1"),
            region_exclude: None,
            access_key: String::from("AKIDEXAMPLE"),
            secret_key: String::from("SECRETEXAMPLE"),
        }
    }

    #[rstest]
    fn valid_config_passes(valid_config: AwsConfig) {
        assert_eq!(valid_config.validate(), Ok(()));
    }

    #[rstest]
    #[case::region(|cfg: &mut AwsConfig| cfg.region.clear(), "IMAGES_AWS_REGION", "--region")]
    #[case::access_key(
        |cfg: &mut AwsConfig| cfg.access_key = String::from("  "),
        "IMAGES_AWS_ACCESS_KEY",
        "--access-key"
    )]
    #[case::secret_key(
        |cfg: &mut AwsConfig| cfg.secret_key.clear(),
        "IMAGES_AWS_SECRET_KEY",
        "--secret-key"
    )]
    fn missing_fields_produce_actionable_errors(
        valid_config: AwsConfig,
        #[case] mutate: fn(&mut AwsConfig),
        #[case] env_var: &str,
        #[case] flag: &str,
    ) {
        let mut cfg = valid_config;
        mutate(&mut cfg);

        let err = cfg.validate().expect_err("validation should fail");
        let ConfigError::MissingField(ref message) = err else {
            panic!("expected MissingField, got {err:?}");
        };
        assert!(message.contains(env_var), "{message}");
        assert!(message.contains(flag), "{message}");
    }

    #[rstest]
    fn region_is_checked_before_credentials() {
        let cfg = AwsConfig {
            region: String::new(),
            region_exclude: None,
            access_key: String::new(),
            secret_key: String::new(),
        };
        let err = cfg.validate().expect_err("validation should fail");
        assert!(err.to_string().contains("AWS region"), "{err}");
    }

    #[rstest]
    fn overrides_replace_only_given_values(valid_config: AwsConfig) {
        let merged = valid_config.with_overrides(ConfigOverrides {
            region: Some(String::from("all")),
            region_exclude: Some(String::from("us-west-2")),
            ..ConfigOverrides::default()
        });
        assert_eq!(merged.region, "all");
        assert_eq!(merged.region_exclude(), "us-west-2");
        assert_eq!(merged.access_key, "AKIDEXAMPLE");
        assert_eq!(merged.secret_key, "SECRETEXAMPLE");
    }

    #[rstest]
    fn debug_output_redacts_secret(valid_config: AwsConfig) {
        let rendered = format!("{valid_config:?}");
        assert!(!rendered.contains("SECRETEXAMPLE"), "{rendered}");
    }
}
