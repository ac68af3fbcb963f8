//! Configuration loading and validation through the public API.

use images::test_support::EnvGuard;
use images::{AwsConfig, AwsImages, ConfigError, ConfigOverrides, ProviderError};
use rstest::rstest;

const ENV_KEYS: [&str; 4] = [
    "IMAGES_AWS_REGION",
    "IMAGES_AWS_REGION_EXCLUDE",
    "IMAGES_AWS_ACCESS_KEY",
    "IMAGES_AWS_SECRET_KEY",
];

#[tokio::test]
async fn environment_values_are_loaded() {
    let _guard = EnvGuard::set_vars(&[
        ("IMAGES_AWS_REGION", Some("us-east-1,eu-west-1")),
        ("IMAGES_AWS_REGION_EXCLUDE", Some("eu-west-1")),
        ("IMAGES_AWS_ACCESS_KEY", Some("AKIDEXAMPLE")),
        ("IMAGES_AWS_SECRET_KEY", Some("SECRETEXAMPLE")),
    ])
    .await;

    let config = AwsConfig::load_without_cli_args().expect("configuration should load");

    assert_eq!(config.region, "us-east-1,eu-west-1");
    assert_eq!(config.region_exclude(), "eu-west-1");
    assert_eq!(config.access_key, "AKIDEXAMPLE");
    assert_eq!(config.secret_key, "SECRETEXAMPLE");
    assert_eq!(config.validate(), Ok(()));
}

#[tokio::test]
async fn missing_environment_yields_actionable_region_error() {
    let cleared: Vec<(&str, Option<&str>)> = ENV_KEYS.iter().map(|key| (*key, None)).collect();
    let _guard = EnvGuard::set_vars(&cleared).await;

    let config = AwsConfig::load_without_cli_args().expect("defaults should load");
    let err = config.validate().expect_err("region should be required");

    let ConfigError::MissingField(ref message) = err else {
        panic!("expected MissingField, got {err:?}");
    };
    assert!(message.contains("IMAGES_AWS_REGION"), "{message}");
    assert!(message.contains("images.toml"), "{message}");
}

#[tokio::test]
async fn cli_overrides_take_precedence_over_environment() {
    let _guard = EnvGuard::set_vars(&[
        ("IMAGES_AWS_REGION", Some("us-east-1")),
        ("IMAGES_AWS_REGION_EXCLUDE", None),
        ("IMAGES_AWS_ACCESS_KEY", Some("FROM_ENV")),
        ("IMAGES_AWS_SECRET_KEY", Some("FROM_ENV")),
    ])
    .await;

    let config = AwsConfig::load_without_cli_args()
        .expect("configuration should load")
        .with_overrides(ConfigOverrides {
            access_key: Some(String::from("FROM_FLAG")),
            ..ConfigOverrides::default()
        });

    assert_eq!(config.access_key, "FROM_FLAG");
    assert_eq!(config.secret_key, "FROM_ENV");
    assert_eq!(config.region, "us-east-1");
}

#[rstest]
#[case("", "AKID", "secret", "AWS region")]
#[case("us-east-1", "", "secret", "AWS access key")]
#[case("us-east-1", "AKID", "", "AWS secret key")]
fn provider_refuses_incomplete_credentials(
    #[case] region: &str,
    #[case] access_key: &str,
    #[case] secret_key: &str,
    #[case] expected: &str,
) {
    let config = AwsConfig {
        region: region.to_owned(),
        region_exclude: None,
        access_key: access_key.to_owned(),
        secret_key: secret_key.to_owned(),
    };

    let err = AwsImages::new(&config).expect_err("incomplete config should fail");

    assert!(matches!(err, ProviderError::Config(_)), "{err:?}");
    assert!(err.to_string().contains(expected), "{err}");
}
