mod defaults;
mod env;
pub mod types;
mod validation;

use std::path::Path;

pub use types::*;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Missing environment variables: {0:?}")]
    MissingEnvVars(Vec<String>),

    #[error("No '{0}' root configured. Set targets.{0} or pass --{0}.")]
    MissingTarget(String),

    #[error("Invalid value for '{0}': {1}")]
    InvalidValue(String, String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FuzzConfig {
    /// Parse a fuzzer configuration from a YAML string.
    /// `${VAR}` and `${VAR:-fallback}` references are interpolated first.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let interpolated = env::interpolate_env(yaml)?;
        let config: FuzzConfig = serde_yaml::from_str(&interpolated)?;
        Ok(config)
    }

    /// Load a fuzzer configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Render the configuration back to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
targets:
  reference: /mnt/localfs
  primary: /mnt/sut
  alternate: /mnt/sut-alt
"#;

        let config = FuzzConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.targets.reference.as_deref(), Some("/mnt/localfs"));
        assert_eq!(config.targets.primary.as_deref(), Some("/mnt/sut"));
        assert_eq!(config.targets.alternate.as_deref(), Some("/mnt/sut-alt"));
        assert_eq!(config.run, RunConfig::default());
        assert_eq!(config.names, NamesConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
targets:
  reference: /mnt/localfs
  primary: /mnt/sut
run:
  iterations: 25
  instances: 4
  seed: 99
  subtree_prefix: fuzz_
names:
  policy: weighted
  reuse_weight: 5
  fresh_weight: 2
  min_len: 4
  max_len: 8
io:
  read_size: 64
  write_size: 32
logging:
  level: debug
  format: json
"#;

        let config = FuzzConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.run.iterations, 25);
        assert_eq!(config.run.instances, 4);
        assert_eq!(config.run.seed, Some(99));
        assert_eq!(config.run.subtree_prefix, "fuzz_");
        assert_eq!(config.names.policy, NamePolicyKind::Weighted);
        assert_eq!(config.names.reuse_weight, 5);
        assert_eq!(config.io.read_size, 64);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.effective().validate().is_empty());
    }

    #[test]
    fn test_parse_with_env_vars() {
        std::env::set_var("DIRFUZZ_TEST_REFERENCE_ROOT", "/tmp/reference");

        let yaml = r#"
targets:
  reference: ${DIRFUZZ_TEST_REFERENCE_ROOT}
  primary: ${DIRFUZZ_TEST_UNSET_PRIMARY:-/tmp/sut}
"#;

        let config = FuzzConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.targets.reference.as_deref(), Some("/tmp/reference"));
        assert_eq!(config.targets.primary.as_deref(), Some("/tmp/sut"));
    }

    #[test]
    fn test_effective_config() {
        let yaml = r#"
targets:
  reference: /mnt/localfs
  primary: /mnt/sut
"#;

        let config = FuzzConfig::from_yaml(yaml).unwrap();
        let effective = config.effective();

        assert_eq!(effective.targets.alternate.as_deref(), Some("/mnt/sut"));
        assert!(effective.validate().is_empty());
    }

    #[test]
    fn test_yaml_round_trip_keeps_values() {
        let mut config = FuzzConfig::default();
        config.targets.reference = Some("/a".to_string());
        config.targets.primary = Some("/b".to_string());
        config.run.seed = Some(7);

        let yaml = config.to_yaml().unwrap();
        let parsed = FuzzConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        let yaml = r#"
names:
  policy: sometimes
"#;
        assert!(matches!(
            FuzzConfig::from_yaml(yaml),
            Err(ConfigError::YamlError(_))
        ));
    }
}
