use crate::types::{FuzzConfig, NamePolicyKind};
use crate::ConfigError;

/// Longest single path component accepted by common POSIX filesystems.
const NAME_MAX: usize = 255;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

impl FuzzConfig {
    /// Validate the configuration and return a list of errors.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        // Every root must be present and non-empty
        for (role, root) in [
            ("reference", &self.targets.reference),
            ("primary", &self.targets.primary),
            ("alternate", &self.targets.alternate),
        ] {
            match root {
                Some(path) if !path.trim().is_empty() => {}
                _ => errors.push(ConfigError::MissingTarget(role.to_string())),
            }
        }

        // The reference must not be one of the SUT paths
        if let Some(reference) = &self.targets.reference {
            for sut in [&self.targets.primary, &self.targets.alternate]
                .into_iter()
                .flatten()
            {
                if reference == sut {
                    errors.push(ConfigError::InvalidConfig(format!(
                        "reference root '{}' is also used as a system-under-test root",
                        reference
                    )));
                    break;
                }
            }
        }

        if self.run.iterations == 0 {
            errors.push(ConfigError::InvalidValue(
                "run.iterations".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        if self.run.instances == 0 {
            errors.push(ConfigError::InvalidValue(
                "run.instances".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        if let Some(subtree) = &self.run.subtree {
            if subtree.is_empty() || subtree.contains('/') || subtree == "." || subtree == ".." {
                errors.push(ConfigError::InvalidValue(
                    "run.subtree".to_string(),
                    format!("'{}' is not a single path component", subtree),
                ));
            }
            if self.run.instances > 1 {
                errors.push(ConfigError::InvalidConfig(
                    "a fixed run.subtree cannot be shared by several instances".to_string(),
                ));
            }
        }

        if self.run.subtree_prefix.contains('/') {
            errors.push(ConfigError::InvalidValue(
                "run.subtree_prefix".to_string(),
                "must not contain '/'".to_string(),
            ));
        }

        if self.names.min_len == 0 {
            errors.push(ConfigError::InvalidValue(
                "names.min_len".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        if self.names.min_len > self.names.max_len {
            errors.push(ConfigError::InvalidValue(
                "names.max_len".to_string(),
                format!(
                    "{} is shorter than names.min_len {}",
                    self.names.max_len, self.names.min_len
                ),
            ));
        }

        if self.names.max_len > NAME_MAX {
            errors.push(ConfigError::InvalidValue(
                "names.max_len".to_string(),
                format!("must not exceed {}", NAME_MAX),
            ));
        }

        if self.names.policy == NamePolicyKind::Weighted && self.names.fresh_weight == 0 {
            // Without fresh names nothing is ever created.
            errors.push(ConfigError::InvalidValue(
                "names.fresh_weight".to_string(),
                "must be positive with the weighted policy".to_string(),
            ));
        }

        if self.io.write_size == 0 {
            errors.push(ConfigError::InvalidValue(
                "io.write_size".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            errors.push(ConfigError::InvalidValue(
                "logging.level".to_string(),
                format!("'{}' is not one of {:?}", self.logging.level, LOG_LEVELS),
            ));
        }

        errors
    }

    /// Validate and return Ok(()) if valid, or Err with the first error.
    pub fn validate_or_err(&self) -> Result<(), ConfigError> {
        match self.validate().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
