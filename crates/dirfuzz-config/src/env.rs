use regex::{Captures, Regex};
use std::env;

use crate::ConfigError;

/// Interpolate environment variables in a string.
///
/// `${VAR}` is replaced by the value of `VAR`; `${VAR:-fallback}` uses
/// `fallback` when `VAR` is unset or empty. Every unresolved `${VAR}` is
/// collected into a single `MissingEnvVars` error.
pub fn interpolate_env(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;

    let mut missing = Vec::new();
    let result = re.replace_all(input, |cap: &Captures| {
        let var_name = &cap[1];
        match env::var(var_name) {
            Ok(value) if !value.is_empty() => value,
            _ => match cap.get(2) {
                Some(fallback) => fallback.as_str().to_string(),
                None => {
                    if !missing.iter().any(|m| m == var_name) {
                        missing.push(var_name.to_string());
                    }
                    String::new()
                }
            },
        }
    });

    if !missing.is_empty() {
        return Err(ConfigError::MissingEnvVars(missing));
    }

    Ok(result.into_owned())
}
