use crate::types::{FuzzConfig, DEFAULT_SUBTREE_PREFIX};

impl FuzzConfig {
    /// Apply default inference rules to the configuration.
    /// This mutates the config in place.
    pub fn apply_defaults(&mut self) {
        // 1. A single SUT mount doubles as its own alternate path
        if self.targets.alternate.is_none() {
            self.targets.alternate = self.targets.primary.clone();
        }

        // 2. Strip trailing slashes so subtree paths join cleanly
        for root in [
            &mut self.targets.reference,
            &mut self.targets.primary,
            &mut self.targets.alternate,
        ]
        .into_iter()
        .flatten()
        {
            *root = normalize_root(root.as_str());
        }

        // 3. Empty prefix falls back to the default one
        if self.run.subtree_prefix.trim().is_empty() {
            self.run.subtree_prefix = DEFAULT_SUBTREE_PREFIX.to_string();
        }

        // 4. Name lengths: an inverted range collapses to its lower bound
        if self.names.max_len < self.names.min_len {
            self.names.max_len = self.names.min_len;
        }
    }

    /// Returns a new config with all defaults applied.
    pub fn effective(&self) -> FuzzConfig {
        let mut config = self.clone();
        config.apply_defaults();
        config
    }
}

/// `/mnt/sut/` -> `/mnt/sut`, while `/` stays `/`.
fn normalize_root(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alternate_defaults_to_primary() {
        let mut config = FuzzConfig::default();
        config.targets.primary = Some("/mnt/sut".to_string());
        config.apply_defaults();
        assert_eq!(config.targets.alternate.as_deref(), Some("/mnt/sut"));
    }

    #[test]
    fn test_explicit_alternate_is_kept() {
        let mut config = FuzzConfig::default();
        config.targets.primary = Some("/mnt/sut".to_string());
        config.targets.alternate = Some("/mnt/other".to_string());
        config.apply_defaults();
        assert_eq!(config.targets.alternate.as_deref(), Some("/mnt/other"));
    }

    #[test]
    fn test_trailing_slashes_are_stripped() {
        let mut config = FuzzConfig::default();
        config.targets.reference = Some("/mnt/localfs/".to_string());
        config.targets.primary = Some("/".to_string());
        config.apply_defaults();
        assert_eq!(config.targets.reference.as_deref(), Some("/mnt/localfs"));
        assert_eq!(config.targets.primary.as_deref(), Some("/"));
    }

    #[test]
    fn test_blank_prefix_and_inverted_lengths() {
        let mut config = FuzzConfig::default();
        config.run.subtree_prefix = "  ".to_string();
        config.names.min_len = 10;
        config.names.max_len = 2;
        config.apply_defaults();
        assert_eq!(config.run.subtree_prefix, DEFAULT_SUBTREE_PREFIX);
        assert_eq!(config.names.max_len, 10);
    }
}
