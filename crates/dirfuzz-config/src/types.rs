use serde::{Deserialize, Serialize};

/// Default prefix of the per-instance directory created under every root.
pub const DEFAULT_SUBTREE_PREFIX: &str = "dir_leases_directory_";

/// Top-level fuzzer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FuzzConfig {
    /// Filesystem roots to compare.
    pub targets: TargetsConfig,

    /// Iteration budget, parallelism and seeding.
    pub run: RunConfig,

    /// How entry names are chosen for each action.
    pub names: NamesConfig,

    /// Buffer sizes for the open-read-write-close action.
    pub io: IoConfig,

    /// Log level and format.
    pub logging: LoggingConfig,
}

/// The three roots: the reference filesystem and two mount paths of the
/// filesystem under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TargetsConfig {
    /// Ground-truth filesystem root (e.g. a local ext4 directory).
    pub reference: Option<String>,

    /// First mount path of the filesystem under test.
    pub primary: Option<String>,

    /// Second mount path of the same filesystem under test. Falls back to
    /// `primary` when omitted.
    pub alternate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of actions each instance executes.
    pub iterations: usize,

    /// Number of independent fuzzer processes.
    pub instances: usize,

    /// PRNG seed; a random one is drawn when absent.
    pub seed: Option<u64>,

    /// Prefix for generated subtree names.
    pub subtree_prefix: String,

    /// Fixed subtree name; overrides the generated one.
    pub subtree: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            iterations: 1000,
            instances: 1,
            seed: None,
            subtree_prefix: DEFAULT_SUBTREE_PREFIX.to_string(),
            subtree: None,
        }
    }
}

/// Argument choice policy for actions that take an entry name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NamePolicyKind {
    /// Uniform over every tracked name plus one fresh name.
    #[default]
    Uniform,
    /// Tracked vs. fresh decided by `reuse_weight` / `fresh_weight`.
    Weighted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamesConfig {
    pub policy: NamePolicyKind,
    pub reuse_weight: u32,
    pub fresh_weight: u32,
    /// Shortest fresh name, inclusive.
    pub min_len: usize,
    /// Longest fresh name, inclusive.
    pub max_len: usize,
}

impl Default for NamesConfig {
    fn default() -> Self {
        NamesConfig {
            policy: NamePolicyKind::Uniform,
            reuse_weight: 3,
            fresh_weight: 1,
            min_len: 3,
            max_len: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Maximum bytes read by one open-read-write-close action.
    pub read_size: usize,
    /// Bytes written by one open-read-write-close action.
    pub write_size: usize,
}

impl Default for IoConfig {
    fn default() -> Self {
        IoConfig {
            read_size: 100,
            write_size: 100,
        }
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error or off
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}
