//! Divergence reports: the terminal artifact of a failed run.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{ErrorKind, FsError};
use crate::ops::Action;
use crate::target::SutPath;

/// One side's outcome, type-erased for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Observed {
    Success { value: String },
    Failure { kind: ErrorKind, detail: String },
    /// What the directory tracker believed, for identity checks.
    Tracked { value: String },
}

impl Observed {
    pub fn success<T: fmt::Debug>(value: &T) -> Self {
        Observed::Success {
            value: format!("{:?}", value),
        }
    }

    pub fn failure(err: &FsError) -> Self {
        Observed::Failure {
            kind: err.kind,
            detail: err.to_string(),
        }
    }

    pub fn tracked<T: fmt::Debug>(value: &T) -> Self {
        Observed::Tracked {
            value: format!("{:?}", value),
        }
    }
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observed::Success { value } => write!(f, "success({})", value),
            Observed::Failure { kind, detail } => write!(f, "failure({}: {})", kind, detail),
            Observed::Tracked { value } => write!(f, "tracked({})", value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DivergenceReason {
    /// Both succeeded with different values.
    ValueMismatch,
    OnlySutFailed,
    OnlyReferenceFailed,
    /// Both failed, with different error kinds.
    DifferentErrorKind,
    /// Directory listings hold different name sets.
    ListingMismatch,
    /// The SUT reports a different inode for a tracked name.
    InodeChanged,
    /// A new hard link does not share the source's inode.
    LinkIdentity,
    /// Live targets agree with each other but not with the tracker.
    TrackerOutOfSync,
}

impl fmt::Display for DivergenceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DivergenceReason::ValueMismatch => "value mismatch",
            DivergenceReason::OnlySutFailed => "only the system under test failed",
            DivergenceReason::OnlyReferenceFailed => "only the reference failed",
            DivergenceReason::DifferentErrorKind => "different error kinds",
            DivergenceReason::ListingMismatch => "directory listings differ",
            DivergenceReason::InodeChanged => "inode changed",
            DivergenceReason::LinkIdentity => "hard link does not share its source inode",
            DivergenceReason::TrackerOutOfSync => "targets disagree with tracked state",
        };
        f.write_str(s)
    }
}

/// The oracle's negative verdict, before the driver attaches run context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub reason: DivergenceReason,
    pub reference: Observed,
    pub sut: Observed,
}

impl Mismatch {
    pub fn new(reason: DivergenceReason, reference: Observed, sut: Observed) -> Self {
        Mismatch {
            reason,
            reference,
            sut,
        }
    }
}

/// Everything needed to understand a divergence without re-running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DivergenceReport {
    /// 1-based iteration at which the run halted.
    pub iteration: usize,
    pub action: Action,
    pub args: BTreeMap<String, String>,
    pub access_path: SutPath,
    pub reference_dir: PathBuf,
    pub sut_dir: PathBuf,
    pub reason: DivergenceReason,
    pub reference: Observed,
    pub sut: Observed,
}

impl DivergenceReport {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_string())
    }
}

impl fmt::Display for DivergenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "divergence at action #{} ({}) via {} path: {}; args {:?}; {} got {}, {} got {}",
            self.iteration,
            self.action,
            self.access_path,
            self.reason,
            self.args,
            self.reference_dir.display(),
            self.reference,
            self.sut_dir.display(),
            self.sut
        )
    }
}
