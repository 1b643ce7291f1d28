pub mod actions;
pub mod choice;
pub mod driver;
pub mod error;
pub mod ops;
pub mod oracle;
pub mod posix;
pub mod report;
pub mod target;
pub mod tracker;

pub use choice::{NamePicker, NamePolicy};
pub use driver::{ActionCounts, Fuzzer, RunState, RunSummary};
pub use error::{ErrorKind, FsError, FuzzError, SetupError};
pub use ops::{Action, IoSizes, Op};
pub use oracle::Agreed;
pub use report::{DivergenceReason, DivergenceReport, Mismatch, Observed};
pub use target::{Roots, SutPath, Targets};
pub use tracker::{DirectoryEntry, DirectoryTracker, EntryKind};
