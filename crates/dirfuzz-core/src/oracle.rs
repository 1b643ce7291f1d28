//! The equivalence oracle: run one operation on the reference and on the
//! system under test, then decide whether the two outcomes agree.

use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::error::{ErrorKind, FsError};
use crate::ops::Op;
use crate::report::{DivergenceReason, Mismatch, Observed};

/// An outcome both targets agreed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Agreed<T> {
    /// Both succeeded with equal values; holds the SUT value.
    Success(T),
    /// Both failed with the same error kind.
    Failure(ErrorKind),
}

impl<T> Agreed<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Agreed::Success(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            Agreed::Success(value) => Some(value),
            Agreed::Failure(_) => None,
        }
    }
}

/// Execute `f` against `reference` and then against `sut`, always both, and
/// apply the decision table. Error details are not compared since they embed
/// target-specific paths.
pub fn compare<T, F>(reference: &Path, sut: &Path, op: &Op, f: F) -> Result<Agreed<T>, Mismatch>
where
    T: PartialEq + fmt::Debug,
    F: Fn(&Path) -> Result<T, FsError>,
{
    debug!(action = %op.action(), args = ?op.args(), "Comparing operation");
    let on_reference = f(reference);
    let on_sut = f(sut);
    decide(on_reference, on_sut)
}

/// The decision table on two captured outcomes.
pub fn decide<T>(
    reference: Result<T, FsError>,
    sut: Result<T, FsError>,
) -> Result<Agreed<T>, Mismatch>
where
    T: PartialEq + fmt::Debug,
{
    match (reference, sut) {
        (Ok(r), Ok(s)) if r == s => Ok(Agreed::Success(s)),
        (Ok(r), Ok(s)) => Err(Mismatch::new(
            DivergenceReason::ValueMismatch,
            Observed::success(&r),
            Observed::success(&s),
        )),
        (Ok(r), Err(s)) => Err(Mismatch::new(
            DivergenceReason::OnlySutFailed,
            Observed::success(&r),
            Observed::failure(&s),
        )),
        (Err(r), Ok(s)) => Err(Mismatch::new(
            DivergenceReason::OnlyReferenceFailed,
            Observed::failure(&r),
            Observed::success(&s),
        )),
        (Err(r), Err(s)) if r.kind == s.kind => Ok(Agreed::Failure(s.kind)),
        (Err(r), Err(s)) => Err(Mismatch::new(
            DivergenceReason::DifferentErrorKind,
            Observed::failure(&r),
            Observed::failure(&s),
        )),
    }
}
