//! Applying an [`Op`] to both targets through the oracle, plus the identity
//! and tracker checks each action owes on success.

use std::path::Path;

use tracing::debug;

use crate::oracle::{compare, decide, Agreed};
use crate::ops::Op;
use crate::posix;
use crate::report::{DivergenceReason, Mismatch, Observed};
use crate::target::{SutPath, Targets};
use crate::tracker::{DirectoryTracker, EntryKind};

/// Mirror `op` on the reference and on the SUT reached through `path`.
///
/// The tracker is only touched once both targets agreed on a success.
pub fn apply(
    op: &Op,
    targets: &Targets,
    path: SutPath,
    tracker: &mut DirectoryTracker,
) -> Result<Agreed<()>, Mismatch> {
    let reference = targets.reference.as_path();
    let sut = targets.sut(path);

    let agreed = match op {
        Op::List => list(reference, sut, tracker)?,
        Op::CreateFile { name } => {
            let agreed = compare(reference, sut, op, |dir| posix::mknod(&dir.join(name)))?;
            if agreed.is_success() {
                record_created(sut, name, EntryKind::File, tracker)?;
            }
            agreed
        }
        Op::CreateDir { name } => {
            let agreed = compare(reference, sut, op, |dir| posix::mkdir(&dir.join(name)))?;
            if agreed.is_success() {
                record_created(sut, name, EntryKind::Directory, tracker)?;
            }
            agreed
        }
        Op::RemoveFile { name } => {
            let agreed = compare(reference, sut, op, |dir| posix::unlink(&dir.join(name)))?;
            if agreed.is_success() {
                tracker.remove(name);
            }
            agreed
        }
        Op::RemoveDir { name } => {
            let agreed = compare(reference, sut, op, |dir| posix::rmdir(&dir.join(name)))?;
            if agreed.is_success() {
                tracker.remove(name);
            }
            agreed
        }
        Op::HardLink { source, link } => {
            let agreed = compare(reference, sut, op, |dir| {
                posix::link(&dir.join(source), &dir.join(link))
            })?;
            if agreed.is_success() {
                check_link(sut, source, link, tracker)?;
            }
            agreed
        }
        Op::Stat { name } => {
            let agreed = compare(reference, sut, op, |dir| posix::stat(&dir.join(name)))?;
            if let Agreed::Success(summary) = &agreed {
                check_identity(sut, name, summary.kind, tracker)?;
            }
            erase(agreed)
        }
        Op::Access { name, mode } => {
            compare(reference, sut, op, |dir| posix::access(&dir.join(name), *mode))?
        }
        Op::Chmod { name, mode } => {
            compare(reference, sut, op, |dir| posix::chmod(&dir.join(name), *mode))?
        }
        Op::OpenReadWriteClose {
            name,
            read_len,
            buf,
        } => erase(compare(reference, sut, op, |dir| {
            posix::open_read_write_close(&dir.join(name), *read_len, buf)
        })?),
    };
    Ok(agreed)
}

fn erase<T>(agreed: Agreed<T>) -> Agreed<()> {
    match agreed {
        Agreed::Success(_) => Agreed::Success(()),
        Agreed::Failure(kind) => Agreed::Failure(kind),
    }
}

/// Compare both live listings, then the agreed listing with the tracker.
fn list(reference: &Path, sut: &Path, tracker: &DirectoryTracker) -> Result<Agreed<()>, Mismatch> {
    let agreed = decide(posix::list_names(reference), posix::list_names(sut)).map_err(|m| {
        if m.reason == DivergenceReason::ValueMismatch {
            Mismatch {
                reason: DivergenceReason::ListingMismatch,
                ..m
            }
        } else {
            m
        }
    })?;
    if let Agreed::Success(names) = &agreed {
        debug!(count = names.len(), "Listings agree");
        let tracked = tracker.name_set();
        if *names != tracked {
            return Err(Mismatch::new(
                DivergenceReason::TrackerOutOfSync,
                Observed::tracked(&tracked),
                Observed::success(names),
            ));
        }
    }
    Ok(erase(agreed))
}

/// SUT inode of `name`. Failing to stat a name both targets just agreed on
/// counts against the SUT.
fn sut_inode(sut: &Path, name: &str) -> Result<u64, Mismatch> {
    posix::inode(&sut.join(name)).map_err(|err| {
        Mismatch::new(
            DivergenceReason::InodeChanged,
            Observed::tracked(&name),
            Observed::failure(&err),
        )
    })
}

fn record_created(
    sut: &Path,
    name: &str,
    kind: EntryKind,
    tracker: &mut DirectoryTracker,
) -> Result<(), Mismatch> {
    let inode = sut_inode(sut, name)?;
    if let Some(previous) = tracker.get(name) {
        // Both targets accepted a create over a name we believed existed.
        return Err(Mismatch::new(
            DivergenceReason::TrackerOutOfSync,
            Observed::tracked(previous),
            Observed::success(&name),
        ));
    }
    tracker.insert(name, kind, inode);
    Ok(())
}

fn check_link(
    sut: &Path,
    source: &str,
    link: &str,
    tracker: &mut DirectoryTracker,
) -> Result<(), Mismatch> {
    let inode = sut_inode(sut, link)?;
    let source_inode = match tracker.get(source) {
        Some(entry) => entry.inode,
        None => {
            return Err(Mismatch::new(
                DivergenceReason::TrackerOutOfSync,
                Observed::tracked(&format!("{} absent", source)),
                Observed::success(&format!("linked {} -> {}", source, link)),
            ))
        }
    };
    if inode != source_inode {
        return Err(Mismatch::new(
            DivergenceReason::LinkIdentity,
            Observed::tracked(&source_inode),
            Observed::success(&inode),
        ));
    }
    tracker.insert(link, EntryKind::File, inode);
    Ok(())
}

/// A stat both targets agreed on must hit a tracked entry of the same kind
/// whose SUT inode has not changed since creation.
fn check_identity(
    sut: &Path,
    name: &str,
    kind: EntryKind,
    tracker: &DirectoryTracker,
) -> Result<(), Mismatch> {
    let Some(entry) = tracker.get(name) else {
        return Err(Mismatch::new(
            DivergenceReason::TrackerOutOfSync,
            Observed::tracked(&format!("{} absent", name)),
            Observed::success(&kind),
        ));
    };
    if entry.kind != kind {
        return Err(Mismatch::new(
            DivergenceReason::TrackerOutOfSync,
            Observed::tracked(&entry.kind),
            Observed::success(&kind),
        ));
    }
    let inode = sut_inode(sut, name)?;
    if inode != entry.inode {
        return Err(Mismatch::new(
            DivergenceReason::InodeChanged,
            Observed::tracked(&entry.inode),
            Observed::success(&inode),
        ));
    }
    Ok(())
}
