use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::Serialize;

use crate::choice::{random_buf, NamePicker};
use crate::posix::AccessMode;
use crate::tracker::DirectoryTracker;

/// The closed catalog of filesystem actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    List,
    CreateFile,
    RemoveFile,
    CreateDir,
    RemoveDir,
    HardLink,
    Stat,
    Access,
    Chmod,
    OpenReadWriteClose,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::List,
        Action::CreateFile,
        Action::RemoveFile,
        Action::CreateDir,
        Action::RemoveDir,
        Action::HardLink,
        Action::Stat,
        Action::Access,
        Action::Chmod,
        Action::OpenReadWriteClose,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Action::List => "list",
            Action::CreateFile => "create-file",
            Action::RemoveFile => "remove-file",
            Action::CreateDir => "create-dir",
            Action::RemoveDir => "remove-dir",
            Action::HardLink => "hard-link",
            Action::Stat => "stat",
            Action::Access => "access",
            Action::Chmod => "chmod",
            Action::OpenReadWriteClose => "open-read-write-close",
        }
    }

    /// Uniform choice over the catalog.
    pub fn choose<R: Rng>(rng: &mut R) -> Action {
        Action::ALL[rng.gen_range(0..Action::ALL.len())]
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An action with concrete arguments, ready to be mirrored on both targets.
/// Names are relative to the fuzzing subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    List,
    CreateFile { name: String },
    RemoveFile { name: String },
    CreateDir { name: String },
    RemoveDir { name: String },
    HardLink { source: String, link: String },
    Stat { name: String },
    Access { name: String, mode: AccessMode },
    Chmod { name: String, mode: u32 },
    OpenReadWriteClose { name: String, read_len: usize, buf: Vec<u8> },
}

impl Op {
    pub fn action(&self) -> Action {
        match self {
            Op::List => Action::List,
            Op::CreateFile { .. } => Action::CreateFile,
            Op::RemoveFile { .. } => Action::RemoveFile,
            Op::CreateDir { .. } => Action::CreateDir,
            Op::RemoveDir { .. } => Action::RemoveDir,
            Op::HardLink { .. } => Action::HardLink,
            Op::Stat { .. } => Action::Stat,
            Op::Access { .. } => Action::Access,
            Op::Chmod { .. } => Action::Chmod,
            Op::OpenReadWriteClose { .. } => Action::OpenReadWriteClose,
        }
    }

    /// Arguments as strings, for logs and divergence reports.
    pub fn args(&self) -> BTreeMap<String, String> {
        let mut args = BTreeMap::new();
        let mut put = |key: &str, value: String| {
            args.insert(key.to_string(), value);
        };
        match self {
            Op::List => {}
            Op::CreateFile { name }
            | Op::RemoveFile { name }
            | Op::CreateDir { name }
            | Op::RemoveDir { name }
            | Op::Stat { name } => put("name", name.clone()),
            Op::HardLink { source, link } => {
                put("source", source.clone());
                put("link", link.clone());
            }
            Op::Access { name, mode } => {
                put("name", name.clone());
                put("mode", mode.as_str().to_string());
            }
            Op::Chmod { name, mode } => {
                put("name", name.clone());
                put("mode", format!("{:#o}", mode));
            }
            Op::OpenReadWriteClose {
                name,
                read_len,
                buf,
            } => {
                put("name", name.clone());
                put("read_len", read_len.to_string());
                put("write_len", buf.len().to_string());
            }
        }
        args
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.action())?;
        for (key, value) in self.args() {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

/// Byte counts for open-read-write-close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoSizes {
    pub read: usize,
    pub write: usize,
}

impl Default for IoSizes {
    fn default() -> Self {
        IoSizes {
            read: 100,
            write: 100,
        }
    }
}

impl From<&dirfuzz_config::IoConfig> for IoSizes {
    fn from(config: &dirfuzz_config::IoConfig) -> Self {
        IoSizes {
            read: config.read_size,
            write: config.write_size,
        }
    }
}

/// Pick concrete arguments for `action` from the tracked state.
pub fn generate<R: Rng>(
    rng: &mut R,
    action: Action,
    tracker: &DirectoryTracker,
    picker: &NamePicker,
    io: IoSizes,
) -> Op {
    match action {
        Action::List => Op::List,
        Action::CreateFile => Op::CreateFile {
            name: picker.pick(rng, tracker),
        },
        Action::RemoveFile => Op::RemoveFile {
            name: picker.pick(rng, tracker),
        },
        Action::CreateDir => Op::CreateDir {
            name: picker.pick(rng, tracker),
        },
        Action::RemoveDir => Op::RemoveDir {
            name: picker.pick(rng, tracker),
        },
        Action::HardLink => {
            let source = picker.pick(rng, tracker);
            Op::HardLink {
                source,
                link: picker.fresh(rng),
            }
        }
        Action::Stat => Op::Stat {
            name: picker.pick(rng, tracker),
        },
        Action::Access => {
            let name = picker.pick(rng, tracker);
            let mode = AccessMode::ALL[rng.gen_range(0..AccessMode::ALL.len())];
            Op::Access { name, mode }
        }
        Action::Chmod => {
            let name = picker.pick(rng, tracker);
            Op::Chmod {
                name,
                mode: rng.gen_range(0..=0o777),
            }
        }
        Action::OpenReadWriteClose => {
            let name = picker.pick(rng, tracker);
            Op::OpenReadWriteClose {
                name,
                read_len: io.read,
                buf: random_buf(rng, io.write),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::EntryKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_generate_matches_action() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let tracker = DirectoryTracker::new();
        let picker = NamePicker::default();
        for action in Action::ALL {
            let op = generate(&mut rng, action, &tracker, &picker, IoSizes::default());
            assert_eq!(op.action(), action);
        }
    }

    #[test]
    fn test_choose_covers_catalog() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..500 {
            seen.insert(Action::choose(&mut rng));
        }
        assert_eq!(seen.len(), Action::ALL.len());
    }

    #[test]
    fn test_chmod_mode_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let tracker = DirectoryTracker::new();
        let picker = NamePicker::default();
        for _ in 0..200 {
            match generate(&mut rng, Action::Chmod, &tracker, &picker, IoSizes::default()) {
                Op::Chmod { mode, .. } => assert!(mode <= 0o777),
                other => panic!("unexpected op {:?}", other),
            }
        }
    }

    #[test]
    fn test_hard_link_destination_is_fresh() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut tracker = DirectoryTracker::new();
        tracker.insert("src", EntryKind::File, 1);
        let picker = NamePicker::default();
        for _ in 0..50 {
            match generate(&mut rng, Action::HardLink, &tracker, &picker, IoSizes::default()) {
                Op::HardLink { link, .. } => assert!(!tracker.contains(&link)),
                other => panic!("unexpected op {:?}", other),
            }
        }
    }

    #[test]
    fn test_open_read_write_close_sizes() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let io = IoSizes { read: 7, write: 13 };
        let op = generate(
            &mut rng,
            Action::OpenReadWriteClose,
            &DirectoryTracker::new(),
            &NamePicker::default(),
            io,
        );
        match op {
            Op::OpenReadWriteClose { read_len, buf, .. } => {
                assert_eq!(read_len, 7);
                assert_eq!(buf.len(), 13);
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_args_and_display() {
        let op = Op::Chmod {
            name: "abc".to_string(),
            mode: 0o644,
        };
        let args = op.args();
        assert_eq!(args["name"], "abc");
        assert_eq!(args["mode"], "0o644");
        assert_eq!(op.to_string(), "chmod mode=0o644 name=abc");
        assert!(Op::List.args().is_empty());
    }
}
