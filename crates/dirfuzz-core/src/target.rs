use std::fmt;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use dirfuzz_config::FuzzConfig;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::SetupError;
use crate::posix;

/// Which mount path of the system under test an action goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SutPath {
    Primary,
    Alternate,
}

impl SutPath {
    /// Iterations are 1-based: even ones use the primary path, odd ones the
    /// alternate path, so consecutive actions always cross mounts.
    pub fn for_iteration(iteration: usize) -> Self {
        if iteration % 2 == 0 {
            SutPath::Primary
        } else {
            SutPath::Alternate
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SutPath::Primary => "primary",
            SutPath::Alternate => "alternate",
        }
    }
}

impl fmt::Display for SutPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three filesystem roots supplied by the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roots {
    pub reference: PathBuf,
    pub primary: PathBuf,
    pub alternate: PathBuf,
}

impl Roots {
    pub fn new(
        reference: impl Into<PathBuf>,
        primary: impl Into<PathBuf>,
        alternate: impl Into<PathBuf>,
    ) -> Self {
        Roots {
            reference: reference.into(),
            primary: primary.into(),
            alternate: alternate.into(),
        }
    }

    /// Build roots from an effective, validated config.
    pub fn from_config(config: &FuzzConfig) -> Result<Self, SetupError> {
        let config = config.effective();
        config.validate_or_err()?;
        let root = |value: &Option<String>, role: &str| {
            value
                .clone()
                .map(PathBuf::from)
                .ok_or_else(|| dirfuzz_config::ConfigError::MissingTarget(role.to_string()))
        };
        Ok(Roots {
            reference: root(&config.targets.reference, "reference")?,
            primary: root(&config.targets.primary, "primary")?,
            alternate: root(&config.targets.alternate, "alternate")?,
        })
    }

    fn roles(&self) -> [(&'static str, &Path); 3] {
        [
            ("reference", self.reference.as_path()),
            ("primary", self.primary.as_path()),
            ("alternate", self.alternate.as_path()),
        ]
    }

    /// Check that every root is an existing, writable directory and that the
    /// reference is not the same directory as either SUT path.
    pub fn validate(&self) -> Result<(), SetupError> {
        for (role, path) in self.roles() {
            let meta = match fs::metadata(path) {
                Ok(meta) => meta,
                Err(_) => {
                    return Err(SetupError::MissingRoot {
                        role,
                        path: path.to_path_buf(),
                    })
                }
            };
            if !meta.is_dir() {
                return Err(SetupError::NotADirectory {
                    role,
                    path: path.to_path_buf(),
                });
            }
            if let Err(err) = posix::access(path, posix::AccessMode::Write) {
                return Err(SetupError::NotWritable {
                    role,
                    path: path.to_path_buf(),
                    kind: err.kind,
                });
            }
        }

        let reference = fs::metadata(&self.reference).map_err(|_| SetupError::MissingRoot {
            role: "reference",
            path: self.reference.clone(),
        })?;
        for (role, path) in [("primary", &self.primary), ("alternate", &self.alternate)] {
            let sut = fs::metadata(path).map_err(|_| SetupError::MissingRoot {
                role,
                path: path.clone(),
            })?;
            if sut.dev() == reference.dev() && sut.ino() == reference.ino() {
                return Err(SetupError::SameStorage {
                    role,
                    reference: self.reference.clone(),
                    sut: path.clone(),
                });
            }
        }
        Ok(())
    }
}

/// The per-instance fuzzing directories, one under each root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targets {
    pub reference: PathBuf,
    pub primary: PathBuf,
    pub alternate: PathBuf,
    pub subtree: String,
}

impl Targets {
    /// Validate the roots and create `subtree` under each of them, so that
    /// every target starts out as empty as the tracker.
    ///
    /// The reference subtree must not exist yet. On the system under test an
    /// existing empty subtree is accepted, since primary and alternate
    /// normally reach the same storage.
    pub fn prepare(roots: &Roots, subtree: &str) -> Result<Self, SetupError> {
        if subtree.is_empty() || subtree.contains('/') || subtree == "." || subtree == ".." {
            return Err(SetupError::InvalidSubtree(subtree.to_string()));
        }
        roots.validate()?;

        let targets = Targets {
            reference: roots.reference.join(subtree),
            primary: roots.primary.join(subtree),
            alternate: roots.alternate.join(subtree),
            subtree: subtree.to_string(),
        };
        // Check the SUT before creating anything, so a rejected run leaves
        // no fresh reference subtree behind.
        for (role, dir) in [("primary", &targets.primary), ("alternate", &targets.alternate)] {
            ensure_missing_or_empty(role, dir)?;
        }

        match fs::create_dir(&targets.reference) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(SetupError::DirtySubtree {
                    role: "reference",
                    path: targets.reference.clone(),
                })
            }
            Err(source) => {
                return Err(SetupError::CreateSubtree {
                    path: targets.reference.clone(),
                    source,
                })
            }
        }
        debug!(dir = %targets.reference.display(), "Fuzzing subtree ready");

        for dir in [&targets.primary, &targets.alternate] {
            fs::create_dir_all(dir).map_err(|source| SetupError::CreateSubtree {
                path: dir.clone(),
                source,
            })?;
            debug!(dir = %dir.display(), "Fuzzing subtree ready");
        }

        info!(
            "Mount-paths are: {}, {}, {}",
            targets.reference.display(),
            targets.primary.display(),
            targets.alternate.display()
        );
        Ok(targets)
    }

    /// Directory of the system under test reached through `path`.
    pub fn sut(&self, path: SutPath) -> &Path {
        match path {
            SutPath::Primary => &self.primary,
            SutPath::Alternate => &self.alternate,
        }
    }
}

fn ensure_missing_or_empty(role: &'static str, dir: &Path) -> Result<(), SetupError> {
    let dirty = || SetupError::DirtySubtree {
        role,
        path: dir.to_path_buf(),
    };
    match fs::read_dir(dir) {
        Ok(mut entries) => match entries.next() {
            None => Ok(()),
            Some(_) => Err(dirty()),
        },
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) if err.raw_os_error() == Some(libc::ENOTDIR) => Err(dirty()),
        Err(source) => Err(SetupError::CreateSubtree {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

/// `prefix` followed by three random alphanumerics, like
/// `dir_leases_directory_x7Q`.
pub fn random_subtree_name<R: Rng>(rng: &mut R, prefix: &str) -> String {
    let suffix: String = rng
        .sample_iter(&Alphanumeric)
        .take(3)
        .map(char::from)
        .collect();
    format!("{}{}", prefix, suffix)
}
