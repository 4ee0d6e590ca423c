use std::fmt;
use std::path::PathBuf;

/// Where a blog store keeps its documents.
#[non_exhaustive] // future-proofing for options like network storage
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Location {
    /// An in-memory store. Everything is lost when the store is dropped.
    InMemory,
    /// A store persisted on disk.
    OnDisk {
        /// The path to the database file (or directory, for RocksDB). This is permitted to be a
        /// path to a network file system, if desired.
        path: PathBuf,
    },
}

impl<T> From<T> for Location
where
    T: Into<PathBuf>,
{
    fn from(path: T) -> Self {
        Self::OnDisk { path: path.into() }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InMemory => f.write_str("<memory>"),
            Self::OnDisk { path } => write!(f, "{}", path.display()),
        }
    }
}
