//! Filesystem identity and size-on-disk capabilities.
//!
//! Two facts about a path that `std::fs::Metadata` does not expose portably:
//! which underlying storage object it refers to (device + inode on POSIX), and
//! how many bytes it actually occupies on disk. The latter diverges from the
//! logical length on sparse or transparently compressed filesystems, which is
//! exactly the case where consolidation must pick the right canonical copy.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Identity of the storage object behind a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageId {
    pub device: u64,
    pub inode: u64,
}

/// Capability for storage identity and allocated-size queries.
///
/// Production code uses [`StdFsMeta`]; tests substitute a backend where
/// allocated size diverges from logical length.
pub trait FsMeta: Send + Sync {
    /// Storage identity of the object behind `path`.
    fn storage_id(&self, path: &Path) -> io::Result<StorageId>;

    /// Bytes actually allocated on disk for `path`.
    fn allocated_size(&self, path: &Path) -> io::Result<u64>;
}

/// Standard library backed implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFsMeta;

#[cfg(unix)]
impl FsMeta for StdFsMeta {
    fn storage_id(&self, path: &Path) -> io::Result<StorageId> {
        use std::os::unix::fs::MetadataExt;
        let meta = std::fs::metadata(path)?;
        Ok(StorageId {
            device: meta.dev(),
            inode: meta.ino(),
        })
    }

    fn allocated_size(&self, path: &Path) -> io::Result<u64> {
        use std::os::unix::fs::MetadataExt;
        let meta = std::fs::metadata(path)?;
        // st_blocks counts 512-byte units regardless of the fs block size.
        Ok(meta.blocks() * 512)
    }
}

#[cfg(not(unix))]
impl FsMeta for StdFsMeta {
    fn storage_id(&self, _path: &Path) -> io::Result<StorageId> {
        // No stable file-identity API in std here. Unresolvable identity is
        // the conservative answer: callers treat the paths as distinct.
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "file identity not available on this platform",
        ))
    }

    fn allocated_size(&self, path: &Path) -> io::Result<u64> {
        std::fs::metadata(path).map(|m| m.len())
    }
}

/// Whether every path refers to the same underlying storage object.
///
/// Each path is canonicalized and resolved to its [`StorageId`]; true iff all
/// resolve successfully and share one identity. Any resolution failure (broken
/// symlink, vanished file) yields false — "can't prove they're identical"
/// means normal matching proceeds rather than anything being skipped silently.
pub fn same_underlying_file(meta: &dyn FsMeta, paths: &[PathBuf]) -> bool {
    if paths.len() < 2 {
        return false;
    }

    let mut first: Option<StorageId> = None;
    for path in paths {
        let resolved = match std::fs::canonicalize(path) {
            Ok(resolved) => resolved,
            Err(e) => {
                debug!("Cannot resolve {}: {}", path.display(), e);
                return false;
            }
        };
        let id = match meta.storage_id(&resolved) {
            Ok(id) => id,
            Err(e) => {
                debug!("Cannot identify {}: {}", resolved.display(), e);
                return false;
            }
        };
        match first {
            None => first = Some(id),
            Some(expected) if expected != id => return false,
            Some(_) => {}
        }
    }
    true
}
