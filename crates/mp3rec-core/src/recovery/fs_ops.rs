/// Filesystem side effects used by the recovery driver
use std::fs;
use std::io;
use std::path::Path;

/// Directory creation and byte copying, kept behind a trait so the driver
/// can be exercised without touching a real output tree.
pub trait FileOps {
    /// Create `path` and every missing parent. An existing directory is success.
    fn ensure_dir(&self, path: &Path) -> io::Result<()>;

    /// Copy `src` to `dest` byte for byte, returning the number of bytes written.
    fn copy_bytes(&self, src: &Path, dest: &Path) -> io::Result<u64>;
}

/// `FileOps` backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileOps;

impl FileOps for StdFileOps {
    fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn copy_bytes(&self, src: &Path, dest: &Path) -> io::Result<u64> {
        fs::copy(src, dest)
    }
}
