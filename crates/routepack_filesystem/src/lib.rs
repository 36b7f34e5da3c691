use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

/// In-memory file-system for testing
pub mod in_memory_file_system;

/// File-system implementation using std::fs
pub mod os_file_system;

/// FileSystem abstraction instance
///
/// This should be `OsFileSystem` for non-testing environments and `InMemoryFileSystem` for testing.
pub type FileSystemRef = Arc<dyn FileSystem + Send + Sync>;

/// Trait abstracting file-system operations
#[mockall::automock]
pub trait FileSystem: std::fmt::Debug {
  fn cwd(&self) -> io::Result<PathBuf>;

  /// Produces an absolute path with `.` and `..` segments removed
  fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

  /// Create a directory at the specified path, along with any missing parents
  fn create_directory(&self, path: &Path) -> io::Result<()>;

  fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
  fn read_to_string(&self, path: &Path) -> io::Result<String>;

  /// Write the contents to a file, replacing it if it exists
  ///
  /// The parent directory must already exist. Use [`write_file`] when it might not.
  fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

  fn is_file(&self, path: &Path) -> bool;
  fn is_dir(&self, path: &Path) -> bool;
}

/// Writes a file, creating its parent directories as needed
pub fn write_file(fs: &dyn FileSystem, path: &Path, contents: &[u8]) -> anyhow::Result<()> {
  if let Some(parent) = path.parent() {
    fs.create_directory(parent).map_err(|error| {
      anyhow::anyhow!("Failed to create directory {}: {error}", parent.display())
    })?;
  }

  fs.write(path, contents)
    .map_err(|error| anyhow::anyhow!("Failed to write {}: {error}", path.display()))
}
