use std::path::{Path, PathBuf};

/// Capability interface shared by the in-memory backend (`MemFS`) and the real-disk backend
/// (`DirFS`). Code under test is written against `B: FsBackend` and handed either one.
///
/// All paths are *inner* paths: absolute paths start at the backend root, relative paths
/// are resolved against `cwd()`.
pub trait FsBackend {
    /// Returns current working directory related to the vfs root.
    fn cwd(&self) -> &Path;

    /// Changes the current working directory. The target must be an existing directory.
    fn cd<P: AsRef<Path>>(&mut self, path: P) -> Result<()>;

    /// Checks if a `path` exists (symlinks are followed).
    fn exists<P: AsRef<Path>>(&self, path: P) -> bool;

    fn is_dir<P: AsRef<Path>>(&self, path: P) -> Result<bool>;

    fn is_file<P: AsRef<Path>>(&self, path: P) -> Result<bool>;

    /// Checks if `path` itself is a symbolic link (the link is not followed).
    fn is_symlink<P: AsRef<Path>>(&self, path: P) -> Result<bool>;

    /// Lists the immediate children of a directory as inner absolute paths, sorted.
    fn ls<P: AsRef<Path>>(&self, path: P) -> Result<Vec<PathBuf>>;

    /// Creates a single directory. The parent must exist.
    fn mkdir<P: AsRef<Path>>(&mut self, path: P) -> Result<()>;

    /// Creates a directory and all missing parents.
    fn mkdir_all<P: AsRef<Path>>(&mut self, path: P) -> Result<()>;

    /// Creates a new regular file. The parent must exist and the name must be free.
    fn mkfile<P: AsRef<Path>>(&mut self, path: P, content: Option<&[u8]>) -> Result<()>;

    fn read<P: AsRef<Path>>(&self, path: P) -> Result<Vec<u8>>;

    /// Replaces the content of an existing file.
    fn write<P: AsRef<Path>>(&mut self, path: P, content: &[u8]) -> Result<()>;

    /// Appends to an existing file.
    fn append<P: AsRef<Path>>(&mut self, path: P, content: &[u8]) -> Result<()>;

    /// Removes a file, symlink or directory (recursively).
    fn rm<P: AsRef<Path>>(&mut self, path: P) -> Result<()>;

    fn mv<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, from: P, to: Q) -> Result<()>;

    /// Copies a single regular file.
    fn cp<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, from: P, to: Q) -> Result<()>;

    /// Creates a symbolic link at `link` pointing to `target` (stored verbatim).
    fn symlink<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, target: P, link: Q) -> Result<()>;

    /// Removes all artifacts (dirs and files), but preserves the root.
    fn cleanup(&mut self) -> bool;
}

pub type Result<T> = std::result::Result<T, anyhow::Error>;

pub mod utils {
    use std::path::{Component, Path, PathBuf};

    /// Lexically canonicalizes `path`: drops `.`, applies `..` (never above the root),
    /// removes redundant and trailing separators. Nothing is looked up on disk.
    pub fn normalize<P: AsRef<Path>>(path: P) -> PathBuf {
        let mut result = PathBuf::new();
        for component in path.as_ref().components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    if let Some(parent) = result.parent() {
                        result = parent.to_path_buf();
                    }
                }
                _ => result.push(component),
            }
        }
        result
    }

    /// Returns true if `path` denotes the virtual root (`/`).
    pub fn is_virtual_root<P: AsRef<Path>>(path: P) -> bool {
        let components: Vec<_> = path.as_ref().components().collect();
        components.len() == 1 && components[0] == Component::RootDir
    }

    /// Returns true if the raw path ends in `/.`, i.e. asks for the *contents* of a directory.
    pub fn ends_with_current_dir<P: AsRef<Path>>(path: P) -> bool {
        let raw = path.as_ref().to_string_lossy();
        let raw = raw.trim_end_matches('/');
        raw == "." || raw.ends_with("/.")
    }

    /// Last component of `path` as a string, if any.
    pub fn file_name<P: AsRef<Path>>(path: P) -> Option<String> {
        path.as_ref()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// Removes a host file, symlink or directory tree. Symlinks are removed, not followed.
    pub fn rm_on_host<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
        let path = path.as_ref();
        if std::fs::symlink_metadata(path)?.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        }
    }

}
