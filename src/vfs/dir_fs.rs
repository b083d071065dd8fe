//! This module provides the real-disk counterpart of `MemFS`: a backend that maps inner paths
//! onto a directory of the host system, so the same code under test can be run against
//! either backend through `FsBackend`.
//!
//! ### Key Features:
//! - **Isolated root**: inner paths are normalized lexically and joined under `root`, so `..`
//!   never climbs out of it.
//! - **Tracking**: every artifact created through the backend is remembered; nothing else
//!   on the host is ever removed.
//! - **Auto‑cleanup**: tracked artifacts (and root directories the backend had to create)
//!   are removed on Drop, unless disabled with `set_auto_clean(false)`.
//! - **Typed errors**: host I/O failures are mapped onto `FsError`, wrapped in
//!   `anyhow::Error` with the operation as context.

use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, warn};

use crate::core::{FsBackend, Result, utils};
use crate::error::FsError;

/// A backend rooted at a real host directory.
///
/// ### Usage notes:
/// - `exists`, `is_dir`, `is_file`, `read` follow symlinks; `rm` and `is_symlink` do not.
/// - An absolute symlink target is interpreted as an inner path and stored as the
///   matching host path.
/// - Not thread‑safe.
///
/// ### Example:
/// ```
/// use fake_vfs::{DirFS, FsBackend};
///
/// let root = std::env::temp_dir().join("fake_vfs_doc");
///
/// let mut fs = DirFS::new(&root).unwrap();
/// fs.mkdir("/docs").unwrap();
/// fs.mkfile("/docs/note.txt", Some(b"Hello")).unwrap();
/// assert!(fs.exists("/docs/note.txt"));
///
/// fs.rm("/docs/note.txt").unwrap();
/// ```
pub struct DirFS {
    root: PathBuf,                      // host-related absolute normalized path
    cwd: PathBuf,                       // inner absolute normalized path
    tracked: BTreeSet<PathBuf>,         // inner paths created through this backend
    created_root_parents: Vec<PathBuf>, // host-related absolute normalized paths
    is_auto_clean: bool,
}

impl DirFS {
    /// Creates a new DirFS instance with the root directory at `root`.
    /// * `root` is an absolute host path. If it does not exist it will be created
    ///   (and removed again on drop).
    ///
    /// By default, the `is_auto_clean` flag is set to `true`.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();

        if root.as_os_str().is_empty() {
            return Err(FsError::invalid("", "invalid root path: empty").into());
        }
        if root.is_relative() {
            return Err(anyhow!("the root path must be absolute: {}", root.display()));
        }
        if root.exists() && !root.is_dir() {
            return Err(FsError::not_a_directory(root).into());
        }

        let root = utils::normalize(root);

        let mut created_root_parents = Vec::new();
        if !root.exists() {
            created_root_parents.extend(Self::mkdir_all_on_host(&root)?);
        }

        if !Self::check_permissions(&root) {
            return Err(FsError::not_permitted(&root).into());
        }
        debug!("DirFS rooted at {}", root.display());

        Ok(Self {
            root,
            cwd: PathBuf::from("/"),
            tracked: BTreeSet::new(),
            created_root_parents,
            is_auto_clean: true,
        })
    }

    /// Returns root path related to the host file system.
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// Changes auto-clean flag.
    /// If auto-clean flag is true all artifacts created through the backend
    /// will be removed on drop.
    pub fn set_auto_clean(&mut self, clean: bool) {
        self.is_auto_clean = clean;
    }

    pub fn is_auto_clean(&self) -> bool {
        self.is_auto_clean
    }

    /// Returns the host path matching `inner_path`.
    pub fn to_host<P: AsRef<Path>>(&self, inner_path: P) -> PathBuf {
        let inner = self.to_inner(inner_path);
        match inner.strip_prefix("/") {
            Ok(relative) => self.root.join(relative),
            Err(_) => self.root.join(inner),
        }
    }

    fn to_inner<P: AsRef<Path>>(&self, inner_path: P) -> PathBuf {
        utils::normalize(self.cwd.join(inner_path))
    }

    /// Make directories recursively.
    /// * `path` is an absolute host path.
    /// Returns vector of created directories.
    fn mkdir_all_on_host(path: &Path) -> Result<Vec<PathBuf>> {
        let mut missing = Vec::new();
        let mut current = Some(path);
        while let Some(dir) = current {
            if dir.exists() {
                break;
            }
            missing.push(dir.to_path_buf());
            current = dir.parent();
        }

        let mut created = Vec::new();
        for dir in missing.into_iter().rev() {
            std::fs::create_dir(&dir).map_err(|err| FsError::from_io(&dir, err))?;
            created.push(dir);
        }
        Ok(created)
    }

    fn check_permissions(path: &Path) -> bool {
        let probe = path.join(".access");
        std::fs::write(&probe, b"check").is_ok() && std::fs::remove_file(probe).is_ok()
    }

    /// Maps a host error for `inner` onto `FsError`, keeping the operation as context.
    fn host_err<'a>(inner: &'a Path, op: &'static str) -> impl FnOnce(std::io::Error) -> anyhow::Error + 'a {
        move |err| anyhow::Error::new(FsError::from_io(inner, err)).context(op)
    }

    fn require_parent_dir(&self, inner: &Path) -> Result<()> {
        let parent = inner.parent().unwrap_or(Path::new("/"));
        let host = self.to_host(parent);
        if !host.exists() {
            return Err(FsError::not_found(parent).into());
        }
        if !host.is_dir() {
            return Err(FsError::not_a_directory(parent).into());
        }
        Ok(())
    }

    /// Where an entry named after `src` lands when copied/moved to `dst`.
    fn destination(&self, src: &Path, dst: &Path) -> PathBuf {
        match (self.to_host(dst).is_dir(), src.file_name()) {
            (true, Some(name)) => dst.join(name),
            _ => dst.to_path_buf(),
        }
    }
}

#[cfg(unix)]
fn symlink_on_host(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink_on_host(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

impl FsBackend for DirFS {
    /// Returns current working directory related to the vfs root.
    fn cwd(&self) -> &Path {
        self.cwd.as_path()
    }

    /// Changes the current working directory.
    /// * `path` can be in relative or absolute form, but it must name an existing directory.
    fn cd<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let target = self.to_inner(path);
        let host = self.to_host(&target);
        if !host.exists() {
            return Err(FsError::not_found(&target).into());
        }
        if !host.is_dir() {
            return Err(FsError::not_a_directory(&target).into());
        }
        debug!("cd: {} -> {}", self.cwd.display(), target.display());
        self.cwd = target;
        Ok(())
    }

    fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        self.to_host(path).exists()
    }

    fn is_dir<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        let inner = self.to_inner(path);
        let meta = std::fs::metadata(self.to_host(&inner)).map_err(Self::host_err(&inner, "is_dir"))?;
        Ok(meta.is_dir())
    }

    fn is_file<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        let inner = self.to_inner(path);
        let meta = std::fs::metadata(self.to_host(&inner)).map_err(Self::host_err(&inner, "is_file"))?;
        Ok(meta.is_file())
    }

    fn is_symlink<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        let inner = self.to_inner(path);
        let meta = std::fs::symlink_metadata(self.to_host(&inner))
            .map_err(Self::host_err(&inner, "is_symlink"))?;
        Ok(meta.file_type().is_symlink())
    }

    /// Lists the immediate children of a directory, sorted. A file lists as itself.
    fn ls<P: AsRef<Path>>(&self, path: P) -> Result<Vec<PathBuf>> {
        let inner = self.to_inner(path);
        if !self.is_dir(&inner)? {
            return Ok(vec![inner]);
        }
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(self.to_host(&inner)).map_err(Self::host_err(&inner, "ls"))? {
            let entry = entry.map_err(Self::host_err(&inner, "ls"))?;
            entries.push(inner.join(entry.file_name()));
        }
        entries.sort();
        Ok(entries)
    }

    /// Creates a single directory. The parent must exist.
    fn mkdir<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if path.as_ref().as_os_str().is_empty() {
            return Err(FsError::invalid("", "invalid path: empty").into());
        }
        let inner = self.to_inner(path);
        if utils::is_virtual_root(&inner) {
            return Err(FsError::already_exists(&inner).into());
        }
        std::fs::create_dir(self.to_host(&inner)).map_err(Self::host_err(&inner, "mkdir"))?;
        debug!("mkdir: {}", inner.display());
        self.tracked.insert(inner);
        Ok(())
    }

    /// Creates directory and all it parents (if needed).
    fn mkdir_all<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if path.as_ref().as_os_str().is_empty() {
            return Err(FsError::invalid("", "invalid path: empty").into());
        }
        let inner = self.to_inner(path);
        let mut built = PathBuf::from("/");
        for component in inner.components().skip(1) {
            built.push(component);
            let host = self.to_host(&built);
            if host.is_dir() {
                continue;
            }
            if host.exists() {
                let err = if built == inner {
                    FsError::already_exists(&built)
                } else {
                    FsError::not_a_directory(&built)
                };
                return Err(err.into());
            }
            std::fs::create_dir(&host).map_err(Self::host_err(&built, "mkdir_all"))?;
            self.tracked.insert(built.clone());
        }
        debug!("mkdir_all: {}", inner.display());
        Ok(())
    }

    /// Creates new file. The parent must exist and the name must be free.
    fn mkfile<P: AsRef<Path>>(&mut self, path: P, content: Option<&[u8]>) -> Result<()> {
        if path.as_ref().as_os_str().is_empty() {
            return Err(FsError::invalid("", "invalid path: empty").into());
        }
        let inner = self.to_inner(path);
        self.require_parent_dir(&inner)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.to_host(&inner))
            .map_err(Self::host_err(&inner, "mkfile"))?;
        self.tracked.insert(inner.clone());
        if let Some(content) = content {
            file.write_all(content)
                .with_context(|| format!("writing {}", inner.display()))?;
        }
        debug!("mkfile: {}", inner.display());
        Ok(())
    }

    fn read<P: AsRef<Path>>(&self, path: P) -> Result<Vec<u8>> {
        let inner = self.to_inner(path);
        if self.is_dir(&inner)? {
            return Err(FsError::is_a_directory(&inner).into());
        }
        std::fs::read(self.to_host(&inner)).map_err(Self::host_err(&inner, "read"))
    }

    /// Replaces the content of an existing file.
    fn write<P: AsRef<Path>>(&mut self, path: P, content: &[u8]) -> Result<()> {
        let inner = self.to_inner(path);
        if self.is_dir(&inner)? {
            return Err(FsError::is_a_directory(&inner).into());
        }
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.to_host(&inner))
            .map_err(Self::host_err(&inner, "write"))?;
        file.write_all(content)
            .with_context(|| format!("writing {}", inner.display()))
    }

    /// Appends bytes to the end of an existing file.
    fn append<P: AsRef<Path>>(&mut self, path: P, content: &[u8]) -> Result<()> {
        let inner = self.to_inner(path);
        if self.is_dir(&inner)? {
            return Err(FsError::is_a_directory(&inner).into());
        }
        let mut file = OpenOptions::new()
            .append(true)
            .open(self.to_host(&inner))
            .map_err(Self::host_err(&inner, "append"))?;
        file.write_all(content)
            .with_context(|| format!("appending to {}", inner.display()))
    }

    /// Removes a file, symlink or directory (recursively). The root cannot be removed.
    fn rm<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if path.as_ref().as_os_str().is_empty() {
            return Err(FsError::invalid("", "invalid path: empty").into());
        }
        let inner = self.to_inner(path);
        if utils::is_virtual_root(&inner) {
            return Err(FsError::not_permitted(&inner).into());
        }
        utils::rm_on_host(self.to_host(&inner)).map_err(Self::host_err(&inner, "rm"))?;
        self.tracked.retain(|tracked| !tracked.starts_with(&inner));
        debug!("rm: {}", inner.display());
        Ok(())
    }

    /// Renames `from` to `to`; an existing directory `to` receives `to/<name>`.
    fn mv<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, from: P, to: Q) -> Result<()> {
        let src = self.to_inner(from);
        let dst = self.destination(&src, &self.to_inner(to));
        if utils::is_virtual_root(&src) {
            return Err(FsError::not_permitted(&src).into());
        }
        if dst.starts_with(&src) && dst != src {
            return Err(FsError::invalid(
                dst.display().to_string(),
                "cannot move a directory into itself",
            )
            .into());
        }
        std::fs::rename(self.to_host(&src), self.to_host(&dst)).map_err(Self::host_err(&src, "mv"))?;

        let moved: Vec<PathBuf> = self
            .tracked
            .iter()
            .filter(|tracked| tracked.starts_with(&src))
            .cloned()
            .collect();
        for old in moved {
            self.tracked.remove(&old);
            if let Ok(rest) = old.strip_prefix(&src) {
                self.tracked.insert(dst.join(rest));
            }
        }
        self.tracked.insert(dst.clone());
        debug!("mv: {} -> {}", src.display(), dst.display());
        Ok(())
    }

    /// Copies a single regular file; an existing directory `to` receives `to/<name>`.
    fn cp<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, from: P, to: Q) -> Result<()> {
        let src = self.to_inner(from);
        let dst = self.destination(&src, &self.to_inner(to));
        if self.is_dir(&src)? {
            return Err(FsError::is_a_directory(&src).into());
        }
        self.require_parent_dir(&dst)?;
        std::fs::copy(self.to_host(&src), self.to_host(&dst)).map_err(Self::host_err(&dst, "cp"))?;
        debug!("cp: {} -> {}", src.display(), dst.display());
        self.tracked.insert(dst);
        Ok(())
    }

    /// Creates a symbolic link at `link`. The target does not have to exist.
    fn symlink<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, target: P, link: Q) -> Result<()> {
        let target = target.as_ref();
        let inner = self.to_inner(link);
        self.require_parent_dir(&inner)?;
        let host_target = if target.is_absolute() {
            self.to_host(target)
        } else {
            target.to_path_buf()
        };

        symlink_on_host(&host_target, &self.to_host(&inner)).map_err(Self::host_err(&inner, "symlink"))?;
        debug!("symlink: {} -> {}", inner.display(), target.display());
        self.tracked.insert(inner);
        Ok(())
    }

    /// Removes all tracked artifacts (dirs and files), but preserves the root.
    fn cleanup(&mut self) -> bool {
        let mut is_ok = true;
        for inner in self.tracked.clone().iter().rev() {
            let host = self.to_host(inner);
            if std::fs::symlink_metadata(&host).is_err() {
                // removed together with its parent already
                self.tracked.remove(inner);
                continue;
            }
            match utils::rm_on_host(&host) {
                Ok(()) => {
                    self.tracked.remove(inner);
                }
                Err(err) => {
                    is_ok = false;
                    warn!("unable to remove {}: {}", host.display(), err);
                }
            }
        }
        self.cwd = PathBuf::from("/");
        is_ok
    }
}

impl Drop for DirFS {
    fn drop(&mut self) {
        if !self.is_auto_clean {
            return;
        }

        self.cleanup();

        for parent in self.created_root_parents.iter().rev() {
            if let Err(err) = utils::rm_on_host(parent) {
                warn!("failed to remove {}: {}", parent.display(), err);
            }
        }
        self.created_root_parents.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn setup_test_env() -> TempDir {
        TempDir::new("dirfs_test").unwrap()
    }

    fn fs_error(err: &anyhow::Error) -> &FsError {
        err.downcast_ref::<FsError>().unwrap()
    }

    mod creations {
        use super::*;

        #[test]
        fn test_new_absolute_path_existing() {
            let temp_dir = setup_test_env();
            let root = temp_dir.path().to_path_buf();

            let fs = DirFS::new(&root).unwrap();

            assert_eq!(fs.root(), root);
            assert_eq!(fs.cwd(), Path::new("/"));
            assert!(fs.created_root_parents.is_empty());
            assert!(fs.is_auto_clean());
        }

        #[test]
        fn test_new_nested_nonexistent_path() {
            let temp_dir = setup_test_env();
            let nested = temp_dir.path().join("a/b/c");

            let fs = DirFS::new(&nested).unwrap();

            assert_eq!(fs.created_root_parents.len(), 3); // a, a/b, a/b/c
            assert!(nested.exists());
        }

        #[test]
        fn test_new_invalid_roots() {
            let temp_dir = setup_test_env();
            let file_path = temp_dir.path().join("file.txt");
            std::fs::write(&file_path, "content").unwrap();

            assert!(DirFS::new(&file_path).is_err());
            assert!(DirFS::new("").is_err());
            assert!(DirFS::new("relative/root").is_err());
        }

        #[test]
        fn test_new_normalize_path() {
            let temp_dir = setup_test_env();
            let messy_path = temp_dir.path().join("././subdir/../subdir");

            let fs = DirFS::new(&messy_path).unwrap();

            assert_eq!(fs.root(), utils::normalize(temp_dir.path().join("subdir")));
        }
    }

    mod navigation {
        use super::*;

        #[test]
        fn test_cd_and_relative_paths() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;

            fs.mkdir_all("/parent/child")?;
            fs.cd("/parent")?;
            fs.mkfile("child/file.txt", Some(b"Content"))?;
            assert_eq!(fs.read("/parent/child/file.txt")?, b"Content");

            fs.cd("../..")?;
            assert_eq!(fs.cwd(), Path::new("/"));
            Ok(())
        }

        #[test]
        fn test_cd_errors() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.mkfile("/file.txt", None)?;

            let err = fs.cd("/missing").unwrap_err();
            assert!(matches!(fs_error(&err), FsError::NotFound { .. }));
            let err = fs.cd("/file.txt").unwrap_err();
            assert!(matches!(fs_error(&err), FsError::NotADirectory { .. }));
            Ok(())
        }

        #[test]
        fn test_parent_dir_never_escapes_root() -> Result<()> {
            let temp_dir = setup_test_env();
            let fs = DirFS::new(temp_dir.path().join("jail"))?;
            assert_eq!(fs.to_host("/../../etc"), temp_dir.path().join("jail/etc"));
            Ok(())
        }

        #[test]
        fn test_ls_sorted() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.mkdir("/b")?;
            fs.mkfile("/a.txt", None)?;
            fs.mkfile("/b/nested.txt", None)?;

            assert_eq!(fs.ls("/")?, vec![PathBuf::from("/a.txt"), PathBuf::from("/b")]);
            assert_eq!(fs.ls("/a.txt")?, vec![PathBuf::from("/a.txt")]);
            Ok(())
        }
    }

    mod create_and_io {
        use super::*;

        #[test]
        fn test_mkdir_strict() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;

            fs.mkdir("/dir")?;
            assert!(fs.is_dir("/dir")?);

            let err = fs.mkdir("/dir").unwrap_err();
            assert!(matches!(fs_error(&err), FsError::AlreadyExists { .. }));
            let err = fs.mkdir("/no/parent").unwrap_err();
            assert!(matches!(fs_error(&err), FsError::NotFound { .. }));
            Ok(())
        }

        #[test]
        fn test_mkdir_all_over_file() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.mkfile("/file", None)?;

            let err = fs.mkdir_all("/file/sub").unwrap_err();
            assert!(matches!(fs_error(&err), FsError::NotADirectory { .. }));
            fs.mkdir_all("/a/b/c")?;
            fs.mkdir_all("/a/b")?;
            assert!(fs.is_dir("/a/b/c")?);
            Ok(())
        }

        #[test]
        fn test_mkfile_strict() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;

            fs.mkfile("/file.txt", Some(b"Hello"))?;
            let err = fs.mkfile("/file.txt", None).unwrap_err();
            assert!(matches!(fs_error(&err), FsError::AlreadyExists { .. }));
            let err = fs.mkfile("/missing/file.txt", None).unwrap_err();
            assert!(matches!(fs_error(&err), FsError::NotFound { .. }));
            assert_eq!(fs.read("/file.txt")?, b"Hello");
            Ok(())
        }

        #[test]
        fn test_write_and_append() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;

            fs.mkfile("/log.txt", None)?;
            fs.write("/log.txt", b"one\n")?;
            fs.append("/log.txt", b"two\n")?;
            assert_eq!(fs.read("/log.txt")?, b"one\ntwo\n");

            let err = fs.write("/new.txt", b"x").unwrap_err();
            assert!(matches!(fs_error(&err), FsError::NotFound { .. }));
            Ok(())
        }

        #[test]
        fn test_read_directory() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.mkdir("/empty_dir")?;

            let err = fs.read("/empty_dir").unwrap_err();
            assert!(err.to_string().contains("is a directory"));
            Ok(())
        }
    }

    mod move_copy_remove {
        use super::*;

        #[test]
        fn test_mv_and_cp() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;

            fs.mkdir("/dir")?;
            fs.mkfile("/a.txt", Some(b"data"))?;
            fs.cp("/a.txt", "/dir")?;
            fs.mv("/a.txt", "/b.txt")?;

            assert_eq!(fs.read("/dir/a.txt")?, b"data");
            assert_eq!(fs.read("/b.txt")?, b"data");
            assert!(!fs.exists("/a.txt"));
            Ok(())
        }

        #[test]
        fn test_mv_into_itself() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.mkdir_all("/a/b")?;

            let err = fs.mv("/a", "/a/b").unwrap_err();
            assert!(matches!(fs_error(&err), FsError::InvalidArgument { .. }));
            Ok(())
        }

        #[test]
        fn test_rm() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.mkdir_all("/a/b")?;
            fs.mkfile("/a/b/c.txt", None)?;

            fs.rm("/a")?;
            assert!(!fs.exists("/a/b/c.txt"));
            assert!(fs.tracked.is_empty());

            let err = fs.rm("/").unwrap_err();
            assert!(matches!(fs_error(&err), FsError::OperationNotPermitted { .. }));
            let err = fs.rm("/a").unwrap_err();
            assert!(matches!(fs_error(&err), FsError::NotFound { .. }));
            Ok(())
        }

        #[cfg(unix)]
        #[test]
        fn test_symlink() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.mkfile("/target.txt", Some(b"linked"))?;

            fs.symlink("/target.txt", "/abs")?;
            fs.symlink("target.txt", "/rel")?;
            fs.symlink("/missing", "/dangling")?;

            assert!(fs.is_symlink("/abs")?);
            assert_eq!(fs.read("/abs")?, b"linked");
            assert_eq!(fs.read("/rel")?, b"linked");
            assert!(!fs.exists("/dangling"));
            assert!(fs.is_symlink("/dangling")?);
            Ok(())
        }
    }

    mod drop {
        use super::*;

        #[test]
        fn test_drop_removes_created_root() {
            let temp_dir = setup_test_env();
            let nested = temp_dir.path().join("a/b/c");

            let fs = DirFS::new(&nested).unwrap();
            assert!(nested.exists());
            drop(fs);

            assert!(!temp_dir.path().join("a").exists());
        }

        #[test]
        fn test_drop_only_removes_tracked() {
            let temp_dir = setup_test_env();
            let foreign = temp_dir.path().join("foreign.txt");
            std::fs::write(&foreign, "keep").unwrap();

            let mut fs = DirFS::new(temp_dir.path()).unwrap();
            fs.mkdir_all("/made/here").unwrap();
            fs.mkfile("/made/here/file.txt", None).unwrap();
            drop(fs);

            assert!(foreign.exists());
            assert!(!temp_dir.path().join("made").exists());
            assert!(temp_dir.path().exists());
        }

        #[test]
        fn test_drop_with_auto_clean_disabled() {
            let temp_dir = setup_test_env();
            let root = temp_dir.path().join("keep");

            let mut fs = DirFS::new(&root).unwrap();
            fs.mkfile("/kept.txt", None).unwrap();
            fs.set_auto_clean(false);
            drop(fs);

            assert!(root.join("kept.txt").exists());
        }

        #[test]
        fn test_cleanup_keeps_root() -> Result<()> {
            let temp_dir = setup_test_env();
            let mut fs = DirFS::new(temp_dir.path())?;
            fs.mkdir_all("/x/y")?;
            fs.cd("/x")?;

            assert!(fs.cleanup());
            assert!(!fs.exists("/x"));
            assert!(fs.exists("/"));
            assert_eq!(fs.cwd(), Path::new("/"));
            Ok(())
        }
    }
}
