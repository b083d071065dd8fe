//! This module provides an in-memory filesystem tree: directories, regular files sharing
//! inodes through hard links, and symbolic links resolved at lookup time.

use std::collections::{BTreeMap, HashMap};
use std::ops::{Deref, DerefMut};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, trace};

use super::inode::InodeTable;
use super::node::{EntryType, Metadata, Node, NodeId, NodeKind, S_IFLNK};
use crate::config::FsConfig;
use crate::core::{FsBackend, Result, utils};
use crate::error::{FsError, FsResult};

/// What to create when inserting a node into the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewEntry {
    Directory,
    File(Vec<u8>),
    Symlink(PathBuf),
}

/// An in-memory file system. Each instance owns its own tree, working directory and inode
/// numbering, so tests can run side by side on independent instances.
///
/// ### Internal state
///
/// * `cwd`: Current Working Directory, an **inner absolute normalized path**. Relative
///   paths given to any method are resolved against it. Default value: `/`.
/// * `nodes`: arena of every live node. Directories own their children through a sorted
///   `BTreeMap<String, NodeId>`; a node's `parent` is a plain id used for path
///   reconstruction only.
/// * `inodes`: content blobs and inode numbers shared by hard links.
///
/// ### Invariants
///
/// 1. **Root existence**: `root` is always a live directory with no parent.
/// 2. **Tree shape**: every live node except the root appears exactly once in the child map
///    of its `parent`; `.` and `..` are never stored.
/// 3. **Link accounting**: a file's inode lists exactly the live file nodes referencing it;
///    an inode whose link set is empty has been reclaimed.
///
/// ### Thread Safety
///
/// `MemFS` is `!Sync` (access times are kept in `Cell`s). A tree belongs to one execution
/// context at a time; concurrent tests should each build their own instance.
///
/// ### Example
///
/// ```
/// use fake_vfs::MemFS;
///
/// let mut fs = MemFS::new();
/// fs.mkdir_p("/docs").unwrap();
/// fs.mkfile("/docs/note.txt", b"Hello").unwrap();
///
/// assert!(fs.exists("/docs/note.txt"));
/// assert_eq!(fs.read("/docs/note.txt").unwrap(), b"Hello");
/// ```
#[derive(Debug)]
pub struct MemFS {
    pub(super) cwd: PathBuf,
    pub(super) root: NodeId,
    pub(super) nodes: HashMap<NodeId, Node>,
    pub(super) next_id: usize,
    pub(super) inodes: InodeTable,
    pub(super) config: FsConfig,
}

impl MemFS {
    /// Creates new MemFS instance with an empty root directory.
    /// The current working directory is set to `/`.
    pub fn new() -> Self {
        Self::with_config(FsConfig::default())
    }

    pub fn with_config(config: FsConfig) -> Self {
        let root = NodeId(0);
        let mut inodes = InodeTable::new();
        let ino = inodes.allocate(root, Vec::new());
        let meta = Metadata::new(config.dir_mode(), config.uid, config.gid);
        let node = Node::new(
            String::new(),
            None,
            NodeKind::Directory {
                ino,
                children: BTreeMap::new(),
            },
            meta,
        );

        let mut nodes = HashMap::new();
        nodes.insert(root, node);

        Self {
            cwd: PathBuf::from("/"),
            root,
            nodes,
            next_id: 1,
            inodes,
            config,
        }
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// Discards the whole tree and starts over with an empty root, cwd `/` and fresh inode
    /// numbering. The configuration is kept.
    pub fn clear(&mut self) {
        debug!("clear: dropping {} nodes", self.nodes.len());
        *self = Self::with_config(self.config);
    }

    /// Returns current working directory.
    pub fn cwd(&self) -> &Path {
        self.cwd.as_path()
    }

    /// Canonical absolute form of `path`, resolved against the cwd. Purely lexical.
    pub fn canonical<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        utils::normalize(self.cwd.join(path))
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(super) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of live inodes (files and directories).
    pub fn inode_count(&self) -> usize {
        self.inodes.len()
    }

    /// Rebuilds the absolute path of a node from its parent links.
    pub fn path_of(&self, id: NodeId) -> PathBuf {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            let Some(node) = self.nodes.get(&cur) else {
                break;
            };
            if node.parent.is_none() {
                break;
            }
            names.push(node.name.as_str());
            current = node.parent;
        }
        let mut path = PathBuf::from("/");
        for name in names.iter().rev() {
            path.push(name);
        }
        path
    }

    /// Looks a path up without following a trailing symlink (lstat-like). Symlinks in
    /// intermediate components are followed. Returns `None` if any component is missing
    /// or an intermediate component is not a directory.
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> Option<NodeId> {
        self.lookup(path.as_ref(), false, 0)
    }

    /// Looks a path up and follows the trailing symlink chain (stat-like).
    pub fn resolve_following_symlinks<P: AsRef<Path>>(&self, path: P) -> Option<NodeId> {
        self.lookup(path.as_ref(), true, 0)
    }

    /// Dereferences a symlink node to the node its target currently names. Any other node
    /// resolves to itself. `None` for dangling or looping links.
    pub fn entry(&self, id: NodeId) -> Option<NodeId> {
        self.follow(id, 0)
    }

    fn lookup(&self, path: &Path, follow_last: bool, depth: usize) -> Option<NodeId> {
        let inner = self.canonical(path);
        let mut current = self.root;
        for name in Self::names(&inner) {
            let dir = self.follow(current, depth)?;
            current = *self.nodes.get(&dir)?.children()?.get(&name)?;
        }
        if follow_last {
            self.follow(current, depth)
        } else {
            Some(current)
        }
    }

    fn follow(&self, id: NodeId, depth: usize) -> Option<NodeId> {
        let node = self.nodes.get(&id)?;
        let Some(target) = node.symlink_target() else {
            return Some(id);
        };
        if depth >= self.config.max_symlink_depth {
            trace!("follow: symlink depth limit reached at {}", self.path_of(id).display());
            return None;
        }
        let base = match node.parent {
            Some(parent) => self.path_of(parent),
            None => PathBuf::from("/"),
        };
        self.lookup(&base.join(target), true, depth + 1)
    }

    /// Normal components of an inner path, as owned strings.
    pub(super) fn names(inner: &Path) -> Vec<String> {
        inner
            .components()
            .filter_map(|component| match component {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect()
    }

    pub(super) fn child_of(&self, dir: NodeId, name: &str) -> Option<NodeId> {
        self.nodes.get(&dir)?.children()?.get(name).copied()
    }

    pub(super) fn is_dir_node(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(Node::is_dir)
    }

    /// Changes the current working directory.
    /// * `path` can be relative or absolute; it must name an existing directory (symlinks
    ///   to directories are accepted).
    pub fn chdir<P: AsRef<Path>>(&mut self, path: P) -> FsResult<()> {
        let target = self.canonical(path);
        let id = self
            .resolve_following_symlinks(&target)
            .ok_or_else(|| FsError::not_found(&target))?;
        if !self.is_dir_node(id) {
            return Err(FsError::not_a_directory(&target));
        }
        debug!("chdir: {} -> {}", self.cwd.display(), target.display());
        self.cwd = target;
        Ok(())
    }

    /// Changes the cwd until the returned guard is dropped. The previous cwd is restored
    /// on every exit path, unwinding included.
    pub fn enter_dir<P: AsRef<Path>>(&mut self, path: P) -> FsResult<DirGuard<'_>> {
        let previous = self.cwd.clone();
        self.chdir(path)?;
        Ok(DirGuard { fs: self, previous })
    }

    /// Runs `f` with the cwd set to `path`, then restores the previous cwd.
    pub fn with_dir<P, F, T>(&mut self, path: P, f: F) -> FsResult<T>
    where
        P: AsRef<Path>,
        F: FnOnce(&mut MemFS) -> T,
    {
        let mut guard = self.enter_dir(path)?;
        Ok(f(&mut *guard))
    }

    /// Inserts a node at `path`, creating missing intermediate directories (mkdir -p).
    /// If the name is already taken the existing node is returned untouched.
    pub fn add<P: AsRef<Path>>(&mut self, path: P, entry: NewEntry) -> FsResult<NodeId> {
        let inner = self.canonical(path);
        let Some(name) = utils::file_name(&inner) else {
            return Ok(self.root);
        };
        let parent_path = inner.parent().unwrap_or(Path::new("/"));
        let parent = self.ensure_dir(parent_path)?;
        if let Some(existing) = self.child_of(parent, &name) {
            return Ok(existing);
        }
        Ok(self.insert_child(parent, &name, entry))
    }

    /// Detaches the node at `path` (lstat lookup) and releases everything beneath it.
    /// Returns false if the path does not resolve or names the root.
    pub fn delete<P: AsRef<Path>>(&mut self, path: P) -> bool {
        let Some(id) = self.resolve(path.as_ref()) else {
            return false;
        };
        if id == self.root {
            return false;
        }
        debug!("delete: {}", self.path_of(id).display());
        self.detach(id);
        self.release(id);
        true
    }

    /// Walks `path` from the root, creating missing directories. Symlinks to directories
    /// are followed.
    pub(super) fn ensure_dir(&mut self, path: &Path) -> FsResult<NodeId> {
        let mut current = self.root;
        let mut walked = PathBuf::from("/");
        for name in Self::names(path) {
            walked.push(&name);
            current = match self.child_of(current, &name) {
                Some(child) => {
                    let resolved = self
                        .follow(child, 0)
                        .ok_or_else(|| FsError::not_found(&walked))?;
                    if !self.is_dir_node(resolved) {
                        return Err(FsError::not_a_directory(&walked));
                    }
                    resolved
                }
                None => self.insert_child(current, &name, NewEntry::Directory),
            };
        }
        Ok(current)
    }

    fn next_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Creates a node of the requested kind as child `name` of directory `parent`.
    /// The caller guarantees `parent` is a directory and `name` is free.
    pub(super) fn insert_child(&mut self, parent: NodeId, name: &str, entry: NewEntry) -> NodeId {
        let id = self.next_node_id();
        let (kind, mode) = match entry {
            NewEntry::Directory => (
                NodeKind::Directory {
                    ino: self.inodes.allocate(id, Vec::new()),
                    children: BTreeMap::new(),
                },
                self.config.dir_mode(),
            ),
            NewEntry::File(content) => (
                NodeKind::File {
                    ino: self.inodes.allocate(id, content),
                },
                self.config.file_mode(),
            ),
            NewEntry::Symlink(target) => (NodeKind::Symlink { target }, S_IFLNK | 0o777),
        };
        let meta = Metadata::new(mode, self.config.uid, self.config.gid);
        self.attach_new(id, parent, name, kind, meta);
        id
    }

    /// Creates a second entry for an existing file inode.
    pub(super) fn insert_hard_link(&mut self, parent: NodeId, name: &str, source: NodeId) -> Option<NodeId> {
        let (ino, mut meta) = {
            let node = self.nodes.get(&source)?;
            match node.kind {
                NodeKind::File { ino } => (ino, node.meta.clone()),
                _ => return None,
            }
        };
        let id = self.next_node_id();
        if !self.inodes.link(ino, id) {
            return None;
        }
        meta.touch_change();
        if let Some(node) = self.nodes.get_mut(&source) {
            node.meta.touch_change();
        }
        self.attach_new(id, parent, name, NodeKind::File { ino }, meta);
        Some(id)
    }

    fn attach_new(&mut self, id: NodeId, parent: NodeId, name: &str, kind: NodeKind, meta: Metadata) {
        self.nodes
            .insert(id, Node::new(name.to_string(), Some(parent), kind, meta));
        self.reattach(id, parent, name);
    }

    /// Links an already stored (detached) node into `parent` under `name`.
    pub(super) fn reattach(&mut self, id: NodeId, parent: NodeId, name: &str) {
        if let Some(dir) = self.nodes.get_mut(&parent) {
            if let Some(children) = dir.children_mut() {
                children.insert(name.to_string(), id);
            }
            dir.meta.touch_modify();
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.name = name.to_string();
            node.parent = Some(parent);
        }
    }

    /// Removes the node from its parent's child map. The node itself stays in the arena.
    pub(super) fn detach(&mut self, id: NodeId) {
        let Some((parent, name)) = self
            .nodes
            .get(&id)
            .and_then(|node| node.parent.map(|p| (p, node.name.clone())))
        else {
            return;
        };
        if let Some(dir) = self.nodes.get_mut(&parent) {
            if let Some(children) = dir.children_mut() {
                children.remove(&name);
            }
            dir.meta.touch_modify();
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
    }

    /// Drops a detached subtree from the arena, returning inode links as it goes.
    pub(super) fn release(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        match node.kind {
            NodeKind::Directory { ino, children } => {
                for child in children.into_values() {
                    self.release(child);
                }
                self.inodes.unlink(ino, id);
            }
            NodeKind::File { ino } => {
                if !self.inodes.unlink(ino, id) {
                    for other in self.inodes.get(ino).map(|i| i.links().clone()).unwrap_or_default() {
                        if let Some(node) = self.nodes.get_mut(&other) {
                            node.meta.touch_change();
                        }
                    }
                }
            }
            NodeKind::Symlink { .. } => {}
        }
    }

    /// True if `ancestor` is `id` itself or one of its parents.
    pub(super) fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(cur) = current {
            if cur == ancestor {
                return true;
            }
            current = self.nodes.get(&cur).and_then(|node| node.parent);
        }
        false
    }
}

impl Default for MemFS {
    fn default() -> Self {
        Self::new()
    }
}

/// Restores the previous working directory of a `MemFS` when dropped.
/// Dereferences to the file system, so it can be used in its place.
pub struct DirGuard<'a> {
    fs: &'a mut MemFS,
    previous: PathBuf,
}

impl Deref for DirGuard<'_> {
    type Target = MemFS;

    fn deref(&self) -> &MemFS {
        self.fs
    }
}

impl DerefMut for DirGuard<'_> {
    fn deref_mut(&mut self) -> &mut MemFS {
        self.fs
    }
}

impl Drop for DirGuard<'_> {
    fn drop(&mut self) {
        debug!("chdir: restoring {}", self.previous.display());
        self.fs.cwd = std::mem::take(&mut self.previous);
    }
}

impl FsBackend for MemFS {
    fn cwd(&self) -> &Path {
        self.cwd.as_path()
    }

    fn cd<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        Ok(self.chdir(path)?)
    }

    fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        MemFS::exists(self, path)
    }

    fn is_dir<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        Ok(self.stat(path)?.is_dir())
    }

    fn is_file<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        Ok(self.stat(path)?.is_file())
    }

    fn is_symlink<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        Ok(self.lstat(path)?.is_symlink())
    }

    /// Lists the immediate children of a directory. A file lists as itself.
    fn ls<P: AsRef<Path>>(&self, path: P) -> Result<Vec<PathBuf>> {
        let inner = self.canonical(path);
        if self.stat(&inner)?.entry_type != EntryType::Directory {
            return Ok(vec![inner]);
        }
        Ok(self
            .children(&inner)?
            .into_iter()
            .map(|name| inner.join(name))
            .collect())
    }

    fn mkdir<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        MemFS::mkdir(self, path)?;
        Ok(())
    }

    fn mkdir_all<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.mkdir_p(path)?;
        Ok(())
    }

    fn mkfile<P: AsRef<Path>>(&mut self, path: P, content: Option<&[u8]>) -> Result<()> {
        MemFS::mkfile(self, path, content.unwrap_or_default())?;
        Ok(())
    }

    fn read<P: AsRef<Path>>(&self, path: P) -> Result<Vec<u8>> {
        Ok(MemFS::read(self, path)?)
    }

    fn write<P: AsRef<Path>>(&mut self, path: P, content: &[u8]) -> Result<()> {
        Ok(MemFS::write(self, path, content)?)
    }

    fn append<P: AsRef<Path>>(&mut self, path: P, content: &[u8]) -> Result<()> {
        Ok(MemFS::append(self, path, content)?)
    }

    fn rm<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        Ok(self.rm_r(path)?)
    }

    fn mv<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, from: P, to: Q) -> Result<()> {
        MemFS::mv(self, from, to)?;
        Ok(())
    }

    fn cp<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, from: P, to: Q) -> Result<()> {
        MemFS::cp(self, from, to)?;
        Ok(())
    }

    fn symlink<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, target: P, link: Q) -> Result<()> {
        MemFS::symlink(self, target, link)?;
        Ok(())
    }

    /// Removes everything but the root; the cwd returns to `/`.
    fn cleanup(&mut self) -> bool {
        self.clear();
        true
    }
}
