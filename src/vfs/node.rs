use std::cell::Cell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFLNK: u32 = 0o120000;

/// Handle of a node inside one `MemFS` arena. Ids are never reused within an instance.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EntryType {
    File,
    Directory,
    Symlink,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Directory {
        ino: u64,
        children: BTreeMap<String, NodeId>,
    },
    /// Content lives in the inode table; several file nodes may share one inode.
    File { ino: u64 },
    /// Target is kept verbatim and resolved at lookup time.
    Symlink { target: PathBuf },
}

/// Bookkeeping attributes. `atime` is a `Cell` so that reads can update it through `&self`.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub(crate) mode: u32,
    pub(crate) uid: u32,
    pub(crate) gid: u32,
    pub(crate) atime: Cell<SystemTime>,
    pub(crate) mtime: SystemTime,
    pub(crate) ctime: SystemTime,
}

impl Metadata {
    pub(crate) fn new(mode: u32, uid: u32, gid: u32) -> Self {
        let now = SystemTime::now();
        Self {
            mode,
            uid,
            gid,
            atime: Cell::new(now),
            mtime: now,
            ctime: now,
        }
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn gid(&self) -> u32 {
        self.gid
    }

    pub fn atime(&self) -> SystemTime {
        self.atime.get()
    }

    pub fn mtime(&self) -> SystemTime {
        self.mtime
    }

    pub fn ctime(&self) -> SystemTime {
        self.ctime
    }

    pub(crate) fn touch_access(&self) {
        self.atime.set(SystemTime::now());
    }

    pub(crate) fn touch_modify(&mut self) {
        let now = SystemTime::now();
        self.mtime = now;
        self.ctime = now;
    }

    pub(crate) fn touch_change(&mut self) {
        self.ctime = SystemTime::now();
    }
}

/// One directory entry: a directory, a regular file or a symbolic link.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) kind: NodeKind,
    pub(crate) meta: Metadata,
}

impl Node {
    pub(crate) fn new(name: String, parent: Option<NodeId>, kind: NodeKind, meta: Metadata) -> Node {
        Node {
            name,
            parent,
            kind,
            meta,
        }
    }

    /// Last path segment; empty for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning directory; `None` for the root and for detached nodes.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    pub fn entry_type(&self) -> EntryType {
        match self.kind {
            NodeKind::Directory { .. } => EntryType::Directory,
            NodeKind::File { .. } => EntryType::File,
            NodeKind::Symlink { .. } => EntryType::Symlink,
        }
    }

    pub fn is_file(&self) -> bool {
        self.entry_type() == EntryType::File
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type() == EntryType::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.entry_type() == EntryType::Symlink
    }

    /// Inode number; symlinks have none and report `0`.
    pub fn ino(&self) -> u64 {
        match self.kind {
            NodeKind::Directory { ino, .. } | NodeKind::File { ino } => ino,
            NodeKind::Symlink { .. } => 0,
        }
    }

    pub fn children(&self) -> Option<&BTreeMap<String, NodeId>> {
        match &self.kind {
            NodeKind::Directory { children, .. } => Some(children),
            _ => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut BTreeMap<String, NodeId>> {
        match &mut self.kind {
            NodeKind::Directory { children, .. } => Some(children),
            _ => None,
        }
    }

    pub fn symlink_target(&self) -> Option<&Path> {
        match &self.kind {
            NodeKind::Symlink { target } => Some(target),
            _ => None,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// Snapshot of a node's attributes, as returned by `stat()` / `lstat()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub entry_type: EntryType,
    pub ino: u64,
    pub nlink: u64,
    pub size: u64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
}

impl Stat {
    pub fn is_file(&self) -> bool {
        self.entry_type == EntryType::File
    }

    pub fn is_dir(&self) -> bool {
        self.entry_type == EntryType::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.entry_type == EntryType::Symlink
    }

    /// Permission bits without the file type.
    pub fn permissions(&self) -> u32 {
        self.mode & !S_IFMT
    }
}
