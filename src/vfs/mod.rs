mod dir_fs;
mod inode;
mod mem_fs;
mod node;
mod ops;

pub use dir_fs::DirFS;
pub use inode::{Inode, InodeTable};
pub use mem_fs::{DirGuard, MemFS, NewEntry};
pub use node::{EntryType, Metadata, Node, NodeId, NodeKind, S_IFDIR, S_IFLNK, S_IFMT, S_IFREG, Stat};
