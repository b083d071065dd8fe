//! An in-memory fake file system for tests.
//!
//! ### Overview
//!
//! `fake-vfs` lets code that reads and writes files be tested without touching the disk.
//! Each test builds its own [`MemFS`]: a tree of directories, regular files and symbolic
//! links with POSIX-like bookkeeping (inode numbers, hard-link counts, modes, timestamps)
//! and shell-style globbing.
//!
//! **Key ideas**:
//! - **Isolation**: no global state; every `MemFS` owns its tree, cwd and inode numbering.
//! - **POSIX errors**: failures are typed ([`FsError`]) and map onto errno values.
//! - **Symlinks and hard links**: symlinks resolve lazily at lookup time, hard links share
//!   one inode.
//! - **Globbing**: `?`, `*`, `**`, `[...]` and nested `{a,b}` groups ([`MemFS::glob`]).
//! - **Backend injection**: code written against [`FsBackend`] runs on the fake tree or,
//!   through [`DirFS`], on a scratch directory of the host.
//!
//! ```
//! use fake_vfs::{GlobFlags, MemFS};
//!
//! let mut fs = MemFS::new();
//! fs.mkdir_p("/data/logs").unwrap();
//! fs.mkfile("/data/logs/app.log", b"started").unwrap();
//! fs.link("/data/logs/app.log", "/data/latest.log").unwrap();
//!
//! assert_eq!(fs.stat("/data/latest.log").unwrap().nlink, 2);
//! assert_eq!(
//!     fs.glob(["/data/**/*.log"], GlobFlags::default()).unwrap(),
//!     vec!["/data/latest.log", "/data/logs/app.log"],
//! );
//! ```

mod config;
mod core;
mod error;
mod glob;
mod vfs;

pub use crate::config::FsConfig;
pub use crate::core::{FsBackend, Result, utils};
pub use crate::error::{EEXIST, EINVAL, EIO, EISDIR, ENOENT, ENOTDIR, ENOTEMPTY, EPERM, FsError, FsResult};
pub use crate::glob::GlobFlags;
pub use crate::vfs::{
    DirFS, DirGuard, EntryType, Inode, InodeTable, MemFS, Metadata, NewEntry, Node, NodeId, NodeKind,
    S_IFDIR, S_IFLNK, S_IFMT, S_IFREG, Stat,
};
