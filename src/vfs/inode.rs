//! Inode numbering and shared file content.
//!
//! Files and directories draw their numbers from one pool. A freed number is always
//! handed out again (lowest first) before the counter advances.

use std::collections::{BTreeSet, HashMap};

use super::node::NodeId;

/// Content record shared by every hard link of a file.
#[derive(Debug, Clone, Default)]
pub struct Inode {
    content: Vec<u8>,
    links: BTreeSet<NodeId>,
}

impl Inode {
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn links(&self) -> &BTreeSet<NodeId> {
        &self.links
    }

    pub fn nlink(&self) -> u64 {
        self.links.len() as u64
    }
}

#[derive(Debug)]
pub struct InodeTable {
    next: u64,
    freed: BTreeSet<u64>,
    inodes: HashMap<u64, Inode>,
}

impl InodeTable {
    pub fn new() -> Self {
        Self {
            next: 1,
            freed: BTreeSet::new(),
            inodes: HashMap::new(),
        }
    }

    fn next_number(&mut self) -> u64 {
        if let Some(ino) = self.freed.pop_first() {
            return ino;
        }
        let ino = self.next;
        self.next += 1;
        ino
    }

    /// Allocates a new inode holding `content`, linked from `owner`.
    pub fn allocate(&mut self, owner: NodeId, content: Vec<u8>) -> u64 {
        let ino = self.next_number();
        let mut links = BTreeSet::new();
        links.insert(owner);
        self.inodes.insert(ino, Inode { content, links });
        ino
    }

    pub fn get(&self, ino: u64) -> Option<&Inode> {
        self.inodes.get(&ino)
    }

    /// Registers another entry sharing `ino`. Returns false if the inode is unknown.
    pub fn link(&mut self, ino: u64, node: NodeId) -> bool {
        match self.inodes.get_mut(&ino) {
            Some(inode) => {
                inode.links.insert(node);
                true
            }
            None => false,
        }
    }

    /// Drops one link. When the last link goes, the inode and its content are reclaimed
    /// and the number returns to the freelist. Returns true if the inode was reclaimed.
    pub fn unlink(&mut self, ino: u64, node: NodeId) -> bool {
        let Some(inode) = self.inodes.get_mut(&ino) else {
            return false;
        };
        inode.links.remove(&node);
        if !inode.links.is_empty() {
            return false;
        }
        self.inodes.remove(&ino);
        self.freed.insert(ino);
        true
    }

    pub fn content(&self, ino: u64) -> Option<&[u8]> {
        self.inodes.get(&ino).map(|inode| inode.content.as_slice())
    }

    pub fn set_content(&mut self, ino: u64, content: &[u8]) {
        if let Some(inode) = self.inodes.get_mut(&ino) {
            inode.content = content.to_vec();
        }
    }

    pub fn append_content(&mut self, ino: u64, content: &[u8]) {
        if let Some(inode) = self.inodes.get_mut(&ino) {
            inode.content.extend_from_slice(content);
        }
    }

    pub fn nlink(&self, ino: u64) -> u64 {
        self.inodes.get(&ino).map(Inode::nlink).unwrap_or(0)
    }

    /// Number of live inodes.
    pub fn len(&self) -> usize {
        self.inodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inodes.is_empty()
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}
