//! Tree mutation and inspection operations on `MemFS`.
//!
//! Creation is strict here (parent must exist, name must be free); the lenient mkdir -p
//! insertion lives in `MemFS::add`.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use super::mem_fs::{MemFS, NewEntry};
use super::node::{EntryType, NodeId, NodeKind, S_IFMT, Stat};
use crate::core::utils;
use crate::error::{FsError, FsResult};

impl MemFS {
    /// Checks if a `path` exists. Symlinks are followed, so a dangling link does not exist.
    pub fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        self.resolve_following_symlinks(path).is_some()
    }

    pub fn is_dir<P: AsRef<Path>>(&self, path: P) -> bool {
        self.resolve_following_symlinks(path)
            .is_some_and(|id| self.is_dir_node(id))
    }

    pub fn is_file<P: AsRef<Path>>(&self, path: P) -> bool {
        self.resolve_following_symlinks(path)
            .and_then(|id| self.node(id))
            .is_some_and(|node| node.is_file())
    }

    /// True if `path` itself is a symlink (dangling or not).
    pub fn is_symlink<P: AsRef<Path>>(&self, path: P) -> bool {
        self.resolve(path)
            .and_then(|id| self.node(id))
            .is_some_and(|node| node.is_symlink())
    }

    /// Attributes of the node at `path`, following symlinks.
    pub fn stat<P: AsRef<Path>>(&self, path: P) -> FsResult<Stat> {
        let inner = self.canonical(path);
        let id = self.existing(&inner, true)?;
        Ok(self.stat_of(id))
    }

    /// Attributes of the node at `path`; a trailing symlink is described itself.
    pub fn lstat<P: AsRef<Path>>(&self, path: P) -> FsResult<Stat> {
        let inner = self.canonical(path);
        let id = self.existing(&inner, false)?;
        Ok(self.stat_of(id))
    }

    fn stat_of(&self, id: NodeId) -> Stat {
        let node = &self.nodes[&id];
        let (size, nlink) = match &node.kind {
            NodeKind::File { ino } => (
                self.inodes.content(*ino).map_or(0, |c| c.len() as u64),
                self.inodes.nlink(*ino),
            ),
            NodeKind::Directory { children, .. } => {
                let subdirs = children
                    .values()
                    .filter(|child| self.is_dir_node(**child))
                    .count();
                (0, 2 + subdirs as u64)
            }
            NodeKind::Symlink { target } => (target.as_os_str().len() as u64, 1),
        };
        Stat {
            entry_type: node.entry_type(),
            ino: node.ino(),
            nlink,
            size,
            mode: node.meta.mode,
            uid: node.meta.uid,
            gid: node.meta.gid,
            atime: node.meta.atime(),
            mtime: node.meta.mtime,
            ctime: node.meta.ctime,
        }
    }

    fn existing(&self, inner: &Path, follow: bool) -> FsResult<NodeId> {
        let id = if follow {
            self.resolve_following_symlinks(inner)
        } else {
            self.resolve(inner)
        };
        id.ok_or_else(|| FsError::not_found(inner))
    }

    fn file_ino(&self, id: NodeId, inner: &Path) -> FsResult<u64> {
        match self.nodes.get(&id).map(|node| &node.kind) {
            Some(NodeKind::File { ino }) => Ok(*ino),
            Some(NodeKind::Directory { .. }) => Err(FsError::is_a_directory(inner)),
            _ => Err(FsError::not_found(inner)),
        }
    }

    fn reject_empty(path: &Path) -> FsResult<()> {
        if path.as_os_str().is_empty() {
            return Err(FsError::invalid("", "invalid path: empty"));
        }
        Ok(())
    }

    /// The directory that would hold `inner` and the entry name inside it. The parent must
    /// already exist; the name may or may not be taken.
    fn parent_slot(&self, inner: &Path) -> FsResult<(NodeId, String)> {
        let Some(name) = utils::file_name(inner) else {
            return Err(FsError::already_exists(inner));
        };
        let parent_path = inner.parent().unwrap_or(Path::new("/"));
        let parent = self
            .resolve_following_symlinks(parent_path)
            .ok_or_else(|| FsError::not_found(parent_path))?;
        if !self.is_dir_node(parent) {
            return Err(FsError::not_a_directory(parent_path));
        }
        Ok((parent, name))
    }

    /// Like `parent_slot`, but the name must be free.
    fn creation_slot(&self, inner: &Path) -> FsResult<(NodeId, String)> {
        let (parent, name) = self.parent_slot(inner)?;
        if self.child_of(parent, &name).is_some() {
            return Err(FsError::already_exists(inner));
        }
        Ok((parent, name))
    }

    /// Where an entry named `name` lands when copied/moved/linked to `dst`: inside `dst`
    /// when it is an existing directory, at `dst` itself otherwise.
    fn destination(&self, dst: &Path, name: &str) -> FsResult<(NodeId, String, PathBuf)> {
        match self.resolve_following_symlinks(dst) {
            Some(id) if self.is_dir_node(id) => Ok((id, name.to_string(), dst.join(name))),
            _ => {
                let (parent, name) = self.parent_slot(dst)?;
                Ok((parent, name, dst.to_path_buf()))
            }
        }
    }

    /// Strict create of an empty directory or regular file.
    pub fn create<P: AsRef<Path>>(&mut self, path: P, entry_type: EntryType) -> FsResult<NodeId> {
        match entry_type {
            EntryType::Directory => self.mkdir(path),
            EntryType::File => self.mkfile(path, &[]),
            EntryType::Symlink => Err(FsError::invalid(
                path.as_ref().display().to_string(),
                "a symlink needs a target, use symlink()",
            )),
        }
    }

    /// Creates a single directory. The parent must exist.
    pub fn mkdir<P: AsRef<Path>>(&mut self, path: P) -> FsResult<NodeId> {
        Self::reject_empty(path.as_ref())?;
        let inner = self.canonical(path);
        let (parent, name) = self.creation_slot(&inner)?;
        debug!("mkdir: {}", inner.display());
        Ok(self.insert_child(parent, &name, NewEntry::Directory))
    }

    /// Creates directory and all it parents (if needed). Succeeds if the directory exists.
    pub fn mkdir_p<P: AsRef<Path>>(&mut self, path: P) -> FsResult<NodeId> {
        Self::reject_empty(path.as_ref())?;
        let inner = self.canonical(path);
        if let Some(id) = self.resolve_following_symlinks(&inner) {
            if self.is_dir_node(id) {
                return Ok(id);
            }
            return Err(FsError::already_exists(&inner));
        }
        debug!("mkdir_p: {}", inner.display());
        self.ensure_dir(&inner)
    }

    /// Creates new regular file with `content`. The parent must exist.
    pub fn mkfile<P: AsRef<Path>>(&mut self, path: P, content: &[u8]) -> FsResult<NodeId> {
        Self::reject_empty(path.as_ref())?;
        let inner = self.canonical(path);
        let (parent, name) = self.creation_slot(&inner)?;
        debug!("mkfile: {} ({} bytes)", inner.display(), content.len());
        Ok(self.insert_child(parent, &name, NewEntry::File(content.to_vec())))
    }

    /// Reads the entire contents of a file (following symlinks) and updates its atime.
    pub fn read<P: AsRef<Path>>(&self, path: P) -> FsResult<Vec<u8>> {
        let inner = self.canonical(path);
        let id = self.existing(&inner, true)?;
        let ino = self.file_ino(id, &inner)?;
        self.nodes[&id].meta.touch_access();
        Ok(self.inodes.content(ino).map(<[u8]>::to_vec).unwrap_or_default())
    }

    /// Replaces the content of an existing file. Every hard link sees the new content.
    pub fn write<P: AsRef<Path>>(&mut self, path: P, content: &[u8]) -> FsResult<()> {
        let inner = self.canonical(path);
        let id = self.existing(&inner, true)?;
        let ino = self.file_ino(id, &inner)?;
        self.inodes.set_content(ino, content);
        if let Some(node) = self.node_mut(id) {
            node.meta.touch_modify();
        }
        Ok(())
    }

    /// Appends bytes to the end of an existing file.
    pub fn append<P: AsRef<Path>>(&mut self, path: P, content: &[u8]) -> FsResult<()> {
        let inner = self.canonical(path);
        let id = self.existing(&inner, true)?;
        let ino = self.file_ino(id, &inner)?;
        self.inodes.append_content(ino, content);
        if let Some(node) = self.node_mut(id) {
            node.meta.touch_modify();
        }
        Ok(())
    }

    /// Creates an empty file, or bumps atime and mtime of an existing entry.
    /// A dangling symlink gets its target created.
    pub fn touch<P: AsRef<Path>>(&mut self, path: P) -> FsResult<NodeId> {
        let mut inner = self.canonical(path);
        if let Some(id) = self.resolve_following_symlinks(&inner) {
            if let Some(node) = self.node_mut(id) {
                node.meta.touch_modify();
                node.meta.touch_access();
            }
            return Ok(id);
        }
        let mut depth = 0;
        while let Some(target) = self.resolve(&inner).and_then(|id| self.nodes[&id].symlink_target()) {
            if depth >= self.config.max_symlink_depth {
                return Err(FsError::invalid(
                    inner.display().to_string(),
                    "too many levels of symbolic links",
                ));
            }
            let base = inner.parent().unwrap_or(Path::new("/"));
            inner = utils::normalize(base.join(target));
            depth += 1;
        }
        let (parent, name) = self.creation_slot(&inner)?;
        debug!("touch: {}", inner.display());
        Ok(self.insert_child(parent, &name, NewEntry::File(Vec::new())))
    }

    /// Copies a single regular file. The copy gets its own inode.
    pub fn cp<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, src: P, dst: Q) -> FsResult<NodeId> {
        let src_inner = self.canonical(src);
        let dst_inner = self.canonical(dst);
        let src_id = self.existing(&src_inner, true)?;
        let src_ino = self.file_ino(src_id, &src_inner)?;
        let src_name = utils::file_name(&src_inner).unwrap_or_default();

        let (parent, name, path) = self.destination(&dst_inner, &src_name)?;
        let content = self.inodes.content(src_ino).unwrap_or_default().to_vec();
        debug!("cp: {} -> {}", src_inner.display(), path.display());

        if let Some(existing) = self.child_of(parent, &name) {
            let target = self
                .entry(existing)
                .ok_or_else(|| FsError::not_found(&path))?;
            if target == src_id {
                return Err(FsError::invalid(
                    path.display().to_string(),
                    "source and destination are the same file",
                ));
            }
            let ino = self.file_ino(target, &path)?;
            self.inodes.set_content(ino, &content);
            if let Some(node) = self.node_mut(target) {
                node.meta.touch_modify();
            }
            return Ok(target);
        }

        let mode = self.nodes[&src_id].meta.mode;
        let id = self.insert_child(parent, &name, NewEntry::File(content));
        if let Some(node) = self.node_mut(id) {
            node.meta.mode = mode;
        }
        Ok(id)
    }

    /// Recursive copy. Every copied file gets a fresh inode; symlinks inside the tree are
    /// copied verbatim.
    ///
    /// * `dst` is an existing directory: the source is nested as `dst/<name>`.
    /// * `dst` does not exist: the copy becomes `dst`.
    /// * `src` ends in `/.`: only the contents of `src` are copied into `dst`.
    pub fn cp_r<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, src: P, dst: Q) -> FsResult<NodeId> {
        let contents_only = utils::ends_with_current_dir(src.as_ref());
        let src_inner = self.canonical(src);
        let dst_inner = self.canonical(dst);
        let src_id = self.existing(&src_inner, true)?;
        debug!("cp_r: {} -> {}", src_inner.display(), dst_inner.display());

        if contents_only {
            if !self.is_dir_node(src_id) {
                return Err(FsError::not_a_directory(&src_inner));
            }
            let (anchor, missing) = match self.resolve_following_symlinks(&dst_inner) {
                Some(id) if self.is_dir_node(id) => (id, None),
                Some(_) => return Err(FsError::not_a_directory(&dst_inner)),
                None => {
                    let (parent, name) = self.parent_slot(&dst_inner)?;
                    (parent, Some(name))
                }
            };
            if self.is_ancestor(src_id, anchor) {
                return Err(FsError::invalid(
                    dst_inner.display().to_string(),
                    "cannot copy a directory into itself",
                ));
            }
            let dst_dir = match missing {
                Some(name) => self.insert_child(anchor, &name, NewEntry::Directory),
                None => anchor,
            };
            for (name, child) in self.child_entries(src_id) {
                self.copy_into(child, dst_dir, &name)?;
            }
            return Ok(dst_dir);
        }

        let Some(src_name) = utils::file_name(&src_inner) else {
            return Err(FsError::invalid("/", "cannot copy the root directory"));
        };
        let (parent, name, _) = self.destination(&dst_inner, &src_name)?;
        if self.is_ancestor(src_id, parent) {
            return Err(FsError::invalid(
                dst_inner.display().to_string(),
                "cannot copy a directory into itself",
            ));
        }
        self.copy_into(src_id, parent, &name)
    }

    fn child_entries(&self, dir: NodeId) -> Vec<(String, NodeId)> {
        self.nodes
            .get(&dir)
            .and_then(|node| node.children())
            .map(|children| children.iter().map(|(n, id)| (n.clone(), *id)).collect())
            .unwrap_or_default()
    }

    /// Copies `src` to `parent/name`, merging into what is already there.
    fn copy_into(&mut self, src: NodeId, parent: NodeId, name: &str) -> FsResult<NodeId> {
        let Some(existing) = self.child_of(parent, name) else {
            return Ok(self.deep_clone(src, parent, name));
        };
        let path = self.path_of(parent).join(name);
        let src_kind = self.nodes[&src].kind.clone();
        match src_kind {
            NodeKind::Directory { .. } => {
                let target = self
                    .entry(existing)
                    .filter(|id| self.is_dir_node(*id))
                    .ok_or_else(|| FsError::not_a_directory(&path))?;
                for (child_name, child) in self.child_entries(src) {
                    self.copy_into(child, target, &child_name)?;
                }
                Ok(target)
            }
            NodeKind::File { ino } => {
                let target = self.entry(existing).ok_or_else(|| FsError::not_found(&path))?;
                if target == src {
                    return Err(FsError::invalid(
                        path.display().to_string(),
                        "source and destination are the same file",
                    ));
                }
                let target_ino = self.file_ino(target, &path)?;
                let content = self.inodes.content(ino).unwrap_or_default().to_vec();
                self.inodes.set_content(target_ino, &content);
                if let Some(node) = self.node_mut(target) {
                    node.meta.touch_modify();
                }
                Ok(target)
            }
            NodeKind::Symlink { .. } => {
                if self.is_dir_node(existing) {
                    return Err(FsError::is_a_directory(&path));
                }
                self.detach(existing);
                self.release(existing);
                Ok(self.deep_clone(src, parent, name))
            }
        }
    }

    /// Clones the subtree at `src` as a new child `name` of `parent`.
    fn deep_clone(&mut self, src: NodeId, parent: NodeId, name: &str) -> NodeId {
        let (kind, mode) = {
            let node = &self.nodes[&src];
            (node.kind.clone(), node.meta.mode)
        };
        let id = match kind {
            NodeKind::Directory { children, .. } => {
                let id = self.insert_child(parent, name, NewEntry::Directory);
                for (child_name, child) in children {
                    self.deep_clone(child, id, &child_name);
                }
                id
            }
            NodeKind::File { ino } => {
                let content = self.inodes.content(ino).unwrap_or_default().to_vec();
                self.insert_child(parent, name, NewEntry::File(content))
            }
            NodeKind::Symlink { target } => {
                self.insert_child(parent, name, NewEntry::Symlink(target))
            }
        };
        if let Some(node) = self.node_mut(id) {
            node.meta.mode = mode;
        }
        id
    }

    /// Moves (renames) an entry. The node itself is re-parented, so its inode number and
    /// link count survive. A trailing symlink is moved, not its target.
    pub fn mv<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, src: P, dst: Q) -> FsResult<NodeId> {
        let src_inner = self.canonical(src);
        let dst_inner = self.canonical(dst);
        let src_id = self.existing(&src_inner, false)?;
        if src_id == self.root {
            return Err(FsError::not_permitted(&src_inner));
        }
        let src_name = self.nodes[&src_id].name.clone();
        let (parent, name, path) = self.destination(&dst_inner, &src_name)?;
        if self.is_ancestor(src_id, parent) {
            return Err(FsError::invalid(
                path.display().to_string(),
                "cannot move a directory into itself",
            ));
        }

        if let Some(existing) = self.child_of(parent, &name) {
            if existing == src_id {
                return Ok(src_id);
            }
            match (self.is_dir_node(src_id), self.is_dir_node(existing)) {
                (true, false) => return Err(FsError::not_a_directory(&path)),
                (false, true) => return Err(FsError::is_a_directory(&path)),
                (true, true) if !self.child_entries(existing).is_empty() => {
                    return Err(FsError::not_empty(&path));
                }
                _ => {}
            }
            self.detach(existing);
            self.release(existing);
        }

        debug!("mv: {} -> {}", src_inner.display(), path.display());
        self.detach(src_id);
        self.reattach(src_id, parent, &name);
        if let Some(node) = self.node_mut(src_id) {
            node.meta.touch_change();
        }
        Ok(src_id)
    }

    /// Creates a hard link `dst` sharing the inode of the regular file `src`.
    pub fn link<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, src: P, dst: Q) -> FsResult<NodeId> {
        let src_inner = self.canonical(src);
        let dst_inner = self.canonical(dst);
        let src_id = self.existing(&src_inner, true)?;
        if self.is_dir_node(src_id) {
            return Err(FsError::not_permitted(&src_inner));
        }
        let src_name = utils::file_name(&src_inner).unwrap_or_default();
        let (parent, name, path) = self.destination(&dst_inner, &src_name)?;
        if self.child_of(parent, &name).is_some() {
            return Err(FsError::already_exists(&path));
        }
        debug!("link: {} -> {}", path.display(), src_inner.display());
        self.insert_hard_link(parent, &name, src_id)
            .ok_or_else(|| FsError::not_found(&src_inner))
    }

    /// Creates a symbolic link at `dst` holding `target` verbatim. The target need not
    /// exist. If `dst` is an existing directory the link is placed inside it.
    pub fn symlink<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, target: P, dst: Q) -> FsResult<NodeId> {
        let target = target.as_ref().to_path_buf();
        let dst_inner = self.canonical(dst);
        let (parent, name, path) = match (
            self.resolve_following_symlinks(&dst_inner),
            utils::file_name(&target),
        ) {
            (Some(id), Some(base)) if self.is_dir_node(id) => {
                let path = dst_inner.join(&base);
                (id, base, path)
            }
            _ => {
                let (parent, name) = self.parent_slot(&dst_inner)?;
                (parent, name, dst_inner.clone())
            }
        };
        if self.child_of(parent, &name).is_some() {
            return Err(FsError::already_exists(&path));
        }
        debug!("symlink: {} -> {}", path.display(), target.display());
        Ok(self.insert_child(parent, &name, NewEntry::Symlink(target)))
    }

    /// The stored target of the symlink at `path`.
    pub fn readlink<P: AsRef<Path>>(&self, path: P) -> FsResult<PathBuf> {
        let inner = self.canonical(path);
        let id = self.existing(&inner, false)?;
        self.nodes[&id]
            .symlink_target()
            .map(Path::to_path_buf)
            .ok_or_else(|| FsError::invalid(inner.display().to_string(), "not a symbolic link"))
    }

    /// Removes a file or symlink.
    pub fn unlink<P: AsRef<Path>>(&mut self, path: P) -> FsResult<()> {
        let inner = self.canonical(path);
        let id = self.existing(&inner, false)?;
        if self.is_dir_node(id) {
            return Err(FsError::is_a_directory(&inner));
        }
        debug!("unlink: {}", inner.display());
        self.detach(id);
        self.release(id);
        Ok(())
    }

    /// Removes an empty directory.
    pub fn rmdir<P: AsRef<Path>>(&mut self, path: P) -> FsResult<()> {
        let inner = self.canonical(path);
        let id = self.existing(&inner, false)?;
        if !self.is_dir_node(id) {
            return Err(FsError::not_a_directory(&inner));
        }
        if id == self.root {
            return Err(FsError::not_permitted(&inner));
        }
        if !self.child_entries(id).is_empty() {
            return Err(FsError::not_empty(&inner));
        }
        debug!("rmdir: {}", inner.display());
        self.detach(id);
        self.release(id);
        Ok(())
    }

    /// Removes a file, symlink or a whole directory tree.
    /// The root cannot be removed.
    pub fn rm_r<P: AsRef<Path>>(&mut self, path: P) -> FsResult<()> {
        let inner = self.canonical(path);
        let id = self.existing(&inner, false)?;
        if id == self.root {
            return Err(FsError::not_permitted(&inner));
        }
        debug!("rm_r: {}", inner.display());
        self.detach(id);
        self.release(id);
        Ok(())
    }

    /// `rm_r` that treats a missing path as success.
    pub fn rm_rf<P: AsRef<Path>>(&mut self, path: P) -> FsResult<()> {
        match self.rm_r(path) {
            Err(FsError::NotFound { .. }) => Ok(()),
            other => other,
        }
    }

    /// Replaces the permission bits, keeping the file type.
    pub fn chmod<P: AsRef<Path>>(&mut self, path: P, mode: u32) -> FsResult<()> {
        let inner = self.canonical(path);
        let id = self.existing(&inner, true)?;
        if let Some(node) = self.node_mut(id) {
            node.meta.mode = (node.meta.mode & S_IFMT) | (mode & 0o7777);
            node.meta.touch_change();
        }
        Ok(())
    }

    /// Changes owner and/or group; `None` keeps the current value.
    pub fn chown<P: AsRef<Path>>(&mut self, path: P, uid: Option<u32>, gid: Option<u32>) -> FsResult<()> {
        let inner = self.canonical(path);
        let id = self.existing(&inner, true)?;
        if let Some(node) = self.node_mut(id) {
            if let Some(uid) = uid {
                node.meta.uid = uid;
            }
            if let Some(gid) = gid {
                node.meta.gid = gid;
            }
            node.meta.touch_change();
        }
        Ok(())
    }

    /// Sets access and modification times explicitly.
    pub fn utime<P: AsRef<Path>>(&mut self, path: P, atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        let inner = self.canonical(path);
        let id = self.existing(&inner, true)?;
        if let Some(node) = self.node_mut(id) {
            node.meta.atime.set(atime);
            node.meta.mtime = mtime;
            node.meta.touch_change();
        }
        Ok(())
    }

    /// Sorted child names of a directory.
    pub fn children<P: AsRef<Path>>(&self, path: P) -> FsResult<Vec<String>> {
        let inner = self.canonical(path);
        let id = self.existing(&inner, true)?;
        let children = self.nodes[&id]
            .children()
            .ok_or_else(|| FsError::not_a_directory(&inner))?;
        Ok(children.keys().cloned().collect())
    }

    /// Child names with the synthesized `.` and `..` in front.
    pub fn entries<P: AsRef<Path>>(&self, path: P) -> FsResult<Vec<String>> {
        let mut entries = vec![".".to_string(), "..".to_string()];
        entries.extend(self.children(path)?);
        Ok(entries)
    }

    /// Every path below `path`, sorted; the start itself is excluded. Symlinks are listed
    /// but not descended into. A file yields just itself.
    pub fn tree<P: AsRef<Path>>(&self, path: P) -> FsResult<Vec<PathBuf>> {
        let inner = self.canonical(path);
        let id = self.existing(&inner, true)?;
        if !self.is_dir_node(id) {
            return Ok(vec![inner]);
        }
        let mut out = Vec::new();
        self.collect_tree(id, &inner, &mut out);
        Ok(out)
    }

    fn collect_tree(&self, dir: NodeId, path: &Path, out: &mut Vec<PathBuf>) {
        for (name, child) in self.child_entries(dir) {
            let child_path = path.join(&name);
            out.push(child_path.clone());
            if self.is_dir_node(child) {
                self.collect_tree(child, &child_path, out);
            }
        }
    }
}
