/// Defaults applied to nodes created by a `MemFS` instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsConfig {
    /// Permission bits cleared from new files (`0o666`) and directories (`0o777`).
    pub umask: u32,
    pub uid: u32,
    pub gid: u32,
    /// Longest symlink chain followed before a lookup gives up.
    pub max_symlink_depth: usize,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            umask: 0o022,
            uid: 0,
            gid: 0,
            max_symlink_depth: 40,
        }
    }
}

impl FsConfig {
    pub fn with_umask(mut self, umask: u32) -> Self {
        self.umask = umask & 0o777;
        self
    }

    pub fn with_owner(mut self, uid: u32, gid: u32) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    pub fn with_max_symlink_depth(mut self, depth: usize) -> Self {
        self.max_symlink_depth = depth;
        self
    }

    pub(crate) fn dir_mode(&self) -> u32 {
        crate::vfs::S_IFDIR | (0o777 & !self.umask)
    }

    pub(crate) fn file_mode(&self) -> u32 {
        crate::vfs::S_IFREG | (0o666 & !self.umask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_modes() {
        let config = FsConfig::default();
        assert_eq!(config.dir_mode(), 0o040755);
        assert_eq!(config.file_mode(), 0o100644);
    }

    #[test]
    fn test_custom_umask() {
        let config = FsConfig::default().with_umask(0o077).with_owner(1000, 100);
        assert_eq!(config.dir_mode(), 0o040700);
        assert_eq!(config.file_mode(), 0o100600);
        assert_eq!((config.uid, config.gid), (1000, 100));
    }
}
