//! Shell-style glob matching over a `MemFS` tree.
//!
//! Supported syntax: `?`, `*` (within one segment), `**` (any number of whole segments),
//! `[...]` character classes, `{a,b}` alternation (nesting-aware) and `\` escapes.

mod pattern;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::core::utils;
use crate::error::FsResult;
use crate::vfs::{MemFS, NodeId};
use pattern::Segment;

/// Matching options for [`MemFS::glob`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GlobFlags {
    /// Let wildcards match names starting with `.`.
    pub dotmatch: bool,
    /// Case-insensitive matching.
    pub casefold: bool,
}

impl GlobFlags {
    pub fn dotmatch() -> Self {
        Self { dotmatch: true, ..Self::default() }
    }

    pub fn casefold() -> Self {
        Self { casefold: true, ..Self::default() }
    }
}

impl MemFS {
    /// Returns every path matching any of `patterns`, sorted and without duplicates.
    ///
    /// Absolute patterns yield absolute paths. Relative patterns are matched from the cwd
    /// and their results are reported relative to it (the cwd itself as `.`); at the root
    /// there is nothing to strip, so results stay absolute.
    ///
    /// ```
    /// use fake_vfs::{GlobFlags, MemFS};
    ///
    /// let mut fs = MemFS::new();
    /// fs.mkdir_p("/src/bin").unwrap();
    /// fs.mkfile("/src/lib.rs", b"").unwrap();
    /// fs.mkfile("/src/bin/main.rs", b"").unwrap();
    ///
    /// let found = fs.glob(["/src/**/*.rs"], GlobFlags::default()).unwrap();
    /// assert_eq!(found, vec!["/src/bin/main.rs", "/src/lib.rs"]);
    /// ```
    pub fn glob<I, S>(&self, patterns: I, flags: GlobFlags) -> FsResult<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let cwd = self.cwd().to_path_buf();
        let mut results = BTreeSet::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if pattern.is_empty() {
                continue;
            }
            for expanded in pattern::expand_braces(pattern) {
                let relative = !expanded.starts_with('/');
                let absolute = if relative {
                    format!("{}/{}", cwd.display(), expanded)
                } else {
                    expanded
                };
                trace!("glob: {} -> {}", pattern, absolute);

                let segments = pattern::split_segments(&absolute)
                    .into_iter()
                    .map(|segment| pattern::compile(segment, flags.casefold))
                    .collect::<FsResult<Vec<_>>>()?;

                let mut found = Vec::new();
                self.match_segments(self.root_id(), Path::new("/"), &segments, flags, &mut found);
                for path in found {
                    results.insert(project(&path, relative, &cwd));
                }
            }
        }
        Ok(results.into_iter().collect())
    }

    fn match_segments(
        &self,
        dir: NodeId,
        path: &Path,
        segments: &[Segment],
        flags: GlobFlags,
        out: &mut Vec<PathBuf>,
    ) {
        let Some((segment, rest)) = segments.split_first() else {
            out.push(path.to_path_buf());
            return;
        };
        match segment {
            Segment::Recursive if rest.is_empty() => {
                // a trailing `**` lists one level only
                for (name, _) in self.visible_children(dir, false, flags) {
                    out.push(path.join(name));
                }
            }
            Segment::Recursive => {
                // `**/**` is the same as `**`
                let rest = match rest.iter().position(|s| !s.is_recursive()) {
                    Some(skip) => &rest[skip..],
                    None => &rest[rest.len() - 1..],
                };
                for (sub, sub_path) in self.directories_under(dir, path, flags) {
                    self.match_segments(sub, &sub_path, rest, flags, out);
                }
            }
            Segment::Literal(name) => {
                let child = self
                    .node(dir)
                    .and_then(|node| node.children())
                    .and_then(|children| children.get(name));
                if let Some(child) = child {
                    self.descend(*child, &path.join(name), rest, flags, out);
                }
            }
            Segment::Match { regex, dotted } => {
                for (name, child) in self.visible_children(dir, *dotted, flags) {
                    if regex.is_match(&name) {
                        self.descend(child, &path.join(&name), rest, flags, out);
                    }
                }
            }
        }
    }

    /// Continues matching below `child`. Symlinks to directories are walked through.
    fn descend(&self, child: NodeId, path: &Path, rest: &[Segment], flags: GlobFlags, out: &mut Vec<PathBuf>) {
        if rest.is_empty() {
            out.push(path.to_path_buf());
            return;
        }
        let Some(target) = self.entry(child) else {
            return;
        };
        if self.node(target).is_some_and(|node| node.is_dir()) {
            self.match_segments(target, path, rest, flags, out);
        }
    }

    /// Children of `dir`, minus hidden names unless `dotted` or `flags.dotmatch` allow them.
    fn visible_children(&self, dir: NodeId, dotted: bool, flags: GlobFlags) -> Vec<(String, NodeId)> {
        let Some(children) = self.node(dir).and_then(|node| node.children()) else {
            return Vec::new();
        };
        children
            .iter()
            .filter(|(name, _)| dotted || flags.dotmatch || !name.starts_with('.'))
            .map(|(name, id)| (name.clone(), *id))
            .collect()
    }

    /// `dir` itself plus every directory beneath it. Symlinks are not followed here and
    /// hidden directories are skipped unless `dotmatch` is set.
    fn directories_under(&self, dir: NodeId, path: &Path, flags: GlobFlags) -> Vec<(NodeId, PathBuf)> {
        let mut dirs = vec![(dir, path.to_path_buf())];
        let mut i = 0;
        while i < dirs.len() {
            let (current, current_path) = dirs[i].clone();
            for (name, child) in self.visible_children(current, false, flags) {
                if self.node(child).is_some_and(|node| node.is_dir()) {
                    dirs.push((child, current_path.join(name)));
                }
            }
            i += 1;
        }
        dirs
    }
}

/// Converts a matched path back into the string handed to the caller.
fn project(path: &Path, relative: bool, cwd: &Path) -> String {
    if relative && !utils::is_virtual_root(cwd) {
        if path == cwd {
            return ".".to_string();
        }
        if let Ok(rest) = path.strip_prefix(cwd) {
            return rest.display().to_string();
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FsError;

    fn setup_test_vfs() -> MemFS {
        let mut fs = MemFS::new();
        fs.mkdir_p("/path/bar").unwrap();
        fs.mkfile("/path/foo", b"").unwrap();
        fs.mkfile("/path/foobar", b"").unwrap();
        fs.mkfile("/path/bar/baz", b"").unwrap();
        fs
    }

    fn glob(fs: &MemFS, pattern: &str) -> Vec<String> {
        fs.glob([pattern], GlobFlags::default()).unwrap()
    }

    mod wildcards {
        use super::*;

        #[test]
        fn test_star() {
            let fs = setup_test_vfs();
            assert_eq!(glob(&fs, "/path/*"), vec!["/path/bar", "/path/foo", "/path/foobar"]);
        }

        #[test]
        fn test_star_prefix() {
            let fs = setup_test_vfs();
            assert_eq!(glob(&fs, "/path/foo*"), vec!["/path/foo", "/path/foobar"]);
            assert_eq!(glob(&fs, "/*/ba?"), vec!["/path/bar"]);
        }

        #[test]
        fn test_star_sees_names_with_newlines() -> anyhow::Result<()> {
            let mut fs = MemFS::new();
            fs.mkfile("/a\nb", b"")?;
            assert_eq!(glob(&fs, "/*"), vec!["/a\nb"]);
            Ok(())
        }

        #[test]
        fn test_literal_path() {
            let fs = setup_test_vfs();
            assert_eq!(glob(&fs, "/path/bar/baz"), vec!["/path/bar/baz"]);
            assert!(glob(&fs, "/path/missing").is_empty());
        }

        #[test]
        fn test_character_class() {
            let mut fs = MemFS::new();
            for name in ["/log1", "/log2", "/logx"] {
                fs.mkfile(name, b"").unwrap();
            }
            assert_eq!(glob(&fs, "/log[0-9]"), vec!["/log1", "/log2"]);
            assert_eq!(glob(&fs, "/log[!0-9]"), vec!["/logx"]);
        }

        #[test]
        fn test_casefold() {
            let mut fs = MemFS::new();
            fs.mkfile("/README.md", b"").unwrap();
            assert!(glob(&fs, "/readme*").is_empty());
            let found = fs.glob(["/readme*"], GlobFlags::casefold()).unwrap();
            assert_eq!(found, vec!["/README.md"]);
        }

        #[test]
        fn test_invalid_class() {
            let fs = setup_test_vfs();
            let err = fs.glob(["/path/[z-a]"], GlobFlags::default()).unwrap_err();
            assert!(matches!(err, FsError::InvalidArgument { .. }));
        }

        #[test]
        fn test_wildcard_does_not_descend_into_files() {
            let fs = setup_test_vfs();
            assert!(glob(&fs, "/path/foo/*").is_empty());
        }
    }

    mod recursive {
        use super::*;

        #[test]
        fn test_double_star_then_star() {
            let fs = setup_test_vfs();
            assert_eq!(
                glob(&fs, "/path/**/*"),
                vec!["/path/bar", "/path/bar/baz", "/path/foo", "/path/foobar"]
            );
        }

        #[test]
        fn test_trailing_double_star_lists_one_level() {
            let fs = setup_test_vfs();
            assert_eq!(glob(&fs, "/path/**"), vec!["/path/bar", "/path/foo", "/path/foobar"]);
        }

        #[test]
        fn test_double_star_matches_zero_segments() {
            let fs = setup_test_vfs();
            assert_eq!(glob(&fs, "/**/foo"), vec!["/path/foo"]);
            assert_eq!(glob(&fs, "/path/**/baz"), vec!["/path/bar/baz"]);
        }

        #[test]
        fn test_repeated_double_star() {
            let fs = setup_test_vfs();
            assert_eq!(glob(&fs, "/**/**/baz"), vec!["/path/bar/baz"]);
        }

        #[test]
        fn test_double_star_skips_hidden_directories() {
            let mut fs = setup_test_vfs();
            fs.mkdir("/path/.git").unwrap();
            fs.mkfile("/path/.git/config", b"").unwrap();
            assert!(glob(&fs, "/**/config").is_empty());
            let found = fs.glob(["/**/config"], GlobFlags::dotmatch()).unwrap();
            assert_eq!(found, vec!["/path/.git/config"]);
        }

        #[test]
        fn test_results_are_deduplicated() {
            let fs = setup_test_vfs();
            let found = fs
                .glob(["/path/*", "/path/foo", "/path/**"], GlobFlags::default())
                .unwrap();
            assert_eq!(found, vec!["/path/bar", "/path/foo", "/path/foobar"]);
        }
    }

    mod braces {
        use super::*;

        #[test]
        fn test_alternatives_sorted() {
            let mut fs = MemFS::new();
            fs.mkdir("/path").unwrap();
            fs.mkfile("/path/foo", b"").unwrap();
            fs.mkfile("/path/bar", b"").unwrap();
            assert_eq!(glob(&fs, "/path/{foo,bar}"), vec!["/path/bar", "/path/foo"]);
        }

        #[test]
        fn test_nested_and_across_segments() {
            let fs = setup_test_vfs();
            assert_eq!(
                glob(&fs, "/path/{foo{,bar},bar/{baz,qux}}"),
                vec!["/path/bar/baz", "/path/foo", "/path/foobar"]
            );
        }

        #[test]
        fn test_unbalanced_brace_is_literal() {
            let mut fs = MemFS::new();
            fs.mkfile("/{odd", b"").unwrap();
            assert_eq!(glob(&fs, "/{odd"), vec!["/{odd"]);
        }
    }

    mod dotfiles {
        use super::*;

        fn setup() -> MemFS {
            let mut fs = MemFS::new();
            fs.mkfile("/.hidden", b"").unwrap();
            fs.mkfile("/visible", b"").unwrap();
            fs
        }

        #[test]
        fn test_star_skips_hidden() {
            let fs = setup();
            assert_eq!(glob(&fs, "*"), vec!["/visible"]);
        }

        #[test]
        fn test_dotmatch_flag() {
            let fs = setup();
            let found = fs.glob(["*"], GlobFlags::dotmatch()).unwrap();
            assert_eq!(found, vec!["/.hidden", "/visible"]);
        }

        #[test]
        fn test_pattern_starting_with_dot() {
            let fs = setup();
            assert_eq!(glob(&fs, "/.*"), vec!["/.hidden"]);
            assert_eq!(glob(&fs, "/.hidden"), vec!["/.hidden"]);
        }
    }

    mod relative {
        use super::*;

        #[test]
        fn test_results_relative_to_cwd() -> anyhow::Result<()> {
            let mut fs = setup_test_vfs();
            fs.chdir("/path")?;
            assert_eq!(glob(&fs, "*"), vec!["bar", "foo", "foobar"]);
            assert_eq!(glob(&fs, "bar/*"), vec!["bar/baz"]);
            assert_eq!(glob(&fs, "."), vec!["."]);
            Ok(())
        }

        #[test]
        fn test_results_outside_cwd_stay_absolute() -> anyhow::Result<()> {
            let mut fs = setup_test_vfs();
            fs.chdir("/path/bar")?;
            assert_eq!(glob(&fs, "../foo*"), vec!["/path/foo", "/path/foobar"]);
            Ok(())
        }

        #[test]
        fn test_absolute_pattern_ignores_cwd() -> anyhow::Result<()> {
            let mut fs = setup_test_vfs();
            fs.chdir("/path/bar")?;
            assert_eq!(glob(&fs, "/path/foo"), vec!["/path/foo"]);
            Ok(())
        }
    }

    mod symlinks {
        use super::*;

        #[test]
        fn test_walks_through_symlinked_directory() -> anyhow::Result<()> {
            let mut fs = setup_test_vfs();
            fs.symlink("/path/bar", "/link")?;
            assert_eq!(glob(&fs, "/link/*"), vec!["/link/baz"]);
            Ok(())
        }

        #[test]
        fn test_double_star_does_not_follow_symlinks() -> anyhow::Result<()> {
            let mut fs = setup_test_vfs();
            fs.symlink("/path", "/path/bar/loop")?;
            assert_eq!(glob(&fs, "/**/baz"), vec!["/path/bar/baz"]);
            Ok(())
        }
    }
}
