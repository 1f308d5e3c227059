use std::fmt;
use std::path::{Component, Path, PathBuf};

#[derive(Clone, Copy, Debug)]
pub struct PathPolicy {
    pub follow_symlinks: bool,
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self { follow_symlinks: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsafePath {
    Empty,
    Absolute,
    ParentTraversal,
    Symlink(PathBuf),
    EscapesRoot,
}

impl fmt::Display for UnsafePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsafePath::Empty => f.write_str("empty path"),
            UnsafePath::Absolute => f.write_str("absolute paths are not allowed"),
            UnsafePath::ParentTraversal => f.write_str("parent traversal not allowed"),
            UnsafePath::Symlink(p) => write!(f, "symlink in path (not following): {:?}", p),
            UnsafePath::EscapesRoot => f.write_str("path escapes root"),
        }
    }
}

/// Map a manifest path onto `root`. Rejects absolute paths and `..`; when
/// following symlinks, an existing target must still resolve under root,
/// otherwise no component may be a symlink.
pub fn resolve_tracked(root: &Path, rel: &str, policy: PathPolicy) -> Result<PathBuf, UnsafePath> {
    let rel = Path::new(rel);
    if rel.as_os_str().is_empty() {
        return Err(UnsafePath::Empty);
    }
    if rel.is_absolute() || rel.has_root() {
        return Err(UnsafePath::Absolute);
    }
    for comp in rel.components() {
        match comp {
            Component::ParentDir => return Err(UnsafePath::ParentTraversal),
            Component::Prefix(_) | Component::RootDir => return Err(UnsafePath::Absolute),
            _ => {}
        }
    }
    let candidate = root.join(rel);
    if policy.follow_symlinks {
        // Missing files are not an escape; the caller classifies them.
        if let (Ok(root_can), Ok(cand_can)) =
            (dunce::canonicalize(root), dunce::canonicalize(&candidate))
        {
            if !cand_can.starts_with(&root_can) {
                return Err(UnsafePath::EscapesRoot);
            }
        }
        return Ok(candidate);
    }
    let mut cur = root.to_path_buf();
    for comp in rel.components() {
        cur.push(comp);
        if let Ok(m) = std::fs::symlink_metadata(&cur) {
            if m.file_type().is_symlink() {
                return Err(UnsafePath::Symlink(cur));
            }
        }
    }
    Ok(candidate)
}
