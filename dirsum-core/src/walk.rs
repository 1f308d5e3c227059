//! Candidate file enumeration under a root directory.

use crate::error::{Error, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

#[derive(Clone, Debug)]
pub struct WalkConfig {
    pub recursive: bool,
    /// Levels below the root's children to descend. Setting it implies `recursive`.
    pub max_depth: Option<usize>,
    pub include_hidden: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub follow_symlinks: bool,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            recursive: false,
            max_depth: None,
            include_hidden: false,
            include: Vec::new(),
            exclude: Vec::new(),
            follow_symlinks: true,
        }
    }
}

impl WalkConfig {
    /// Full-tree walk honouring only the visibility flag.
    #[cfg(test)]
    pub(crate) fn everything(include_hidden: bool) -> Self {
        Self { recursive: true, include_hidden, ..Self::default() }
    }

    fn walkdir_max_depth(&self) -> usize {
        match (self.max_depth, self.recursive) {
            (Some(d), _) => d.saturating_add(1),
            (None, true) => usize::MAX,
            (None, false) => 1,
        }
    }
}

/// File-name patterns, case-insensitive. Exclusion beats inclusion.
#[derive(Clone, Debug)]
pub struct NameFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

fn build_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut b = GlobSetBuilder::new();
    for p in patterns {
        let glob = GlobBuilder::new(p)
            .case_insensitive(true)
            .literal_separator(true)
            .build()
            .map_err(|source| Error::Pattern { pattern: p.clone(), source })?;
        b.add(glob);
    }
    let set = b
        .build()
        .map_err(|source| Error::Pattern { pattern: patterns.join(","), source })?;
    Ok(Some(set))
}

impl NameFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self { include: build_set(include)?, exclude: build_set(exclude)? })
    }

    pub fn allows(&self, file_name: &str) -> bool {
        if let Some(inc) = &self.include {
            if !inc.is_match(file_name) {
                return false;
            }
        }
        match &self.exclude {
            Some(exc) => !exc.is_match(file_name),
            None => true,
        }
    }
}

#[cfg(windows)]
fn has_hidden_attribute(ent: &DirEntry) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    ent.metadata().map(|m| m.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0).unwrap_or(false)
}

#[cfg(not(windows))]
fn has_hidden_attribute(_ent: &DirEntry) -> bool {
    false
}

pub fn is_hidden(ent: &DirEntry) -> bool {
    ent.file_name().to_str().map(|s| s.starts_with('.')).unwrap_or(false) || has_hidden_attribute(ent)
}

/// Canonical form of `root`, which must be an existing directory.
pub fn resolve_root(root: &Path) -> Result<PathBuf> {
    let resolved = dunce::canonicalize(root).map_err(|e| Error::path(root, e.to_string()))?;
    if !resolved.is_dir() {
        return Err(Error::path(root, "not a directory"));
    }
    Ok(resolved)
}

/// Resolve a path that may not exist yet by canonicalizing its parent.
pub fn resolve_lenient(path: &Path) -> PathBuf {
    if let Ok(p) = dunce::canonicalize(path) {
        return p;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
            dunce::canonicalize(parent).map(|p| p.join(name)).unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

/// Root-relative path with `/` separators.
pub fn relative_slash_path(root: &Path, path: &Path) -> String {
    let rel = pathdiff::diff_paths(path, root).unwrap_or_else(|| path.to_path_buf());
    let parts: Vec<String> =
        rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
    parts.join("/")
}

/// Lazy sequence of regular files under a resolved root, in directory enumeration order.
pub struct Files {
    inner: Box<dyn Iterator<Item = walkdir::Result<DirEntry>>>,
    names: NameFilter,
    skip: Option<PathBuf>,
    skip_unresolvable: bool,
}

/// A followed link whose target is gone, or a link back into its own ancestry.
fn is_unresolvable_link(err: &walkdir::Error) -> bool {
    if err.loop_ancestor().is_some() {
        return true;
    }
    err.path()
        .and_then(|p| std::fs::symlink_metadata(p).ok())
        .is_some_and(|m| m.file_type().is_symlink())
}

impl Files {
    pub fn new(root: &Path, cfg: &WalkConfig, skip: Option<PathBuf>) -> Result<Self> {
        let names = NameFilter::new(&cfg.include, &cfg.exclude)?;
        let include_hidden = cfg.include_hidden;
        let inner = WalkDir::new(root)
            .min_depth(1)
            .max_depth(cfg.walkdir_max_depth())
            .follow_links(cfg.follow_symlinks)
            .into_iter()
            .filter_entry(move |e| include_hidden || e.depth() == 0 || !is_hidden(e));
        Ok(Self { inner: Box::new(inner), names, skip, skip_unresolvable: false })
    }

    /// Drop dangling links and link loops with a warning instead of failing.
    pub fn skip_unresolvable(mut self) -> Self {
        self.skip_unresolvable = true;
        self
    }

    fn keep(&self, ent: &DirEntry) -> bool {
        if !ent.file_type().is_file() {
            return false;
        }
        if let Some(skip) = &self.skip {
            if skip.file_name() == Some(ent.file_name()) && resolve_lenient(ent.path()) == *skip {
                return false;
            }
        }
        self.names.allows(&ent.file_name().to_string_lossy())
    }
}

impl Iterator for Files {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Err(e) if self.skip_unresolvable && is_unresolvable_link(&e) => {
                    warn!("skipping unresolvable link: {}", e);
                    continue;
                }
                Err(e) => return Some(Err(e.into())),
                Ok(ent) if self.keep(&ent) => return Some(Ok(ent)),
                Ok(_) => continue,
            }
        }
    }
}
