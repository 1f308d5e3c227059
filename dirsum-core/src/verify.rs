use crate::algorithm::Algorithm;
use crate::build::{default_manifest_name, modified_local};
use crate::error::{exit, Error, Result};
use crate::hasher;
use crate::manifest::{parse_manifest, FileRecord, ParsedManifest, SchemaWarning};
use crate::path_safety::{resolve_tracked, PathPolicy};
use crate::walk::{self, Files, WalkConfig};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct VerifyOptions {
    /// Explicit manifest; otherwise `<root>/<root-name>.<ext>` is searched for.
    pub manifest: Option<PathBuf>,
    pub include_untracked: bool,
    /// Overrides the manifest's own `HiddenFiles` flag.
    pub hidden_override: Option<bool>,
    pub ignore_missing: bool,
    /// Turn schema warnings into a format error.
    pub strict: bool,
    pub follow_symlinks: bool,
    /// Recursion for the untracked scan; same meaning and default as [`WalkConfig`].
    pub recursive: bool,
    pub max_depth: Option<usize>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            manifest: None,
            include_untracked: false,
            hidden_override: None,
            ignore_missing: false,
            strict: false,
            follow_symlinks: true,
            recursive: false,
            max_depth: None,
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Found,
    Missing,
    Untracked,
}

/// Report bucket. `Invalid` is a found file whose digest differs.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Class {
    Verified,
    Invalid,
    Missing,
    Untracked,
}

#[derive(Serialize, Clone, Debug)]
pub struct ReconciliationEntry {
    pub path: String,
    /// `None` for untracked files.
    pub recorded: Option<FileRecord>,
    pub status: Status,
    pub verified: bool,
    pub verify_date: Option<DateTime<FixedOffset>>,
    pub verify_size: Option<u64>,
    pub verify_hash: Option<String>,
}

impl ReconciliationEntry {
    fn missing(rec: &FileRecord) -> Self {
        Self {
            path: rec.path.clone(),
            recorded: Some(rec.clone()),
            status: Status::Missing,
            verified: false,
            verify_date: None,
            verify_size: None,
            verify_hash: None,
        }
    }

    pub fn class(&self) -> Class {
        match (self.status, self.verified) {
            (Status::Found, true) => Class::Verified,
            (Status::Found, false) => Class::Invalid,
            (Status::Missing, _) => Class::Missing,
            (Status::Untracked, _) => Class::Untracked,
        }
    }
}

#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub verified: usize,
    pub invalid: usize,
    pub missing: usize,
    pub untracked: usize,
}

impl Summary {
    pub fn tally(entries: &[ReconciliationEntry]) -> Self {
        let mut s = Summary::default();
        for e in entries {
            match e.class() {
                Class::Verified => s.verified += 1,
                Class::Invalid => s.invalid += 1,
                Class::Missing => s.missing += 1,
                Class::Untracked => s.untracked += 1,
            }
        }
        s
    }

    /// Untracked files never fail a run.
    pub fn passed(&self, ignore_missing: bool) -> bool {
        self.invalid == 0 && (ignore_missing || self.missing == 0)
    }
}

#[derive(Serialize, Debug)]
pub struct Reconciliation {
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub algorithm: Algorithm,
    pub hidden_files: bool,
    pub ignore_missing: bool,
    /// Manifest order, then untracked files in enumeration order.
    pub entries: Vec<ReconciliationEntry>,
    pub warnings: Vec<SchemaWarning>,
    pub summary: Summary,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Reconciliation {
    /// First entry recorded under `path`.
    pub fn get(&self, path: &str) -> Option<&ReconciliationEntry> {
        self.index.get(path).map(|&i| &self.entries[i])
    }

    pub fn in_class(&self, class: Class) -> impl Iterator<Item = &ReconciliationEntry> + '_ {
        self.entries.iter().filter(move |e| e.class() == class)
    }

    pub fn passed(&self) -> bool {
        self.summary.passed(self.ignore_missing)
    }

    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            exit::SUCCESS
        } else {
            exit::VERIFY_FAILED
        }
    }
}

/// Find the manifest to check `root` against. Returns the path and the
/// algorithm its name implies, if any.
pub fn locate_manifest(
    root: &Path,
    explicit: Option<&Path>,
) -> Result<(PathBuf, Option<Algorithm>)> {
    if let Some(p) = explicit {
        if !p.is_file() {
            let tried = p.display().to_string();
            return Err(Error::NotFound { root: root.to_path_buf(), tried });
        }
        let implied = p.extension().and_then(|e| e.to_str()).and_then(|e| e.parse().ok());
        return Ok((p.to_path_buf(), implied));
    }
    let mut tried = Vec::new();
    for alg in Algorithm::SEARCH_ORDER {
        let name = default_manifest_name(root, alg);
        let candidate = root.join(&name);
        if candidate.is_file() {
            debug!(manifest = %candidate.display(), "located manifest");
            return Ok((candidate, Some(alg)));
        }
        tried.push(name);
    }
    Err(Error::NotFound { root: root.to_path_buf(), tried: tried.join(", ") })
}

pub fn load_manifest(
    path: &Path,
    implied: Option<Algorithm>,
    strict: bool,
) -> Result<ParsedManifest> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let text = String::from_utf8(bytes).map_err(|_| Error::format(path, "not UTF-8 text"))?;
    let text = text.trim_start_matches('\u{feff}');
    let parsed = parse_manifest(text, implied).map_err(|reason| Error::format(path, reason))?;
    for w in &parsed.warnings {
        warn!(manifest = %path.display(), "{}", w);
    }
    if strict && !parsed.warnings.is_empty() {
        let all: Vec<String> = parsed.warnings.iter().map(ToString::to_string).collect();
        return Err(Error::format(path, format!("strict mode: {}", all.join("; "))));
    }
    Ok(parsed)
}

fn is_same_file(candidate: &Path, target: &Path) -> bool {
    candidate.file_name() == target.file_name() && walk::resolve_lenient(candidate) == target
}

fn check_tracked(
    root: &Path,
    rec: &FileRecord,
    alg: Algorithm,
    policy: PathPolicy,
    warnings: &mut Vec<SchemaWarning>,
) -> Result<ReconciliationEntry> {
    let candidate = match resolve_tracked(root, &rec.path, policy) {
        Ok(p) => p,
        Err(why) => {
            warn!(path = %rec.path, "{}", why);
            let message = format!("{:?}: {}", rec.path, why);
            warnings.push(SchemaWarning { field: "Files".into(), message });
            return Ok(ReconciliationEntry::missing(rec));
        }
    };
    let meta = match std::fs::metadata(&candidate) {
        Ok(m) if m.is_file() => m,
        _ => return Ok(ReconciliationEntry::missing(rec)),
    };
    let hash = hasher::digest(&candidate, alg)?;
    let verified = hash == rec.hash;
    debug!(path = %rec.path, verified, "checked");
    Ok(ReconciliationEntry {
        path: rec.path.clone(),
        recorded: Some(rec.clone()),
        status: Status::Found,
        verified,
        verify_date: modified_local(&meta).map(|d| d.fixed_offset()),
        verify_size: Some(meta.len()),
        verify_hash: Some(hash),
    })
}

/// Check `root` against its manifest. Location and parse failures are
/// returned as errors before any file is read.
pub fn verify(root: &Path, opts: &VerifyOptions) -> Result<Reconciliation> {
    let root = walk::resolve_root(root)?;
    let (manifest_path, implied) = locate_manifest(&root, opts.manifest.as_deref())?;
    let ParsedManifest { manifest, mut warnings } =
        load_manifest(&manifest_path, implied, opts.strict)?;
    let manifest_self = walk::resolve_lenient(&manifest_path);
    let hidden = opts.hidden_override.unwrap_or(manifest.hidden_files);
    let policy = PathPolicy { follow_symlinks: opts.follow_symlinks };
    info!(
        root = %root.display(),
        manifest = %manifest_path.display(),
        algorithm = %manifest.algorithm,
        files = manifest.files.len(),
        "verifying"
    );

    let mut entries = Vec::with_capacity(manifest.files.len());
    for rec in &manifest.files {
        if is_same_file(&root.join(&rec.path), &manifest_self) {
            continue;
        }
        entries.push(check_tracked(&root, rec, manifest.algorithm, policy, &mut warnings)?);
    }

    if opts.include_untracked {
        let tracked: HashSet<&str> = manifest.files.iter().map(|f| f.path.as_str()).collect();
        let cfg = WalkConfig {
            recursive: opts.recursive,
            max_depth: opts.max_depth,
            include_hidden: hidden,
            follow_symlinks: opts.follow_symlinks,
            ..WalkConfig::default()
        };
        for ent in Files::new(&root, &cfg, Some(manifest_self.clone()))?.skip_unresolvable() {
            let ent = ent?;
            let rel = walk::relative_slash_path(&root, ent.path());
            if tracked.contains(rel.as_str()) {
                continue;
            }
            let meta = ent.metadata()?;
            entries.push(ReconciliationEntry {
                path: rel,
                recorded: None,
                status: Status::Untracked,
                verified: false,
                verify_date: modified_local(&meta).map(|d| d.fixed_offset()),
                verify_size: Some(meta.len()),
                verify_hash: None,
            });
        }
    }

    let mut index = HashMap::with_capacity(entries.len());
    for (i, e) in entries.iter().enumerate() {
        index.entry(e.path.clone()).or_insert(i);
    }
    let summary = Summary::tally(&entries);
    info!(
        verified = summary.verified,
        invalid = summary.invalid,
        missing = summary.missing,
        untracked = summary.untracked,
        "verification finished"
    );

    Ok(Reconciliation {
        root,
        manifest_path,
        algorithm: manifest.algorithm,
        hidden_files: hidden,
        ignore_missing: opts.ignore_missing,
        entries,
        warnings,
        summary,
        index,
    })
}
