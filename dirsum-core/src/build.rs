use crate::algorithm::Algorithm;
use crate::error::{Error, Result};
use crate::hasher;
use crate::manifest::{FileRecord, Manifest, ManifestFormat};
use crate::walk::{self, Files, WalkConfig};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Clone, Debug, Default)]
pub struct BuildOptions {
    pub algorithm: Algorithm,
    pub walk: WalkConfig,
    pub format: ManifestFormat,
    /// Where to write; defaults to `<root>/<root-name>.<ext>`.
    pub output: Option<PathBuf>,
    /// Return the serialized manifest without touching the filesystem.
    pub no_write: bool,
}

#[derive(Debug)]
pub struct BuildOutput {
    pub manifest: Manifest,
    pub serialized: String,
    pub written_to: Option<PathBuf>,
}

/// `<root-name>.<ext>`, or `manifest.<ext>` for a root with no name.
pub fn default_manifest_name(root: &Path, alg: Algorithm) -> String {
    let stem = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "manifest".to_string());
    format!("{stem}.{}", alg.extension())
}

pub(crate) fn modified_local(meta: &std::fs::Metadata) -> Option<DateTime<Local>> {
    meta.modified().ok().map(DateTime::<Local>::from)
}

pub struct Builder;

impl Builder {
    pub fn build(root: &Path, opts: &BuildOptions) -> Result<BuildOutput> {
        let root = walk::resolve_root(root)?;
        let out_path = match &opts.output {
            Some(p) => walk::resolve_lenient(p),
            None => root.join(default_manifest_name(&root, opts.algorithm)),
        };
        if opts.algorithm.is_legacy() {
            warn!(algorithm = %opts.algorithm, "legacy algorithm; prefer SHA256 for new manifests");
        }
        info!(root = %root.display(), algorithm = %opts.algorithm, "building manifest");

        let mut files = Vec::new();
        for ent in Files::new(&root, &opts.walk, Some(out_path.clone()))? {
            let ent = ent?;
            let path = ent.path();
            let meta = ent.metadata()?;
            let hash = hasher::digest(path, opts.algorithm)?;
            let date = modified_local(&meta).unwrap_or_else(Local::now).fixed_offset();
            let rel = walk::relative_slash_path(&root, path);
            debug!(path = %rel, size = meta.len(), "hashed");
            files.push(FileRecord { path: rel, hash, date, size: meta.len() });
        }

        let manifest = Manifest::new(
            opts.algorithm,
            Local::now().fixed_offset(),
            files,
            root.to_string_lossy().into_owned(),
            opts.walk.include_hidden,
        );
        let serialized = manifest
            .render(opts.format)
            .map_err(|e| Error::format(&out_path, e.to_string()))?;

        let written_to = if opts.no_write {
            None
        } else {
            std::fs::write(&out_path, serialized.as_bytes()).map_err(|e| Error::io(&out_path, e))?;
            info!(path = %out_path.display(), files = manifest.total_files, "manifest written");
            Some(out_path)
        };

        Ok(BuildOutput { manifest, serialized, written_to })
    }
}
