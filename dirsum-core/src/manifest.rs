use crate::algorithm::Algorithm;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Hash")]
    pub hash: String,
    #[serde(rename = "Date")]
    pub date: DateTime<FixedOffset>,
    #[serde(rename = "Size")]
    pub size: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Manifest {
    #[serde(rename = "Algorithm")]
    pub algorithm: Algorithm,
    #[serde(rename = "Date")]
    pub date: DateTime<FixedOffset>,
    #[serde(rename = "Files")]
    pub files: Vec<FileRecord>,
    #[serde(rename = "TotalFiles")]
    pub total_files: usize,
    #[serde(rename = "OriginalLocation")]
    pub original_location: String,
    #[serde(rename = "HiddenFiles")]
    pub hidden_files: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManifestFormat {
    Json { pretty: bool },
    /// Human-oriented checksum listing; not readable by `verify`.
    Simple,
}

impl Default for ManifestFormat {
    fn default() -> Self {
        ManifestFormat::Json { pretty: false }
    }
}

impl Manifest {
    pub fn new(
        algorithm: Algorithm,
        date: DateTime<FixedOffset>,
        files: Vec<FileRecord>,
        original_location: String,
        hidden_files: bool,
    ) -> Self {
        let total_files = files.len();
        Self { algorithm, date, files, total_files, original_location, hidden_files }
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }

    pub fn to_simple(&self) -> String {
        let alg = self.algorithm.name();
        let mut out = String::new();
        out.push_str(&format!("# Checksums ({alg}) for {}\n", self.original_location));
        out.push_str("#\n");
        out.push_str("# Each line reads: ALGORITHM  hash  relative/path\n");
        out.push_str(&format!(
            "# To check a file, compute its {alg} digest and compare it with the hash on its line.\n"
        ));
        out.push_str("# This listing is for reading only; build a JSON manifest for automatic verification.\n");
        out.push_str("#\n");
        for f in &self.files {
            out.push_str(&format!("{alg}  {}  {}\n", f.hash, f.path));
        }
        out
    }

    pub fn render(&self, format: ManifestFormat) -> serde_json::Result<String> {
        match format {
            ManifestFormat::Json { pretty } => self.to_json(pretty),
            ManifestFormat::Simple => Ok(self.to_simple()),
        }
    }
}

/// Something expected in a manifest was absent or malformed; parsing carried on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SchemaWarning {
    pub field: String,
    pub message: String,
}

impl SchemaWarning {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Clone, Debug)]
pub struct ParsedManifest {
    pub manifest: Manifest,
    pub warnings: Vec<SchemaWarning>,
}

fn epoch() -> DateTime<FixedOffset> {
    DateTime::<Utc>::default().fixed_offset()
}

/// RFC 3339, or the `/Date(<millis>)/` form older JSON serializers emit.
pub fn parse_date(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(s.trim()) {
        return Some(d);
    }
    let inner = s.trim().strip_prefix("/Date(")?.strip_suffix(")/")?;
    let digits_end = inner.find(|c: char| c != '-' && !c.is_ascii_digit()).unwrap_or(inner.len());
    let millis: i64 = inner[..digits_end].parse().ok()?;
    Utc.timestamp_millis_opt(millis).single().map(|d| d.fixed_offset())
}

pub fn normalize_rel_path(p: &str) -> String {
    p.replace('\\', "/").trim_start_matches("./").to_string()
}

fn take_date(
    obj: &Map<String, Value>,
    key: &str,
    at: &str,
    w: &mut Vec<SchemaWarning>,
) -> DateTime<FixedOffset> {
    match obj.get(key) {
        Some(Value::String(s)) => parse_date(s).unwrap_or_else(|| {
            w.push(SchemaWarning::new(at, format!("unreadable date {s:?}")));
            epoch()
        }),
        Some(other) => {
            w.push(SchemaWarning::new(at, format!("expected a date string, got {other}")));
            epoch()
        }
        None => {
            w.push(SchemaWarning::new(at, "missing"));
            epoch()
        }
    }
}

fn parse_file(
    idx: usize,
    v: &Value,
    alg: Algorithm,
    w: &mut Vec<SchemaWarning>,
) -> Option<FileRecord> {
    let at = format!("Files[{idx}]");
    let Some(obj) = v.as_object() else {
        w.push(SchemaWarning::new(&at, "entry is not an object; skipped"));
        return None;
    };
    let Some(path) = obj.get("Path").and_then(Value::as_str) else {
        w.push(SchemaWarning::new(format!("{at}.Path"), "missing; entry skipped"));
        return None;
    };
    let path = normalize_rel_path(path);
    let hash = match obj.get("Hash").and_then(Value::as_str) {
        Some(h) => {
            let h = h.trim().to_ascii_lowercase();
            if !alg.accepts_hex(&h) {
                w.push(SchemaWarning::new(
                    format!("{at}.Hash"),
                    format!("{path}: not a {} digest", alg.name()),
                ));
            }
            h
        }
        None => {
            w.push(SchemaWarning::new(format!("{at}.Hash"), format!("{path}: missing")));
            String::new()
        }
    };
    let date = take_date(obj, "Date", &format!("{at}.Date"), w);
    let size = match obj.get("Size").and_then(Value::as_u64) {
        Some(s) => s,
        None => {
            w.push(SchemaWarning::new(
                format!("{at}.Size"),
                format!("{path}: missing or not a byte count"),
            ));
            0
        }
    };
    Some(FileRecord { path, hash, date, size })
}

/// Lenient manifest parse. `Err` carries the reason the text cannot be a
/// manifest at all; anything recoverable becomes a warning instead.
pub fn parse_manifest(text: &str, fallback: Option<Algorithm>) -> Result<ParsedManifest, String> {
    let root: Value = serde_json::from_str(text).map_err(|e| format!("not JSON ({e})"))?;
    let Value::Object(obj) = root else {
        return Err("top level is not a JSON object".to_string());
    };
    let mut w = Vec::new();

    let algorithm = match obj.get("Algorithm") {
        Some(Value::String(s)) => s.parse::<Algorithm>().map_err(|e| e.to_string())?,
        Some(other) => return Err(format!("Algorithm is not a string: {other}")),
        None => {
            let alg = fallback.unwrap_or_default();
            w.push(SchemaWarning::new("Algorithm", format!("missing; assuming {alg}")));
            alg
        }
    };

    let date = take_date(&obj, "Date", "Date", &mut w);

    let files = match obj.get("Files") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, v)| parse_file(i, v, algorithm, &mut w))
            .collect::<Vec<_>>(),
        Some(Value::Null) | None => {
            w.push(SchemaWarning::new("Files", "missing; treating as empty"));
            Vec::new()
        }
        Some(other) => return Err(format!("Files is not an array: {other}")),
    };

    let mut seen = HashSet::new();
    for f in &files {
        if !seen.insert(f.path.as_str()) {
            w.push(SchemaWarning::new("Files", format!("duplicate path {:?}", f.path)));
        }
    }

    let total_files = match obj.get("TotalFiles").and_then(Value::as_u64) {
        Some(n) => {
            if n as usize != files.len() {
                w.push(SchemaWarning::new(
                    "TotalFiles",
                    format!("says {n} but {} entries were read", files.len()),
                ));
            }
            n as usize
        }
        None => {
            w.push(SchemaWarning::new("TotalFiles", "missing"));
            files.len()
        }
    };

    let original_location = match obj.get("OriginalLocation").and_then(Value::as_str) {
        Some(s) => s.to_string(),
        None => {
            w.push(SchemaWarning::new("OriginalLocation", "missing"));
            String::new()
        }
    };

    let hidden_files = match obj.get("HiddenFiles").and_then(Value::as_bool) {
        Some(b) => b,
        None => {
            w.push(SchemaWarning::new("HiddenFiles", "missing; assuming false"));
            false
        }
    };

    let manifest =
        Manifest { algorithm, date, files, total_files, original_location, hidden_files };
    Ok(ParsedManifest { manifest, warnings: w })
}
