//! Text and JSON rendering of a [`Reconciliation`]. Nothing here changes the outcome.

use crate::localize::FluentLoc;
use crate::verify::{Class, Reconciliation, ReconciliationEntry};
use owo_colors::OwoColorize;
use std::fmt::Write as _;

#[derive(Clone, Copy, Debug, Default)]
pub struct RenderConfig {
    /// List verified files and per-file detail.
    pub verbose: bool,
    pub color: bool,
}

const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Largest binary unit keeping the printed value under 1024; two decimals above bytes.
pub fn human_bytes(n: u64) -> String {
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    // 1023.995 and up would print as "1024.00".
    if unit > 0 && v >= 1023.995 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n} B")
    } else {
        format!("{v:.2} {}", UNITS[unit])
    }
}

/// Signed delta using its two most significant non-zero units, e.g. `+2d 3h`.
pub fn human_delta(seconds: i64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }
    let sign = if seconds < 0 { '-' } else { '+' };
    let mut rest = seconds.unsigned_abs();
    let mut parts = Vec::new();
    for (size, suffix) in [(86_400u64, "d"), (3_600, "h"), (60, "m"), (1, "s")] {
        let q = rest / size;
        rest %= size;
        if q > 0 {
            parts.push(format!("{q}{suffix}"));
        }
    }
    parts.truncate(2);
    format!("{sign}{}", parts.join(" "))
}

fn class_code(class: Class) -> &'static str {
    match class {
        Class::Verified => "class-verified",
        Class::Invalid => "class-invalid",
        Class::Missing => "class-missing",
        Class::Untracked => "class-untracked",
    }
}

fn paint(s: &str, class: Class, cfg: &RenderConfig) -> String {
    if !cfg.color {
        return s.to_string();
    }
    match class {
        Class::Verified => s.green().to_string(),
        Class::Invalid => s.red().to_string(),
        Class::Missing => s.yellow().to_string(),
        Class::Untracked => s.cyan().to_string(),
    }
}

fn detail(out: &mut String, e: &ReconciliationEntry, loc: &FluentLoc) {
    if let Some(rec) = &e.recorded {
        let _ = writeln!(
            out,
            "      {:<9} {}  {}  {}",
            loc.msg("report-recorded", &[]),
            rec.hash,
            human_bytes(rec.size),
            rec.date.to_rfc3339()
        );
    }
    if e.verify_size.is_none() && e.verify_date.is_none() {
        return;
    }
    let hash = e.verify_hash.clone().unwrap_or_else(|| loc.msg("report-not-hashed", &[]));
    let size = e.verify_size.map(human_bytes).unwrap_or_default();
    let when = match (&e.recorded, e.verify_date) {
        (Some(rec), Some(now)) => human_delta((now - rec.date).num_seconds()),
        (None, Some(now)) => now.to_rfc3339(),
        _ => String::new(),
    };
    let _ = writeln!(out, "      {:<9} {}  {}  {}", loc.msg("report-observed", &[]), hash, size, when);
}

pub fn render(rec: &Reconciliation, cfg: &RenderConfig, loc: &FluentLoc) -> String {
    let mut out = String::new();

    if !rec.warnings.is_empty() {
        let count = rec.warnings.len().to_string();
        let _ = writeln!(out, "{}", loc.msg("report-warnings", &[("count", &count)]));
        for w in &rec.warnings {
            let _ = writeln!(out, "  - {w}");
        }
    }

    let mut classes = vec![Class::Invalid, Class::Missing, Class::Untracked];
    if cfg.verbose {
        classes.insert(0, Class::Verified);
    }
    for class in classes {
        let entries: Vec<&ReconciliationEntry> = rec.in_class(class).collect();
        if entries.is_empty() {
            continue;
        }
        let label = loc.msg(class_code(class), &[]);
        let count = entries.len().to_string();
        let heading = loc.msg("report-heading", &[("label", &label), ("count", &count)]);
        let _ = writeln!(out, "{}", paint(&heading, class, cfg));
        for e in entries {
            let _ = writeln!(out, "  {}", e.path);
            if cfg.verbose {
                detail(&mut out, e, loc);
            }
        }
    }

    let s = &rec.summary;
    let (verified, invalid, missing, untracked) = (
        s.verified.to_string(),
        s.invalid.to_string(),
        s.missing.to_string(),
        s.untracked.to_string(),
    );
    let _ = writeln!(
        out,
        "{}",
        loc.msg(
            "report-tally",
            &[
                ("verified", &verified),
                ("invalid", &invalid),
                ("missing", &missing),
                ("untracked", &untracked),
            ],
        )
    );
    if rec.ignore_missing && s.missing > 0 {
        let _ = writeln!(out, "{}", loc.msg("report-missing-ignored", &[("count", &missing)]));
    }

    let root = rec.root.display().to_string();
    let manifest = rec.manifest_path.display().to_string();
    let args = [("root", root.as_str()), ("manifest", manifest.as_str())];
    let banner = if rec.passed() {
        paint(&loc.msg("report-pass", &args), Class::Verified, cfg)
    } else {
        paint(&loc.msg("report-fail", &args), Class::Invalid, cfg)
    };
    let _ = writeln!(out, "{banner}");
    out
}

pub fn render_json(rec: &Reconciliation) -> serde_json::Result<String> {
    serde_json::to_string_pretty(rec)
}
