use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use dirsum_core::algorithm::{Algorithm, UnknownAlgorithm};
use dirsum_core::error::exit;
use dirsum_core::localize::FluentLoc;
use dirsum_core::report::{self, RenderConfig};
use dirsum_core::walk::WalkConfig;
use dirsum_core::{BuildOptions, Builder, ManifestFormat, VerifyOptions};

mod logging;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn enabled(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
            }
        }
    }
}

#[derive(Parser)]
#[command(name = "dirsum", version, about = "Checksum manifests for directory trees")]
struct Cli {
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    color: ColorMode,
    /// Log filter, e.g. `info` or `dirsum_core=debug` (overrides DIRSUM_LOG)
    #[arg(long, global = true, value_parser = logging::parse_filter)]
    log: Option<String>,
    #[command(subcommand)]
    cmd: Cmd,
}

fn parse_algorithm(s: &str) -> Result<Algorithm, UnknownAlgorithm> {
    s.parse()
}

#[derive(Subcommand)]
enum Cmd {
    /// Hash every file under ROOT and write `<root-name>.<algorithm>`
    Build {
        #[arg(default_value = ".")]
        root: PathBuf,
        #[arg(long, short, default_value = "sha256", value_parser = parse_algorithm)]
        algorithm: Algorithm,
        /// Descend into subdirectories
        #[arg(long, short)]
        recurse: bool,
        /// Maximum levels below ROOT's children (implies --recurse)
        #[arg(long)]
        depth: Option<usize>,
        /// Include hidden files and directories
        #[arg(long)]
        hidden: bool,
        /// Keep only files whose name matches (repeatable)
        #[arg(long)]
        include: Vec<String>,
        /// Drop files whose name matches; wins over --include (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
        /// Indented JSON
        #[arg(long, conflicts_with = "simple")]
        pretty: bool,
        /// Plain `ALGORITHM  hash  path` listing (cannot be verified)
        #[arg(long)]
        simple: bool,
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Print the manifest instead of writing it
        #[arg(long)]
        no_write: bool,
    },
    /// Check ROOT against its manifest
    Verify {
        #[arg(default_value = ".")]
        root: PathBuf,
        #[arg(long, short)]
        manifest: Option<PathBuf>,
        /// Missing files do not fail the run
        #[arg(long)]
        ignore_missing: bool,
        /// Report files on disk that the manifest does not list
        #[arg(long)]
        untracked: bool,
        /// Override the manifest's hidden-file setting
        #[arg(long, value_name = "BOOL")]
        hidden: Option<bool>,
        /// Look for untracked files in subdirectories too
        #[arg(long, short)]
        recurse: bool,
        /// Maximum levels below ROOT's children (implies --recurse)
        #[arg(long)]
        depth: Option<usize>,
        /// Treat manifest warnings as errors
        #[arg(long)]
        strict: bool,
        /// Refuse tracked paths that pass through symlinks
        #[arg(long)]
        no_follow: bool,
        #[arg(long, short)]
        verbose: bool,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let color = cli.color.enabled();
    logging::init(cli.log.as_deref(), color && std::io::stderr().is_terminal());
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), color, "dirsum starting");
    let code = match run(cli.cmd, color) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            e.downcast_ref::<dirsum_core::Error>().map(|e| e.exit_code()).unwrap_or(exit::RUNTIME)
        }
    };
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn run(cmd: Cmd, color: bool) -> Result<i32> {
    match cmd {
        Cmd::Build {
            root,
            algorithm,
            recurse,
            depth,
            hidden,
            include,
            exclude,
            pretty,
            simple,
            output,
            no_write,
        } => {
            let format =
                if simple { ManifestFormat::Simple } else { ManifestFormat::Json { pretty } };
            let opts = BuildOptions {
                algorithm,
                walk: WalkConfig {
                    recursive: recurse,
                    max_depth: depth,
                    include_hidden: hidden,
                    include,
                    exclude,
                    ..WalkConfig::default()
                },
                format,
                output,
                no_write,
            };
            build(&root, &opts)
        }
        Cmd::Verify {
            root,
            manifest,
            ignore_missing,
            untracked,
            hidden,
            recurse,
            depth,
            strict,
            no_follow,
            verbose,
            json,
        } => {
            let opts = VerifyOptions {
                manifest,
                include_untracked: untracked,
                hidden_override: hidden,
                ignore_missing,
                strict,
                follow_symlinks: !no_follow,
                recursive: recurse,
                max_depth: depth,
            };
            verify(&root, &opts, RenderConfig { verbose, color }, json)
        }
    }
}

fn build(root: &Path, opts: &BuildOptions) -> Result<i32> {
    let out = Builder::build(root, opts).with_context(|| format!("build {}", root.display()))?;
    match &out.written_to {
        Some(path) => {
            eprintln!("Hashed {} file(s) into {}", out.manifest.total_files, path.display())
        }
        None => print!("{}", out.serialized),
    }
    Ok(exit::SUCCESS)
}

fn verify(root: &Path, opts: &VerifyOptions, cfg: RenderConfig, json: bool) -> Result<i32> {
    let rec = dirsum_core::verify(root, opts).with_context(|| format!("verify {}", root.display()))?;
    if json {
        println!("{}", report::render_json(&rec)?);
    } else {
        print!("{}", report::render(&rec, &cfg, &FluentLoc::default()));
    }
    Ok(rec.exit_code())
}
