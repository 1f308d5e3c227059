use tracing_subscriber::filter::ParseError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const ENV_VAR: &str = "DIRSUM_LOG";
const DEFAULT_FILTER: &str = "warn";

/// clap value parser for `--log`: the directive must parse as an `EnvFilter`.
pub fn parse_filter(s: &str) -> Result<String, ParseError> {
    EnvFilter::try_new(s).map(|_| s.to_string())
}

fn from_env() -> Option<EnvFilter> {
    match EnvFilter::try_from_env(ENV_VAR) {
        Ok(f) => Some(f),
        Err(_) if std::env::var_os(ENV_VAR).is_none() => None,
        Err(e) => {
            eprintln!("warning: ignoring {ENV_VAR}: {e}");
            None
        }
    }
}

/// Text logs on stderr. `--log` beats `DIRSUM_LOG`, which beats the default.
pub fn init(cli_filter: Option<&str>, ansi: bool) {
    let filter = match cli_filter {
        Some(f) => EnvFilter::new(f),
        None => from_env().unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER)),
    };

    let _ = Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(false).with_ansi(ansi).with_writer(std::io::stderr))
        .try_init();
}
