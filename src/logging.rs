use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "gla=warn";
const VERBOSE_FILTER: &str = "gla=debug";

/// Install the stderr subscriber. `GLA_LOG` (then `RUST_LOG`) overrides the
/// default filter; `--verbose` raises the default to debug.
pub fn init(verbose: bool) {
    let filter = std::env::var("GLA_LOG")
        .ok()
        .and_then(|value| EnvFilter::try_new(value).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Mask a secret for logs and terminal output, keeping a short prefix.
pub fn mask_secret(value: &str) -> String {
    if value.chars().count() <= 6 {
        "***".to_string()
    } else {
        let prefix: String = value.chars().take(3).collect();
        format!("{prefix}***")
    }
}
