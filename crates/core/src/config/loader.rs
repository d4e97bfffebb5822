//! Profile loading, secret overlay, and the process-wide config handle.

use super::{Config, Secrets};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load a TOML profile file and overlay secrets from the environment.
///
/// `.env` is loaded first (if present) via `dotenvy` so a local checkout
/// without exported shell variables still works; real environment variables
/// always take precedence over `.env` entries.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config profile {:?}", path))?;
    let mut config: Config =
        toml::from_str(&raw).with_context(|| format!("parsing config profile {:?}", path))?;
    config.secrets = load_secrets();
    info!(profile = %config.profile, path = %path.display(), "loaded configuration profile");
    Ok(config)
}

fn load_secrets() -> Secrets {
    match dotenvy::dotenv() {
        Ok(path) => info!(path = %path.display(), "loaded .env overlay"),
        Err(dotenvy::Error::Io(_)) => {}
        Err(e) => warn!(error = %e, "failed to parse .env, ignoring"),
    }

    Secrets {
        liquidator_key: std::env::var("LIQUIDATOR_PRIVATE_KEY").ok(),
        aggregator_api_key: std::env::var("AGGREGATOR_API_KEY").ok(),
    }
}

/// Initialize the process-wide configuration handle. Should be called exactly
/// once, before the first call to [`config`]. A second call is ignored rather
/// than panicking: the handle is a `OnceLock`, so the first caller always
/// wins, and tests across modules each try to seed it with equivalent
/// defaults.
pub fn init_config(config: Config) {
    let _ = CONFIG.set(config);
}

/// Access the process-wide configuration. Panics if [`init_config`] has not
/// run yet — every entry point calls it first thing in `main`.
pub fn config() -> &'static Config {
    CONFIG.get().expect("config accessed before init_config")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_from_file_applies_defaults() {
        let dir = std::env::temp_dir().join(format!(
            "liquidator-config-test-{:?}",
            std::thread::current().id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("profile.toml");
        std::fs::write(&path, "profile = \"staging\"\n").unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.profile, "staging");
        assert_eq!(config.thresholds.close_factor_pct, 50);
        assert_eq!(config.timing.prepared_ttl_ms, 30_000);

        std::fs::remove_dir_all(&dir).ok();
    }
}
