//! Configuration loading

use anyhow::Result;

use crate::Config;

/// Load configuration from a config file and/or environment variables
///
/// Config file search order:
/// 1. Explicit path (`--config` / `HLSRELAY_CONFIG_PATH`)
/// 2. ./config.yaml (current working directory)
/// 3. /config/config.yaml (container mount path)
/// 4. Fall back to environment variables only
///
/// Logging is not initialised yet when this runs, so progress goes to stderr.
pub fn load_config(explicit_path: Option<&str>) -> Result<Config> {
    if let Some(path) = explicit_path {
        if !std::path::Path::new(path).is_file() {
            return Err(anyhow::anyhow!("Config file {path} does not exist"));
        }
    }

    let config_path = explicit_path
        .map(str::to_string)
        .or_else(|| existing("config.yaml"))
        .or_else(|| existing("/config/config.yaml"));

    let config = if let Some(path) = config_path {
        eprintln!("Loading config from {path}");
        Config::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Failed to load config from {path}: {e}"))?
    } else {
        eprintln!("No config file found, using environment variables");
        Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?
    };

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Config validation error: {error}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    Ok(config)
}

fn existing(path: &str) -> Option<String> {
    std::path::Path::new(path)
        .exists()
        .then(|| path.to_string())
}
