//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

const PROJECT_FILES: [&str; 2] = ["liminal.toml", ".liminal.toml"];
const ENV_PREFIX: &str = "LIMINAL_";

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `LIMINAL_` environment variables (`LIMINAL_SWARM__AGENTS=8`)
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./liminal.toml` or `./.liminal.toml`
    /// 4. XDG config: `$XDG_CONFIG_HOME/liminal/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        Self::figment(config_path).extract().map_err(Box::new)
    }

    /// The merged provider chain behind [`load`](Self::load)
    pub fn figment(config_path: Option<&PathBuf>) -> Figment {
        Self::files(
            Self::global_config_path().as_deref(),
            Self::project_config_path().as_deref(),
            config_path.map(PathBuf::as_path),
        )
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// File layers only, lowest priority first; missing files are skipped
    fn files(global: Option<&Path>, project: Option<&Path>, explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        for path in [global, project].into_iter().flatten() {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        // An explicit path that does not exist is an error, not a silent skip
        if let Some(path) = explicit {
            figment = figment.merge(Toml::file_exact(path));
        }

        figment
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    /// Get the global config file path
    ///
    /// Returns XDG_CONFIG_HOME/liminal/config.toml if set,
    /// otherwise falls back to ~/.config/liminal/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("liminal").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Print the config file locations being used (for debugging)
    pub fn print_config_sources(config_path: Option<&PathBuf>) {
        println!("Configuration sources (in priority order):");

        let env_vars: Vec<String> = std::env::vars()
            .map(|(key, _)| key)
            .filter(|key| key.starts_with(ENV_PREFIX))
            .collect();
        if env_vars.is_empty() {
            println!("  [     ] Env:     {}*", ENV_PREFIX);
        } else {
            println!("  [FOUND] Env:     {}", env_vars.join(", "));
        }

        if let Some(path) = config_path {
            let mark = if path.exists() { "FOUND" } else { "MISSING" };
            println!("  [{:<5}] Explicit: {}", mark, path.display());
        }

        if let Some(path) = Self::project_config_path() {
            println!("  [FOUND] Project: {}", path.display());
        } else {
            println!("  [     ] Project: ./liminal.toml or ./.liminal.toml");
        }

        if let Some(path) = Self::global_config_path() {
            if path.exists() {
                println!("  [FOUND] Global:  {}", path.display());
            } else {
                println!("  [     ] Global:  {}", path.display());
            }
        }

        println!("  [     ] Default: built-in defaults");
    }
}
