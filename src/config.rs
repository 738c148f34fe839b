use crate::console::{ConsoleKind, CustomConsoleConfig};
use crate::controller::TickSettings;
use crate::parsing::{Macro, ParserSettings, Synonym};
use crate::validation::RestrictionSettings;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/chatpad";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub console: ConsoleKind,
    pub parser: ParserSettings,
    pub tick: TickSettings,
    pub restrictions: RestrictionSettings,
    /// Inputs of the `generic` console.
    pub custom_console: CustomConsoleConfig,
    pub macros: Vec<Macro>,
    pub synonyms: Vec<Synonym>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            console: ConsoleKind::default(),
            parser: ParserSettings::default(),
            tick: TickSettings::default(),
            restrictions: RestrictionSettings::default(),
            custom_console: CustomConsoleConfig::default(),
            macros: vec![Macro::new("#mash(*)", "[<0>34ms #34ms]*20")],
            synonyms: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| eyre!("Failed to parse config: {}", e))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre!("Failed to serialize config: {}", e))
    }

    /// `~/.config/chatpad/config.toml`
    pub fn default_path() -> PathBuf {
        let mut path = get_home_dir();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Reads the config at `path`, writing the defaults there first if the
    /// file does not exist yet.
    pub async fn load_or_create(path: &Path) -> Result<Self> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config exists: {}", e))?;

        if !exists {
            info!("No config at {}, writing defaults", path.display());
            let config = Self::default();
            config.save(path).await?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config {}: {}", path.display(), e))?;
        let config = Self::from_toml(&content)?;
        debug!(
            "Loaded config for {} with {} macros and {} synonyms",
            config.console,
            config.macros.len(),
            config.synonyms.len()
        );
        Ok(config)
    }

    /// Takes a freshly loaded config while keeping the settings `running` was
    /// started with that cannot change without a restart: the console and the
    /// number of controller ports.
    pub fn reloaded_onto(mut self, running: &AppConfig) -> Self {
        if self.console != running.console || self.custom_console != running.custom_console {
            warn!(
                "Console changed to {}, keeping {} until restart",
                self.console, running.console
            );
            self.console = running.console;
            self.custom_console = running.custom_console.clone();
        }
        if self.parser.max_port != running.parser.max_port {
            warn!(
                "Port count changed to {}, keeping {} until restart",
                self.parser.max_port + 1,
                running.parser.max_port + 1
            );
            self.parser.max_port = running.parser.max_port;
        }
        self
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !tokio::fs::try_exists(dir)
                .await
                .map_err(|e| eyre!("Failed to check if config directory exists: {}", e))?
            {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
            }
        }

        tokio::fs::write(path, self.to_toml()?)
            .await
            .map_err(|e| eyre!("Failed to write config {}: {}", path.display(), e))?;
        info!("Saved config to {}", path.display());
        Ok(())
    }
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}
