use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::charset::Charset;
use crate::registry;

/// Settings shared by the library and the command-line tool.
///
/// # Loading
///
/// ```rust,no_run
/// use imgmeta::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
/// config.apply().unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.write.preserve_timestamps = true;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How metadata is committed to files.
    pub write: WriteOptions,
    /// IPTC text handling.
    pub iptc: IptcOptions,
    /// Custom XMP namespaces registered by [`Config::apply`].
    pub xmp_namespaces: Vec<NamespaceConfig>,
}

/// Options for [`ImageMetadata::write_with`](crate::ImageMetadata::write_with).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Restore the access and modification times the file had when it was
    /// read, instead of keeping the times of the write.
    pub preserve_timestamps: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IptcOptions {
    /// Charset to declare when writing IPTC data (`utf-8`), or none to leave
    /// the envelope as it is.
    pub charset: Option<String>,
}

impl IptcOptions {
    pub fn charset(&self) -> crate::Result<Option<Charset>> {
        self.charset.as_deref().map(Charset::from_name).transpose()
    }
}

/// A `prefix = uri` XMP namespace binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    pub prefix: String,
    pub uri: String,
}

impl Config {
    /// Config file path next to the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("imgmeta.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        config.iptc.charset().context("Invalid IPTC charset in config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Register the configured XMP namespaces. Bindings that are already
    /// registered with the same URI are left alone.
    pub fn apply(&self) -> Result<()> {
        for ns in &self.xmp_namespaces {
            if registry::namespace_uri(&ns.prefix).as_deref() == Some(ns.uri.as_str()) {
                continue;
            }
            registry::register_namespace(&ns.uri, &ns.prefix)
                .with_context(|| format!("Failed to register XMP namespace {}", ns.prefix))?;
        }
        Ok(())
    }
}
