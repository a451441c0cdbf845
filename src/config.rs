use anyhow::{Context, Result};
use serde::*;
use std::path::{Path, PathBuf};

use crate::paper::PaperOptions;

/// User preferences: the options used when the command line does not say otherwise.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub options: PaperOptions,
}

impl Config {
    pub fn file_name() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "papermodel", "papermodel")
            .ok_or(anyhow::anyhow!("Unknown configuration directory"))?;
        let dir = dirs.preference_dir();
        Ok(PathBuf::from(dir).join("papermodel.json"))
    }
    fn load() -> Result<Config> {
        Self::load_from(&Self::file_name()?)
    }
    pub fn load_from(file_name: &Path) -> Result<Config> {
        let f = std::fs::File::open(file_name)
            .with_context(|| format!("cannot open config {}", file_name.display()))?;
        let f = std::io::BufReader::new(f);
        let cfg = serde_json::from_reader(f)
            .with_context(|| format!("invalid config {}", file_name.display()))?;
        Ok(cfg)
    }
    pub fn save_to(&self, file_name: &Path) -> Result<()> {
        if let Some(d) = file_name.parent() {
            std::fs::create_dir_all(d)?
        }
        let f = std::fs::File::create(file_name)?;
        let f = std::io::BufWriter::new(f);
        serde_json::to_writer_pretty(f, self)?;
        Ok(())
    }
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::file_name()?)
    }

    pub fn load_or_default() -> Config {
        match Self::load() {
            Ok(c) => c,
            Err(e) => {
                log::debug!("using the default configuration: {e:#}");
                Config::default()
            }
        }
    }
}
