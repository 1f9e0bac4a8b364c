use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::FirstRunPolicy;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub epsilon: Option<f64>,
    pub count_label: Option<String>,
    pub first_run_policy: Option<FirstRunPolicy>,
    pub snapshot_dir: Option<PathBuf>,
    pub report_title: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let config: Config =
            toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
        Ok(config)
    }

    pub fn discover() -> Option<Self> {
        let path = Path::new("mediadrift.toml");
        if path.exists() {
            Config::load(path).ok()
        } else {
            None
        }
    }
}
