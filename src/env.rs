use anyhow::Result;
use log::error;
use std::{env, path::PathBuf};

pub struct Env {}

impl Env {
    pub const CONFIG_FILE_NAME: &'static str = "ddbench.yaml";
    pub const RESULTS_DIR: &'static str = "results";
    pub const PLOTS_DIR: &'static str = "plots";

    pub fn proj_root() -> Result<PathBuf> {
        env::current_dir().map_err(|e| {
            let reason = format!("failed to get current directory (error={e:?})");
            error!("{reason}");
            anyhow::anyhow!(reason)
        })
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let mut path = Self::proj_root()?;
        path.push(Self::CONFIG_FILE_NAME);
        Ok(path)
    }
}
