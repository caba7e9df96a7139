use crate::env::Env;
use anyhow::Result;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// How to reach the machines the experiments run on.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClusterConfig {
    /// Remote user name
    pub user: String,
    /// Host name, `{}` is replaced by the node index
    pub host_template: String,
    /// Directory on the remote machine where commands are run from
    pub remote_path: String,
    /// Options passed verbatim to `ssh`
    pub ssh_options: Vec<String>,
    /// Local private key, `~` is expanded
    pub identity_file: Option<String>,
    /// Node index used when none is given on the command line
    pub default_node: Option<u32>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            user: "andreal".to_string(),
            host_template: "fdr{}.ethz.ch".to_string(),
            remote_path: "/home/andreal/Src/differential-dataflow/experiments".to_string(),
            ssh_options: vec![
                "-o".to_string(),
                "UserKnownHostsFile=/dev/null".to_string(),
                "-o".to_string(),
                "StrictHostKeyChecking=no".to_string(),
                "-t".to_string(),
            ],
            identity_file: None,
            default_node: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub cluster: ClusterConfig,
    /// Root of the result files, relative paths are resolved against the
    /// project root
    pub results_dir: PathBuf,
    /// Root of the generated charts
    pub plots_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cluster: ClusterConfig::default(),
            results_dir: PathBuf::from(Env::RESULTS_DIR),
            plots_dir: PathBuf::from(Env::PLOTS_DIR),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            let reason = format!("error parsing configuration (error={e:?})");
            error!("{reason}");
            anyhow::anyhow!(reason)
        })
    }

    /// Load the configuration from `path` if given. Otherwise use
    /// `ddbench.yaml` in the project root when it exists, or the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default_path = Env::default_config_path()?;
                if !default_path.exists() {
                    debug!("load(): no configuration file, using defaults");
                    return Ok(Config::default());
                }
                default_path
            }
        };

        info!("loading configuration from {}", path.display());
        let contents = fs::read_to_string(&path).map_err(|e| {
            let reason = format!(
                "error reading configuration (path={}, error={e:?})",
                path.display()
            );
            error!("{reason}");
            anyhow::anyhow!(reason)
        })?;

        Self::from_yaml(&contents)
    }

    pub fn results_root(&self, proj_root: &Path) -> PathBuf {
        proj_root.join(&self.results_dir)
    }

    pub fn plots_root(&self, proj_root: &Path) -> PathBuf {
        proj_root.join(&self.plots_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.results_dir, PathBuf::from("results"));
        assert_eq!(config.plots_dir, PathBuf::from("plots"));
        assert_eq!(config.cluster.host_template, "fdr{}.ethz.ch");
        assert_eq!(config.cluster.ssh_options.last().unwrap(), "-t");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
cluster:
  user: alice
  host_template: "node{}.example.org"
  default_node: 3
results_dir: /data/results
"#;
        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.cluster.user, "alice");
        assert_eq!(config.cluster.host_template, "node{}.example.org");
        assert_eq!(config.cluster.default_node, Some(3));
        assert_eq!(
            config.cluster.remote_path,
            ClusterConfig::default().remote_path
        );
        assert_eq!(config.plots_dir, PathBuf::from("plots"));
        assert_eq!(
            config.results_root(Path::new("/home/alice/dd")),
            PathBuf::from("/data/results")
        );
        assert_eq!(
            config.plots_root(Path::new("/home/alice/dd")),
            PathBuf::from("/home/alice/dd/plots")
        );
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(Config::from_yaml("cluster: [1, 2").is_err());
    }

    #[test]
    fn test_load_from_path() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("ddbench.yaml");
        fs::write(&path, "cluster:\n  remote_path: /srv/dd\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.cluster.remote_path, "/srv/dd");
    }
}
