use crate::tasks::{
    naming::{self, ParamSet, ParamValue, ParameterMap},
    run_id::RunId,
};
use anyhow::Result;
use log::{debug, error, info, warn};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

/// A result file and the parameters decoded from its name.
#[derive(Clone, Debug)]
pub struct ResultFile {
    pub file_name: String,
    pub path: PathBuf,
    pub params: ParameterMap,
    set: ParamSet,
}

impl ResultFile {
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    pub fn matches(&self, filter: &ParamSet) -> bool {
        naming::matches(&self.set, filter)
    }
}

/// Every result file of one experiment for one run id.
#[derive(Clone, Debug)]
pub struct ResultSet {
    pub experiment: String,
    pub dir: PathBuf,
    files: Vec<ResultFile>,
}

impl ResultSet {
    pub fn load(results_root: &Path, run_id: &RunId, experiment: &str) -> Result<Self> {
        let dir = naming::experiment_dir(results_root, run_id, experiment);
        Self::load_dir(&dir, experiment)
    }

    /// Decode every file in `dir`. Directories are ignored, a file whose
    /// name does not decode is an error.
    pub fn load_dir(dir: &Path, experiment: &str) -> Result<Self> {
        let entries = fs::read_dir(dir).map_err(|e| {
            let reason = format!(
                "error reading from directory (path={}, error={e:?})",
                dir.display()
            );
            error!("{reason}");
            anyhow::anyhow!(reason)
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                let reason = format!("error opening directory entry (error={e:?})");
                error!("{reason}");
                anyhow::anyhow!(reason)
            })?;
            if entry.file_type()?.is_dir() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().into_owned();
            let (name, params) = naming::decode_name(&file_name)?;
            if name != experiment {
                debug!("load_dir(): file of another experiment (file_name={file_name})");
            }

            files.push(ResultFile {
                set: params.to_set(),
                file_name,
                path: entry.path(),
                params,
            });
        }

        // Directory listing order is not stable across file systems
        files.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        if files.is_empty() {
            warn!("no result files (path={})", dir.display());
        }

        Ok(ResultSet {
            experiment: experiment.to_string(),
            dir: dir.to_path_buf(),
            files,
        })
    }

    pub fn files(&self) -> &[ResultFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// All values observed for each parameter.
    pub fn domains(&self) -> BTreeMap<String, BTreeSet<ParamValue>> {
        let mut domains = BTreeMap::<String, BTreeSet<ParamValue>>::new();
        for file in &self.files {
            for (key, value) in file.params.iter() {
                domains
                    .entry(key.to_string())
                    .or_default()
                    .insert(value.clone());
            }
        }

        domains
    }

    /// Observed values of `key`, failing when no file carries it.
    pub fn domain(&self, key: &str) -> Result<BTreeSet<ParamValue>> {
        match self.domains().remove(key) {
            Some(values) => Ok(values),
            None => {
                let reason = format!(
                    "parameter not found in results (experiment={}, key={key})",
                    self.experiment
                );
                error!("{reason}");
                anyhow::bail!(reason)
            }
        }
    }

    pub fn select(&self, filter: &ParamSet) -> Vec<&ResultFile> {
        self.files.iter().filter(|f| f.matches(filter)).collect()
    }

    /// Like `select`, ordered by the value of `key`. Files without the key
    /// come first.
    pub fn select_sorted(&self, filter: &ParamSet, key: &str) -> Vec<&ResultFile> {
        let mut selected = self.select(filter);
        selected.sort_by(|a, b| a.get(key).cmp(&b.get(key)));
        selected
    }

    pub fn log_domains(&self) {
        for (key, values) in self.domains() {
            let values: Vec<String> = values.iter().map(ParamValue::to_string).collect();
            info!("{key}: {{{}}}", values.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::naming::param_set;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "").unwrap();
    }

    fn arrange_dir() -> tempfile::TempDir {
        let temp_dir = tempdir().unwrap();
        for w in [1, 2, 4] {
            for comp in ["arrange", "count"] {
                touch(
                    temp_dir.path(),
                    &format!("arrange_n=1_w={w}_rate=10000_work=4_comp={comp}"),
                );
            }
        }
        touch(temp_dir.path(), "arrange_n=1_w=8_rate=20000_work=max_comp=count");
        fs::create_dir(temp_dir.path().join("partitions")).unwrap();
        temp_dir
    }

    #[test]
    fn test_load_and_domains() {
        let temp_dir = arrange_dir();
        let results = ResultSet::load_dir(temp_dir.path(), "arrange").unwrap();

        assert_eq!(results.len(), 7);
        let domains = results.domains();
        assert_eq!(
            domains["w"],
            BTreeSet::from([
                ParamValue::Int(1),
                ParamValue::Int(2),
                ParamValue::Int(4),
                ParamValue::Int(8)
            ])
        );
        assert_eq!(
            domains["work"],
            BTreeSet::from([ParamValue::Int(4), ParamValue::Text("max".to_string())])
        );
        assert!(results.domain("missing").is_err());
    }

    #[test]
    fn test_select_sorted() {
        let temp_dir = arrange_dir();
        let results = ResultSet::load_dir(temp_dir.path(), "arrange").unwrap();

        let filter = param_set([
            ("rate", ParamValue::Int(10000)),
            ("comp", ParamValue::Text("count".to_string())),
        ]);
        let selected: Vec<u64> = results
            .select_sorted(&filter, "w")
            .iter()
            .map(|f| f.get("w").and_then(ParamValue::as_int).unwrap())
            .collect();

        assert_eq!(selected, vec![1, 2, 4]);
        assert_eq!(results.select(&ParamSet::new()).len(), 7);
    }

    #[test]
    fn test_load_via_run_id() {
        let temp_dir = tempdir().unwrap();
        let run_id = RunId::new("dirty-abc");
        let dir = naming::experiment_dir(temp_dir.path(), &run_id, "arrange");
        fs::create_dir_all(&dir).unwrap();
        touch(&dir, "arrange_n=1_w=1");

        let results = ResultSet::load(temp_dir.path(), &run_id, "arrange").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results.files()[0].path, dir.join("arrange_n=1_w=1"));
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = tempdir().unwrap();
        assert!(ResultSet::load(temp_dir.path(), &RunId::new("x"), "arrange").is_err());
    }

    #[test]
    fn test_malformed_file_name() {
        let temp_dir = tempdir().unwrap();
        touch(temp_dir.path(), "arrange_n=1_README");

        assert!(ResultSet::load_dir(temp_dir.path(), "arrange").is_err());
    }
}
