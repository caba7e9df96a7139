//! Result file naming.
//!
//! Every run of an experiment writes its stdout to a single file whose name
//! carries the full parameter assignment of the run:
//!
//! ```text
//! results/<run-id>/<experiment>/<experiment>_n=<n>_w=<w>_<k1>=<v1>_..._<kn>=<vn>
//! ```
//!
//! At analysis time the file name is decoded back into its parameters, so
//! that result files can be selected with a filtering set before plotting.

use crate::tasks::run_id::RunId;
use anyhow::Result;
use log::{error, info};
use std::{
    collections::BTreeSet,
    fmt, fs,
    path::{Path, PathBuf},
};

/// Separates `key=value` pairs in a file name.
pub const PAIR_DELIMITER: char = '_';
/// Separates a key from its value.
pub const KV_DELIMITER: char = '=';

/// A scalar parameter value. Whether a value is an integer is decided by
/// its textual form alone: all-decimal strings are integers.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParamValue {
    Int(u64),
    Text(String),
}

impl ParamValue {
    /// Parse a raw value as it appears in a file name. Only non-empty runs of
    /// ASCII digits become `Int`, so `"007"` is `Int(7)` but `"-5"` and
    /// `"0x10"` stay text.
    pub fn parse(raw: &str) -> ParamValue {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(value) = raw.parse::<u64>() {
                return ParamValue::Int(value);
            }
        }

        ParamValue::Text(raw.to_string())
    }

    pub fn as_int(&self) -> Option<u64> {
        match self {
            ParamValue::Int(value) => Some(*value),
            ParamValue::Text(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(value) => write!(f, "{value}"),
            ParamValue::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        ParamValue::Int(value as u64)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

/// Order-insensitive view of a parameter assignment, used for filtering.
pub type ParamSet = BTreeSet<(String, ParamValue)>;

/// Ordered mapping from parameter name to value. Insertion order decides the
/// layout of the encoded file name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParameterMap {
    pairs: Vec<(String, ParamValue)>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a pair. Re-inserting an existing key replaces its value and
    /// keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn to_set(&self) -> ParamSet {
        self.pairs.iter().cloned().collect()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for ParameterMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ParameterMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Build a filtering set from `(key, value)` pairs.
pub fn param_set<K, V, I>(pairs: I) -> ParamSet
where
    K: Into<String>,
    V: Into<ParamValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Raised when a file name does not follow the `name_k=v_k=v` layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameFormatError {
    pub file_name: String,
    pub token: String,
}

impl fmt::Display for NameFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "malformed parameter token (file_name={}, token={})",
            self.file_name, self.token
        )
    }
}

impl std::error::Error for NameFormatError {}

fn check_token(what: &str, token: &str) -> Result<()> {
    if token.contains(PAIR_DELIMITER) || token.contains(KV_DELIMITER) {
        let reason = format!("{what} contains a reserved delimiter ({what}={token})");
        error!("check_token(): {reason}");
        anyhow::bail!(reason);
    }

    Ok(())
}

/// Encode the base file name of a run. Names, keys and values must not
/// contain `_` or `=`; nothing is escaped.
pub fn encode_name(
    experiment_name: &str,
    n: usize,
    w: usize,
    params: &ParameterMap,
) -> Result<String> {
    check_token("experiment", experiment_name)?;

    let mut name = format!("{experiment_name}_n={n}_w={w}");
    for (key, value) in params.iter() {
        let value = value.to_string();
        check_token("key", key)?;
        check_token("value", &value)?;

        name.push(PAIR_DELIMITER);
        name.push_str(key);
        name.push(KV_DELIMITER);
        name.push_str(&value);
    }

    Ok(name)
}

/// Directory holding every result file of an experiment for one run id.
pub fn experiment_dir(results_root: &Path, run_id: &RunId, experiment_name: &str) -> PathBuf {
    results_root.join(run_id.as_str()).join(experiment_name)
}

/// Full path of the result file of a run. Creates the experiment directory
/// if it does not exist yet.
pub fn result_path(
    results_root: &Path,
    run_id: &RunId,
    experiment_name: &str,
    n: usize,
    w: usize,
    params: &ParameterMap,
) -> Result<PathBuf> {
    let file_name = encode_name(experiment_name, n, w, params)?;
    let dir = experiment_dir(results_root, run_id, experiment_name);

    info!("making directory: {}", dir.display());
    fs::create_dir_all(&dir).map_err(|e| {
        let reason = format!(
            "error creating results directory (path={}, error={e:?})",
            dir.display()
        );
        error!("{reason}");
        anyhow::anyhow!(reason)
    })?;

    Ok(dir.join(file_name))
}

/// Decode a base file name into the experiment name and its parameters, in
/// file order. `n` and `w` are decoded like any other parameter.
pub fn decode_name(file_name: &str) -> Result<(String, ParameterMap), NameFormatError> {
    let mut tokens = file_name.split(PAIR_DELIMITER);
    let name = tokens.next().unwrap_or_default().to_string();

    let mut params = ParameterMap::new();
    for token in tokens {
        let mut parts = token.split(KV_DELIMITER);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => {
                params.pairs.push((key.to_string(), ParamValue::parse(value)));
            }
            _ => {
                return Err(NameFormatError {
                    file_name: file_name.to_string(),
                    token: token.to_string(),
                });
            }
        }
    }

    Ok((name, params))
}

/// A file matches a filtering set when its parameters are a superset of it.
pub fn matches(params: &ParamSet, filter: &ParamSet) -> bool {
    filter.is_subset(params)
}

/// Render a filtering set as `k=v` pairs joined with `_`, sorted by key.
pub fn grouping_str(set: &ParamSet) -> String {
    set.iter()
        .map(|(k, v)| format!("{k}{KV_DELIMITER}{v}"))
        .collect::<Vec<String>>()
        .join(&PAIR_DELIMITER.to_string())
}
