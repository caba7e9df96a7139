use anyhow::Result;
use log::{error, info, warn};
use std::{
    fmt,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    process::Command,
};

/// Paths whose local modifications mark a run as dirty.
const WATCHED_PATHS: [&str; 6] = [
    "src/",
    "Cargo.toml",
    "experiments/src/",
    "experiments/Cargo.toml",
    "tpchlike/src",
    "tpchlike/Cargo.toml",
];

const COMMIT_PREFIX_LEN: usize = 10;

/// Identifier rooting every result and plot path written by one process.
/// It is computed once at start-up and then passed around by reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        RunId(id.into())
    }

    /// Build the identifier from a commit hash and the working tree state.
    pub fn from_commit(commit: &str, clean: bool) -> Self {
        let short: String = commit.trim().chars().take(COMMIT_PREFIX_LEN).collect();
        if clean {
            RunId(short)
        } else {
            RunId(format!("dirty-{short}"))
        }
    }

    /// Derive the identifier from the git repository containing the current
    /// directory. If the tree is dirty and `allow_dirty` is not set, the user
    /// is asked for confirmation on stdin.
    pub fn from_git(allow_dirty: bool) -> Result<Self> {
        let top_level = Self::git_top_level()?;
        let clean = Self::is_worktree_clean(&top_level)?;

        if !clean && !allow_dirty && !Self::confirm_dirty()? {
            error!("from_git(): refusing to run with a dirty working tree");
            anyhow::bail!("working tree is dirty (path={})", top_level.display());
        }

        let commit = Self::git_output(&top_level, &["rev-parse", "HEAD"])?;
        let run_id = Self::from_commit(&commit, clean);
        info!("commit: {run_id}");

        Ok(run_id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn git_output(cwd: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|e| {
                let reason = format!("error running git (args={args:?}, error={e:?})");
                error!("{reason}");
                anyhow::anyhow!(reason)
            })?;

        if !output.status.success() {
            let reason = format!(
                "git command failed (args={args:?}, stderr={})",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            error!("{reason}");
            anyhow::bail!(reason);
        }

        Ok(String::from_utf8(output.stdout)?.trim().to_string())
    }

    fn git_top_level() -> Result<PathBuf> {
        let cwd = std::env::current_dir()?;
        Ok(PathBuf::from(Self::git_output(
            &cwd,
            &["rev-parse", "--show-toplevel"],
        )?))
    }

    fn is_worktree_clean(top_level: &Path) -> Result<bool> {
        let mut args = vec!["diff-index", "--quiet", "HEAD", "--"];
        args.extend(WATCHED_PATHS);

        let status = Command::new("git")
            .args(&args)
            .current_dir(top_level)
            .status()?;

        Ok(status.success())
    }

    fn confirm_dirty() -> Result<bool> {
        warn!("work directory dirty");
        print!("Work directory dirty. Continue? (y/N) ");
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;

        Ok(answer.trim().eq_ignore_ascii_case("y"))
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_commit_clean() {
        let run_id = RunId::from_commit("e74441d0c062c7ec8d6da9bbf1972bd9397b2670\n", true);
        assert_eq!(run_id.as_str(), "e74441d0c0");
    }

    #[test]
    fn test_from_commit_dirty() {
        let run_id = RunId::from_commit("e74441d0c062c7ec8d6da9bbf1972bd9397b2670", false);
        assert_eq!(run_id.to_string(), "dirty-e74441d0c0");
    }

    #[test]
    fn test_explicit_run_id() {
        let run_id = RunId::new("dirty-e74441d0c062c7ec8d6da9bbf1972bd9397b2670");
        assert_eq!(
            run_id.as_str(),
            "dirty-e74441d0c062c7ec8d6da9bbf1972bd9397b2670"
        );
    }
}
