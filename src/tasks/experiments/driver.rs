use crate::tasks::{
    experiments::ExperimentPlan,
    naming::{self, ParameterMap},
    remote::{Cluster, Invocation},
    run_id::RunId,
    runner::{self, CommandRunner},
};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Sub-directory of an experiment holding the output of processes other
/// than the first one.
pub const PARTITIONS_DIR: &str = "partitions";

/// Everything a sweep needs besides the plan itself.
pub struct RunContext<'a> {
    pub results_root: &'a Path,
    pub run_id: &'a RunId,
    pub cluster: &'a Cluster,
    pub runner: &'a mut dyn CommandRunner,
    pub node: Option<u32>,
    pub show_progress: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    /// Runs whose processes were launched
    pub launched: usize,
    /// Runs skipped because their result file already existed
    pub skipped: usize,
    /// Processes that exited with a non-zero status
    pub failed: usize,
}

fn get_progress_bar(num_runs: u64, plan: &ExperimentPlan, show: bool) -> Result<ProgressBar> {
    if !show {
        return Ok(ProgressBar::hidden());
    }

    let pb = ProgressBar::new(num_runs);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")?
            .progress_chars("#>-"),
    );
    pb.set_message(plan.name.clone());
    Ok(pb)
}

/// Where process `p` of a run writes its stdout. The first process writes
/// the result file itself.
fn partition_output(result_path: &Path, p: usize) -> Result<PathBuf> {
    if p == 0 {
        return Ok(result_path.to_path_buf());
    }

    let (dir, file_name) = match (result_path.parent(), result_path.file_name()) {
        (Some(dir), Some(file_name)) => (dir, file_name.to_string_lossy()),
        _ => {
            error!("partition_output(): bad result path (path={})", result_path.display());
            anyhow::bail!("bad result path (path={})", result_path.display());
        }
    };

    let partitions_dir = dir.join(PARTITIONS_DIR);
    fs::create_dir_all(&partitions_dir)?;
    Ok(partitions_dir.join(format!("{file_name}_p={p}")))
}

fn run_point(
    plan: &ExperimentPlan,
    ctx: &mut RunContext,
    w: usize,
    point: &ParameterMap,
    summary: &mut SweepSummary,
) -> Result<()> {
    let result_path = naming::result_path(
        ctx.results_root,
        ctx.run_id,
        &plan.name,
        plan.processes,
        w,
        point,
    )?;
    info!("RUNNING {}", result_path.display());

    // A present result file, even a truncated one, counts as done
    if result_path.exists() {
        info!("skipping {}", result_path.display());
        summary.skipped += 1;
        return Ok(());
    }

    let invocations = plan.invocations(w, point)?;
    let commands: Vec<String> = invocations.iter().map(Invocation::to_command).collect();
    info!("commands: {commands:?}");

    let mut handles = Vec::with_capacity(invocations.len());
    for (invocation, cmd) in invocations.iter().zip(&commands) {
        let output = partition_output(&result_path, invocation.p)?;
        handles.push(ctx.cluster.launch(ctx.runner, cmd, &output, ctx.node)?);
    }

    let statuses = runner::wait_all(ctx.runner, handles)?;
    summary.launched += 1;
    summary.failed += statuses.iter().filter(|s| !s.is_success()).count();

    Ok(())
}

/// Run the full sweep of `plan`: the optional remote build, then every
/// (worker count, parameter point) pair in order, one run at a time.
pub fn run_plan(plan: &ExperimentPlan, ctx: &mut RunContext) -> Result<SweepSummary> {
    info!("### {} ###", plan.name);
    info!(
        "{}",
        naming::experiment_dir(ctx.results_root, ctx.run_id, &plan.name).display()
    );

    if let Some(build) = &plan.build {
        ctx.cluster.run(ctx.runner, build, ctx.node)?;
    }

    let mut summary = SweepSummary::default();
    let points = plan.sweep.points();
    let pb = get_progress_bar(plan.num_runs() as u64, plan, ctx.show_progress)?;

    for w in &plan.workers {
        for point in &points {
            run_point(plan, ctx, *w, point, &mut summary)?;
            pb.inc(1);
        }
    }
    pb.finish();

    info!(
        "finished {} (launched={}, skipped={}, failed={})",
        plan.name, summary.launched, summary.skipped, summary.failed
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_output() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = temp_dir.path().join("arrange_n=2_w=1");

        assert_eq!(partition_output(&result, 0).unwrap(), result);
        assert_eq!(
            partition_output(&result, 1).unwrap(),
            temp_dir
                .path()
                .join(PARTITIONS_DIR)
                .join("arrange_n=2_w=1_p=1")
        );
        assert!(temp_dir.path().join(PARTITIONS_DIR).is_dir());
    }
}
