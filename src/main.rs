use clap::{Parser, Subcommand};
use ddbench::{
    config::Config,
    env::Env,
    tasks::{
        experiments::{
            driver::{self, RunContext},
            Experiment,
        },
        plot::{self, ChartFamily, PlotContext, Renderer},
        remote::Cluster,
        results::ResultSet,
        run_id::RunId,
        runner::{CommandRunner, DryRunner, ShellRunner},
    },
};
use env_logger::Builder;
use log::{info, warn};
use std::path::PathBuf;

#[derive(Parser)]
struct Cli {
    /// Configuration file. Defaults to `ddbench.yaml` in the working directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log the commands instead of running them
    #[arg(long, global = true)]
    dry_run: bool,
    // The name of the task to execute
    #[clap(subcommand)]
    task: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the identifier results of this checkout are stored under
    RunId {
        /// Do not ask for confirmation if the work directory is dirty
        #[arg(long)]
        allow_dirty: bool,
    },
    /// Run the sweep of an experiment on the cluster
    Run {
        #[command(subcommand)]
        experiment: Experiment,
        /// Node index substituted into the host template
        #[arg(long, global = true)]
        node: Option<u32>,
        /// Do not ask for confirmation if the work directory is dirty
        #[arg(long, global = true)]
        allow_dirty: bool,
    },
    /// Print the parameter values found in the results of an experiment
    List {
        /// Run id the results were stored under
        #[arg(long)]
        commit: String,
        #[arg(long)]
        experiment: String,
    },
    /// Draw the charts of one family from the results of an experiment
    Plot {
        #[arg(value_enum)]
        chart: ChartFamily,
        /// Run id the results were stored under
        #[arg(long)]
        commit: String,
        #[arg(long)]
        experiment: String,
        #[arg(long, value_enum, default_value_t = Renderer::Gnuplot)]
        renderer: Renderer,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize the logger.
    let env = env_logger::Env::default().filter_or("RUST_LOG", "info");
    let mut builder = Builder::from_env(env);
    builder.init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let proj_root = Env::proj_root()?;

    let mut runner: Box<dyn CommandRunner> = if cli.dry_run {
        Box::new(DryRunner::new())
    } else {
        Box::new(ShellRunner::new())
    };

    match &cli.task {
        Command::RunId { allow_dirty } => {
            println!("{}", RunId::from_git(*allow_dirty)?);
        }
        Command::Run {
            experiment,
            node,
            allow_dirty,
        } => {
            let run_id = RunId::from_git(*allow_dirty)?;
            let results_root = config.results_root(&proj_root);
            let cluster = Cluster::new(&config.cluster);

            let mut ctx = RunContext {
                results_root: &results_root,
                run_id: &run_id,
                cluster: &cluster,
                runner: runner.as_mut(),
                node: node.or(config.cluster.default_node),
                show_progress: !cli.dry_run,
            };
            let summary = driver::run_plan(&experiment.plan(), &mut ctx)?;
            if summary.failed > 0 {
                warn!(
                    "{} process(es) of {experiment} exited with an error",
                    summary.failed
                );
            }
        }
        Command::List { commit, experiment } => {
            let results = ResultSet::load(
                &config.results_root(&proj_root),
                &RunId::new(commit.as_str()),
                experiment,
            )?;
            info!("{} result file(s) in {}", results.len(), results.dir.display());
            results.log_domains();
        }
        Command::Plot {
            chart,
            commit,
            experiment,
            renderer,
        } => {
            let run_id = RunId::new(commit.as_str());
            let results_root = config.results_root(&proj_root);
            let plots_root = config.plots_root(&proj_root);

            let mut ctx = PlotContext {
                results_root: &results_root,
                plots_root: &plots_root,
                run_id: &run_id,
                runner: runner.as_mut(),
                renderer: *renderer,
            };
            plot::plot(*chart, experiment, &mut ctx)?;
        }
    }

    Ok(())
}
