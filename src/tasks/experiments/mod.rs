use crate::tasks::{
    naming::{ParamValue, ParameterMap},
    remote::Invocation,
    sweep::Sweep,
};
use anyhow::Result;
use clap::Subcommand;
use log::error;
use std::fmt;

pub mod arrange;
pub mod driver;
pub mod graphs;
pub mod tpchlike;

/// Environment knob controlling how eagerly the engine merges its traces.
pub const DIFFERENTIAL_EFFORT: (&str, &str) = ("DIFFERENTIAL_EFFORT", "4");

/// Supported experiment sweeps.
#[derive(Clone, Debug, Subcommand)]
pub enum Experiment {
    /// Arrangement micro-benchmark across worker counts
    Arrange,
    /// Interactive graph queries, closed-loop variant
    GraphsInteractiveAlt,
    /// Interactive graph queries with shared arrangements under increasing
    /// load
    GraphsInteractiveNeu,
    /// Interactive graph queries, one query type at a time
    GraphsInteractiveNeuZwei,
    /// TPC-H-like queries mixing arranged and unarranged inputs
    TpchlikeMixing {
        /// Prefix of the TPC-H-like input files on the remote machine
        #[arg(long)]
        prefix: String,
    },
}

impl Experiment {
    pub const ARRANGE_NAME: &'static str = "arrange";
    pub const GRAPHS_INTERACTIVE_ALT_NAME: &'static str = "graphs-interactive-alt";
    pub const GRAPHS_INTERACTIVE_NEU_NAME: &'static str = "graphs-interactive-neu";
    pub const GRAPHS_INTERACTIVE_NEU_ZWEI_NAME: &'static str = "graphs-interactive-neu-zwei";
    pub const TPCHLIKE_MIXING_NAME: &'static str = "i-tpchlike-mixing-jemalloc";

    pub fn name(&self) -> &'static str {
        match self {
            Experiment::Arrange => Self::ARRANGE_NAME,
            Experiment::GraphsInteractiveAlt => Self::GRAPHS_INTERACTIVE_ALT_NAME,
            Experiment::GraphsInteractiveNeu => Self::GRAPHS_INTERACTIVE_NEU_NAME,
            Experiment::GraphsInteractiveNeuZwei => Self::GRAPHS_INTERACTIVE_NEU_ZWEI_NAME,
            Experiment::TpchlikeMixing { .. } => Self::TPCHLIKE_MIXING_NAME,
        }
    }

    pub fn plan(&self) -> ExperimentPlan {
        match self {
            Experiment::Arrange => arrange::plan(),
            Experiment::GraphsInteractiveAlt => graphs::alt_plan(),
            Experiment::GraphsInteractiveNeu => graphs::neu_plan(),
            Experiment::GraphsInteractiveNeuZwei => graphs::neu_zwei_plan(),
            Experiment::TpchlikeMixing { prefix } => tpchlike::mixing_plan(prefix),
        }
    }
}

impl fmt::Display for Experiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One positional argument of an engine binary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgSpec {
    Literal(String),
    /// Value of a sweep parameter
    Param(String),
    /// Worker count of the current run
    Workers,
}

impl ArgSpec {
    pub fn params(keys: &[&str]) -> Vec<ArgSpec> {
        keys.iter().map(|k| ArgSpec::Param(k.to_string())).collect()
    }
}

/// Everything needed to run the sweep of one experiment.
#[derive(Clone, Debug)]
pub struct ExperimentPlan {
    pub name: String,
    /// Remote command run once before the sweep
    pub build: Option<String>,
    /// Worker counts, outermost loop of the sweep
    pub workers: Vec<usize>,
    /// Number of cooperating processes per run
    pub processes: usize,
    pub sweep: Sweep,
    pub env: Vec<(String, String)>,
    pub binary: String,
    pub hostfile: Option<String>,
    pub args: Vec<ArgSpec>,
}

impl ExperimentPlan {
    pub fn new(name: &str, binary: &str) -> Self {
        ExperimentPlan {
            name: name.to_string(),
            build: None,
            workers: vec![1],
            processes: 1,
            sweep: Sweep::new(),
            env: Vec::new(),
            binary: binary.to_string(),
            hostfile: None,
            args: Vec::new(),
        }
    }

    /// Number of runs in the whole sweep.
    pub fn num_runs(&self) -> usize {
        self.workers.len() * self.sweep.len()
    }

    pub fn positional_args(&self, w: usize, params: &ParameterMap) -> Result<Vec<String>> {
        self.args
            .iter()
            .map(|arg| match arg {
                ArgSpec::Literal(value) => Ok(value.clone()),
                ArgSpec::Workers => Ok(w.to_string()),
                ArgSpec::Param(key) => {
                    params.get(key).map(ParamValue::to_string).ok_or_else(|| {
                        let reason = format!(
                            "argument refers to a parameter not in the sweep \
                             (experiment={}, key={key})",
                            self.name
                        );
                        error!("{reason}");
                        anyhow::anyhow!(reason)
                    })
                }
            })
            .collect()
    }

    /// One invocation per partition index of a run.
    pub fn invocations(&self, w: usize, params: &ParameterMap) -> Result<Vec<Invocation>> {
        let args = self.positional_args(w, params)?;

        Ok((0..self.processes)
            .map(|p| Invocation {
                env: self.env.clone(),
                binary: self.binary.clone(),
                args: args.clone(),
                hostfile: self.hostfile.clone(),
                n: self.processes,
                p,
                w,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::sweep::Axis;

    #[test]
    fn test_positional_args() {
        let mut plan = ExperimentPlan::new("test", "./bin");
        plan.args = vec![
            ArgSpec::Literal("pre".to_string()),
            ArgSpec::Param("rate".to_string()),
            ArgSpec::Workers,
        ];
        let params = ParameterMap::new().with("rate", 10u64);

        assert_eq!(plan.positional_args(4, &params).unwrap(), vec!["pre", "10", "4"]);
    }

    #[test]
    fn test_positional_args_unknown_key() {
        let mut plan = ExperimentPlan::new("test", "./bin");
        plan.args = ArgSpec::params(&["missing"]);

        assert!(plan.positional_args(1, &ParameterMap::new()).is_err());
    }

    #[test]
    fn test_one_invocation_per_process() {
        let mut plan = ExperimentPlan::new("test", "./bin");
        plan.processes = 3;
        plan.sweep = Sweep::new().axis(Axis::fixed("rate", 1u64));

        let invocations = plan.invocations(2, &ParameterMap::new()).unwrap();
        let partitions: Vec<usize> = invocations.iter().map(|i| i.p).collect();

        assert_eq!(partitions, vec![0, 1, 2]);
        assert!(invocations.iter().all(|i| i.n == 3 && i.w == 2));
    }

    #[test]
    fn test_experiment_names() {
        assert_eq!(Experiment::Arrange.to_string(), "arrange");
        assert_eq!(
            Experiment::TpchlikeMixing {
                prefix: "/data".to_string()
            }
            .name(),
            "i-tpchlike-mixing-jemalloc"
        );
    }

    #[test]
    fn test_plan_names_match_experiments() {
        let experiments = [
            Experiment::Arrange,
            Experiment::GraphsInteractiveAlt,
            Experiment::GraphsInteractiveNeu,
            Experiment::GraphsInteractiveNeuZwei,
            Experiment::TpchlikeMixing {
                prefix: "/data".to_string(),
            },
        ];

        for experiment in &experiments {
            let plan = experiment.plan();
            assert_eq!(plan.name, experiment.name());
            assert!(plan.num_runs() > 0);
            // Every point of the sweep must produce its arguments
            for w in &plan.workers {
                for point in plan.sweep.points() {
                    assert!(plan.invocations(*w, &point).is_ok());
                }
            }
        }
    }
}
