//! Interactive graph query experiments. All of them load the same random
//! graph and then drive queries and edge updates at a target rate.

use crate::tasks::{
    experiments::{ArgSpec, Experiment, ExperimentPlan, DIFFERENTIAL_EFFORT},
    sweep::{Axis, Sweep},
};

pub const WORKERS: usize = 32;
pub const NODES: u64 = 10_000_000;
pub const EDGES: u64 = 32_000_000;

fn remote_build(bin: &str) -> String {
    format!(". ~/eth_proxy.sh; cargo build --release --bin {bin}")
}

fn base_plan(name: &str) -> ExperimentPlan {
    let mut plan = ExperimentPlan::new(name, &format!("./target/release/{name}"));
    plan.workers = vec![WORKERS];
    plan.env = vec![(
        DIFFERENTIAL_EFFORT.0.to_string(),
        DIFFERENTIAL_EFFORT.1.to_string(),
    )];
    plan
}

pub fn alt_plan() -> ExperimentPlan {
    let mut plan = base_plan(Experiment::GRAPHS_INTERACTIVE_ALT_NAME);

    plan.sweep = Sweep::new()
        .axis(Axis::fixed("nodes", NODES))
        .axis(Axis::fixed("edges", EDGES))
        .axis(Axis::new("rate", [2u64, 4, 8].map(|x| 2500 * x)))
        .axis(Axis::fixed("goal", 5u64))
        .axis(Axis::new("queries", [0u64, 10, 100, 1000]))
        .axis(Axis::new("shared", ["no", "shared"]))
        .axis(Axis::new("bidijkstra", ["no", "bidijkstra"]));
    plan.args = ArgSpec::params(&[
        "nodes",
        "edges",
        "rate",
        "goal",
        "queries",
        "shared",
        "bidijkstra",
    ]);
    plan.args.push(ArgSpec::Workers);

    plan
}

pub fn neu_plan() -> ExperimentPlan {
    let name = Experiment::GRAPHS_INTERACTIVE_NEU_NAME;
    let mut plan = base_plan(name);

    plan.build = Some(remote_build(name));
    plan.sweep = Sweep::new()
        .axis(Axis::fixed("nodes", NODES))
        .axis(Axis::fixed("edges", EDGES))
        .axis(Axis::new("rate", (10u64..=20).map(|x| x * 20_000)))
        .axis(Axis::fixed("goal", 1800u64))
        .axis(Axis::fixed("queries", 32u64))
        .axis(Axis::new("shared", ["no", "shared"]));
    plan.args = ArgSpec::params(&["nodes", "edges", "rate", "goal", "queries", "shared"]);
    plan.args.push(ArgSpec::Workers);

    plan
}

pub fn neu_zwei_plan() -> ExperimentPlan {
    let name = Experiment::GRAPHS_INTERACTIVE_NEU_ZWEI_NAME;
    let mut plan = base_plan(name);

    let rate = 200_000u64;
    // Long enough to load the whole graph twice over
    let goal = (EDGES / rate) * 2;

    plan.build = Some(remote_build(name));
    plan.sweep = Sweep::new()
        .axis(Axis::fixed("nodes", NODES))
        .axis(Axis::fixed("edges", EDGES))
        .axis(Axis::fixed("rate", rate))
        .axis(Axis::fixed("goal", goal))
        .axis(Axis::new("query", ["1", "2", "3", "4"]));
    plan.args = ArgSpec::params(&["nodes", "edges", "rate", "goal", "query"]);
    plan.args.push(ArgSpec::Workers);

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::naming::ParamValue;

    #[test]
    fn test_alt_command_has_effort_and_workers() {
        let plan = alt_plan();
        let point = &plan.sweep.points()[0];
        let invocations = plan.invocations(WORKERS, point).unwrap();

        assert_eq!(
            invocations[0].to_command(),
            "DIFFERENTIAL_EFFORT=4 ./target/release/graphs-interactive-alt \
             10000000 32000000 5000 5 0 no no 32 -n 1 -p 0 -w 32"
        );
        assert!(plan.build.is_none());
    }

    #[test]
    fn test_neu_rates() {
        let plan = neu_plan();
        let rates: Vec<ParamValue> = plan.sweep.axes()[2].values.clone();

        assert_eq!(rates.len(), 11);
        assert_eq!(rates.first(), Some(&ParamValue::Int(200_000)));
        assert_eq!(rates.last(), Some(&ParamValue::Int(400_000)));
        assert_eq!(plan.num_runs(), 22);
        assert_eq!(
            plan.build.as_deref(),
            Some(". ~/eth_proxy.sh; cargo build --release --bin graphs-interactive-neu")
        );
    }

    #[test]
    fn test_neu_zwei_goal() {
        let plan = neu_zwei_plan();
        let point = &plan.sweep.points()[3];

        assert_eq!(point.get("goal"), Some(&ParamValue::Int(320)));
        assert_eq!(point.get("query"), Some(&ParamValue::Text("4".to_string())));
        assert_eq!(plan.num_runs(), 4);
    }
}
