use crate::tasks::{
    experiments::{ArgSpec, Experiment, ExperimentPlan},
    sweep::{Axis, Sweep},
};

pub const WORKERS: [usize; 6] = [31, 16, 8, 4, 2, 1];
pub const NODES: u64 = 10_000_000;
pub const EDGES: u64 = 32_000_000;
const BASE_RATE: u64 = 2500;

pub fn plan() -> ExperimentPlan {
    let mut plan = ExperimentPlan::new(Experiment::ARRANGE_NAME, "./target/release/arrange");

    plan.workers = WORKERS.to_vec();
    plan.sweep = Sweep::new()
        .axis(Axis::fixed("nodes", NODES))
        .axis(Axis::fixed("edges", EDGES))
        .axis(Axis::new("rate", [2, 4, 8].map(|x: u64| BASE_RATE * x)))
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

    plan
}
