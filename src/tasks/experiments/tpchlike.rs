use crate::tasks::{
    experiments::{ArgSpec, Experiment, ExperimentPlan},
    sweep::{Axis, Sweep},
};

const WORKERS: usize = 32;
const LOGICAL_BATCH: u64 = 1;
const PHYSICAL_BATCH: u64 = 10_000;
const CONCURRENT: u64 = 10;
const SEAL_INPUTS: &str = "dontseal";

pub fn mixing_plan(prefix: &str) -> ExperimentPlan {
    let mut plan = ExperimentPlan::new(
        Experiment::TPCHLIKE_MIXING_NAME,
        "../tpchlike/target/release/sosp",
    );

    plan.build = Some(
        "cd ../tpchlike; . ~/eth_proxy.sh; cargo build --release --bin sosp --features jemalloc"
            .to_string(),
    );
    plan.workers = vec![WORKERS];
    plan.hostfile = Some("hostfile.txt".to_string());
    plan.sweep = Sweep::new()
        .axis(Axis::fixed("logicalbatch", LOGICAL_BATCH))
        .axis(Axis::fixed("physicalbatch", PHYSICAL_BATCH))
        .axis(Axis::fixed("concurrent", CONCURRENT))
        .axis(Axis::new("arrange", ["false", "true"]))
        .axis(Axis::fixed("sealinputs", SEAL_INPUTS));

    plan.args = vec![ArgSpec::Literal(prefix.to_string())];
    plan.args.extend(ArgSpec::params(&[
        "logicalbatch",
        "physicalbatch",
        "concurrent",
        "arrange",
    ]));
    plan.args.push(ArgSpec::Workers);
    plan.args.push(ArgSpec::Param("sealinputs".to_string()));

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::naming::encode_name;

    #[test]
    fn test_mixing_command() {
        let plan = mixing_plan("/mnt/tpch/sf10");
        let points = plan.sweep.points();
        assert_eq!(points.len(), 2);

        let invocations = plan.invocations(WORKERS, &points[1]).unwrap();
        assert_eq!(
            invocations[0].to_command(),
            "../tpchlike/target/release/sosp /mnt/tpch/sf10 1 10000 10 true 32 dontseal \
             -h hostfile.txt -n 1 -p 0 -w 32"
        );
        assert_eq!(
            encode_name(&plan.name, plan.processes, WORKERS, &points[0]).unwrap(),
            "i-tpchlike-mixing-jemalloc_n=1_w=32_logicalbatch=1_physicalbatch=10000_\
             concurrent=10_arrange=false_sealinputs=dontseal"
        );
    }
}
