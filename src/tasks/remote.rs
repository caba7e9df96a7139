use crate::{
    config::ClusterConfig,
    tasks::runner::{CommandRunner, RunHandle, RunStatus},
};
use anyhow::Result;
use log::{info, warn};
use std::path::Path;

/// One process of a distributed run of an engine binary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    /// Environment assignments prefixed to the command
    pub env: Vec<(String, String)>,
    pub binary: String,
    /// Positional arguments, before the process flags
    pub args: Vec<String>,
    pub hostfile: Option<String>,
    /// Number of processes
    pub n: usize,
    /// Partition index of this process
    pub p: usize,
    /// Workers per process
    pub w: usize,
}

impl Invocation {
    pub fn to_command(&self) -> String {
        let mut parts: Vec<String> = self.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        parts.push(self.binary.clone());
        parts.extend(self.args.iter().cloned());
        if let Some(hostfile) = &self.hostfile {
            parts.push(format!("-h {hostfile}"));
        }
        parts.push(format!("-n {} -p {} -w {}", self.n, self.p, self.w));

        parts.join(" ")
    }
}

/// The machines experiments are launched on.
#[derive(Clone, Debug)]
pub struct Cluster {
    user: String,
    host_template: String,
    remote_path: String,
    ssh_options: Vec<String>,
}

impl Cluster {
    pub fn new(config: &ClusterConfig) -> Self {
        let mut ssh_options = config.ssh_options.clone();
        if let Some(identity_file) = &config.identity_file {
            ssh_options.push("-i".to_string());
            ssh_options.push(shellexpand::tilde(identity_file).into_owned());
        }

        Cluster {
            user: config.user.clone(),
            host_template: config.host_template.clone(),
            remote_path: config.remote_path.clone(),
            ssh_options,
        }
    }

    /// Host name for a node index. Without a node the placeholder is dropped.
    pub fn host(&self, node: Option<u32>) -> String {
        let node = node.map(|n| n.to_string()).unwrap_or_default();
        self.host_template.replace("{}", &node)
    }

    pub fn ssh_command(&self, cmd: &str, node: Option<u32>, redirect: Option<&Path>) -> String {
        let mut ssh_cmd = String::from("ssh");
        for option in &self.ssh_options {
            ssh_cmd.push(' ');
            ssh_cmd.push_str(option);
        }
        ssh_cmd.push_str(&format!(
            " {}@{} \"cd {}; {}\"",
            self.user,
            self.host(node),
            self.remote_path,
            cmd
        ));

        if let Some(redirect) = redirect {
            let redirect = redirect.to_string_lossy();
            ssh_cmd.push_str(&format!(" > {}", shell_words::quote(&redirect)));
        }

        ssh_cmd
    }

    /// Launch `cmd` remotely in the background, writing its stdout to
    /// `redirect`.
    pub fn launch(
        &self,
        runner: &mut dyn CommandRunner,
        cmd: &str,
        redirect: &Path,
        node: Option<u32>,
    ) -> Result<RunHandle> {
        info!("running on {}: cd {}; {cmd}", self.host(node), self.remote_path);
        runner.submit(&self.ssh_command(cmd, node, Some(redirect)))
    }

    /// Run `cmd` remotely in the foreground, e.g. to build a binary.
    pub fn run(
        &self,
        runner: &mut dyn CommandRunner,
        cmd: &str,
        node: Option<u32>,
    ) -> Result<RunStatus> {
        info!("running on {}: cd {}; {cmd}", self.host(node), self.remote_path);

        let status = runner.run(&self.ssh_command(cmd, node, None))?;
        if !status.is_success() {
            warn!("run(): remote command failed (cmd={cmd}, code={:?})", status.code());
        }

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::runner::DryRunner;

    fn test_cluster() -> Cluster {
        Cluster::new(&ClusterConfig {
            user: "bench".to_string(),
            host_template: "fdr{}.ethz.ch".to_string(),
            remote_path: "/srv/dd/experiments".to_string(),
            ..ClusterConfig::default()
        })
    }

    #[test]
    fn test_invocation_to_command() {
        let invocation = Invocation {
            env: vec![("DIFFERENTIAL_EFFORT".to_string(), "4".to_string())],
            binary: "./target/release/graphs-interactive-neu".to_string(),
            args: vec!["10".to_string(), "shared".to_string()],
            hostfile: None,
            n: 1,
            p: 0,
            w: 32,
        };

        assert_eq!(
            invocation.to_command(),
            "DIFFERENTIAL_EFFORT=4 ./target/release/graphs-interactive-neu \
             10 shared -n 1 -p 0 -w 32"
        );
    }

    #[test]
    fn test_invocation_with_hostfile() {
        let invocation = Invocation {
            env: vec![],
            binary: "../tpchlike/target/release/sosp".to_string(),
            args: vec!["prefix".to_string()],
            hostfile: Some("hostfile.txt".to_string()),
            n: 2,
            p: 1,
            w: 16,
        };

        assert_eq!(
            invocation.to_command(),
            "../tpchlike/target/release/sosp prefix -h hostfile.txt -n 2 -p 1 -w 16"
        );
    }

    #[test]
    fn test_host_template() {
        let cluster = test_cluster();
        assert_eq!(cluster.host(Some(7)), "fdr7.ethz.ch");
        assert_eq!(cluster.host(None), "fdr.ethz.ch");
    }

    #[test]
    fn test_ssh_command() {
        let cluster = test_cluster();
        let cmd = cluster.ssh_command("./bin 1 -n 1 -p 0 -w 1", Some(3), Some(Path::new("out/x")));

        assert_eq!(
            cmd,
            "ssh -o UserKnownHostsFile=/dev/null -o StrictHostKeyChecking=no -t \
             bench@fdr3.ethz.ch \"cd /srv/dd/experiments; ./bin 1 -n 1 -p 0 -w 1\" > out/x"
        );
    }

    #[test]
    fn test_redirect_is_quoted() {
        let cluster = test_cluster();
        let cmd = cluster.ssh_command("./bin", None, Some(Path::new("/tmp/my results/out")));

        assert!(cmd.ends_with(" > '/tmp/my results/out'"));
    }

    #[test]
    fn test_identity_file_is_appended() {
        let cluster = Cluster::new(&ClusterConfig {
            identity_file: Some("/keys/id_rsa".to_string()),
            ..ClusterConfig::default()
        });

        assert!(cluster.ssh_command("true", None, None).starts_with(
            "ssh -o UserKnownHostsFile=/dev/null -o StrictHostKeyChecking=no -t -i /keys/id_rsa "
        ));
    }

    #[test]
    fn test_launch_redirects_output() {
        let cluster = test_cluster();
        let mut runner = DryRunner::new();

        cluster
            .launch(&mut runner, "./bin", Path::new("/tmp/out"), Some(2))
            .unwrap();

        assert_eq!(runner.commands().len(), 1);
        assert!(runner.commands()[0].contains("bench@fdr2.ethz.ch"));
        assert!(runner.commands()[0].ends_with("\"cd /srv/dd/experiments; ./bin\" > /tmp/out"));
    }

    #[test]
    fn test_run_has_no_redirect() {
        let cluster = test_cluster();
        let mut runner = DryRunner::new();

        let status = cluster.run(&mut runner, "cargo build --release", Some(1)).unwrap();

        assert!(status.is_success());
        assert_eq!(
            runner.commands(),
            &["ssh -o UserKnownHostsFile=/dev/null -o StrictHostKeyChecking=no -t \
               bench@fdr1.ethz.ch \"cd /srv/dd/experiments; cargo build --release\""]
        );
    }
}
