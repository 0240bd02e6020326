// Common test doubles for mysqltest integration tests
pub use mysqltest::clock::test_support::FakeClock;
use mysqltest::docker::ContainerRuntime;
use mysqltest::probe::{Endpoint, Probe, ProbeOutcome};
use mysqltest::{MysqlTestError, Result};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory stand-in for the docker CLI.
///
/// Tracks which containers exist so tests can check cleanup, and records
/// every invocation in order.
#[derive(Clone)]
#[allow(dead_code)]
pub struct ScriptedRuntime {
    pub container_id: String,
    pub network_mode: String,
    pub internal_ip: String,
    pub host_port: String,
    pub fail_run: bool,
    pub fail_inspect: bool,
    pub fail_kill: bool,
    pub calls: Arc<Mutex<Vec<Vec<String>>>>,
    pub containers: Arc<Mutex<HashSet<String>>>,
}

impl Default for ScriptedRuntime {
    fn default() -> Self {
        Self {
            container_id: "abc123".to_string(),
            network_mode: "ci_default".to_string(),
            internal_ip: "172.18.0.5".to_string(),
            host_port: "49153".to_string(),
            fail_run: false,
            fail_inspect: false,
            fail_kill: false,
            calls: Arc::new(Mutex::new(Vec::new())),
            containers: Arc::new(Mutex::new(HashSet::new())),
        }
    }
}

#[allow(dead_code)]
impl ScriptedRuntime {
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Sub-command names in invocation order ("run", "inspect", ...)
    pub fn subcommands(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c[0].clone()).collect()
    }

    /// Equivalent of `docker ps -a` for one id
    pub fn exists(&self, id: &str) -> bool {
        self.containers.lock().unwrap().contains(id)
    }

    fn record(&self, args: &[String]) {
        self.calls.lock().unwrap().push(args.to_vec());
    }
}

impl ContainerRuntime for ScriptedRuntime {
    fn run(&self, args: &[String]) -> Result<String> {
        self.record(args);

        match args[0].as_str() {
            "run" if self.fail_run => Err(MysqlTestError::Launch(
                "Unable to find image 'mysql:nope' locally".to_string(),
            )),
            "run" => {
                self.containers
                    .lock()
                    .unwrap()
                    .insert(self.container_id.clone());
                Ok(self.container_id.clone())
            }
            "inspect" if self.fail_inspect => Err(MysqlTestError::Launch(
                "Error: No such object".to_string(),
            )),
            "inspect" if args[1].contains("NetworkMode") => Ok(self.network_mode.clone()),
            "inspect" if args[1].contains("IPAddress") => Ok(self.internal_ip.clone()),
            "inspect" if args[1].contains("HostPort") => Ok(self.host_port.clone()),
            other => Err(MysqlTestError::Launch(format!(
                "unexpected sub-command {}",
                other
            ))),
        }
    }

    fn status(&self, args: &[String]) -> Result<()> {
        self.record(args);
        let id = args.last().cloned().unwrap_or_default();

        match args[0].as_str() {
            "kill" if self.fail_kill => Err(MysqlTestError::Launch(format!(
                "Container {} is not running",
                id
            ))),
            "kill" => Ok(()),
            "rm" => {
                if self.containers.lock().unwrap().remove(&id) {
                    Ok(())
                } else {
                    Err(MysqlTestError::Launch(format!("No such container: {}", id)))
                }
            }
            other => Err(MysqlTestError::Launch(format!(
                "unexpected sub-command {}",
                other
            ))),
        }
    }
}

/// What a scripted probe answers on one attempt
#[derive(Clone)]
#[allow(dead_code)]
pub enum Step {
    Ready,
    NotReady,
    OpenFails,
}

/// Probe that replays a script, repeating `NotReady` once it runs out.
///
/// Each attempt records the endpoint and the fake time it ran at.
pub struct ScriptedProbe {
    steps: Mutex<VecDeque<Step>>,
    clock: FakeClock,
    attempts: Mutex<Vec<(Endpoint, Duration)>>,
}

#[allow(dead_code)]
impl ScriptedProbe {
    pub fn new(clock: &FakeClock, steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            clock: clock.clone(),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn never_ready(clock: &FakeClock) -> Self {
        Self::new(clock, Vec::new())
    }

    pub fn attempts(&self) -> Vec<(Endpoint, Duration)> {
        self.attempts.lock().unwrap().clone()
    }
}

impl Probe for ScriptedProbe {
    fn probe(&self, endpoint: &Endpoint) -> Result<ProbeOutcome> {
        self.attempts
            .lock()
            .unwrap()
            .push((endpoint.clone(), self.clock.elapsed()));

        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::NotReady);
        match step {
            Step::Ready => Ok(ProbeOutcome::Ready),
            Step::NotReady => Ok(ProbeOutcome::NotReady("connection refused".to_string())),
            Step::OpenFails => Err(MysqlTestError::ProbeOpen("invalid DSN".to_string())),
        }
    }
}
