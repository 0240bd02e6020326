// Lifecycle of one disposable mysqld container
// Launch, find its address, poll until it accepts connections, tear down

use crate::clock::{Clock, SystemClock, TickSchedule};
use crate::config::MysqldConfig;
use crate::docker::container::{
    host_port_args, internal_ip_args, kill_args, network_mode_args, remove_args, run_args,
    Networking, LOOPBACK_HOST, MYSQL_PORT,
};
use crate::docker::{ContainerRuntime, DockerCli};
use crate::environment::{Environment, HostEnvironment};
use crate::errors::{MysqlTestError, Result};
use crate::probe::{ClientProbe, Endpoint, Probe, ProbeOutcome};
use std::fmt;
use std::time::Duration;

/// Interval between readiness probes
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Where an instance is in its lifecycle.
///
/// Callers only ever see `Ready` and, after [`Mysqld::stop`], `Stopped`.
/// The other states exist while [`Mysqld::new`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unstarted,
    Launching,
    DiscoveringAddress,
    Polling,
    Ready,
    TimedOut,
    Stopped,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Unstarted => "unstarted",
            State::Launching => "launching",
            State::DiscoveringAddress => "discovering address",
            State::Polling => "polling",
            State::Ready => "ready",
            State::TimedOut => "timed out",
            State::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Outcome of tearing a container down.
///
/// Cleanup is best effort: both steps always run, and nothing here needs to be
/// acted on. Inspect it when a test wants to know why a container lingered.
#[derive(Debug)]
pub struct StopReport {
    pub kill: Result<()>,
    pub remove: Result<()>,
}

impl StopReport {
    /// True when both kill and remove succeeded
    pub fn is_clean(&self) -> bool {
        self.kill.is_ok() && self.remove.is_ok()
    }
}

/// A mysqld running in a container, ready to accept connections.
///
/// The container keeps running until [`Mysqld::stop`] is called; dropping the
/// value does not remove it.
pub struct Mysqld {
    config: MysqldConfig,
    container: String,
    endpoint: Endpoint,
    state: State,
    runtime: Box<dyn ContainerRuntime>,
}

impl fmt::Debug for Mysqld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mysqld")
            .field("config", &self.config)
            .field("container", &self.container)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .finish()
    }
}

impl Mysqld {
    /// Launch a mysqld container and block until it accepts connections.
    ///
    /// `None` uses [`MysqldConfig::default`]. Uses the configured runtime
    /// program, the `/.dockerenv` marker for self-detection and a client
    /// login with [`Mysqld::url`] as the readiness check.
    pub fn new(config: Option<MysqldConfig>) -> Result<Self> {
        let config = config.unwrap_or_default();
        let runtime = DockerCli::new(config.runtime.clone());

        Self::with_parts(
            config,
            runtime,
            &HostEnvironment::default(),
            &ClientProbe::default(),
            &SystemClock,
        )
    }

    /// Same as [`Mysqld::new`] with every collaborator supplied by the caller.
    ///
    /// The config is validated before anything is launched.
    pub fn with_parts<R>(
        config: MysqldConfig,
        runtime: R,
        environment: &dyn Environment,
        probe: &dyn Probe,
        clock: &dyn Clock,
    ) -> Result<Self>
    where
        R: ContainerRuntime + 'static,
    {
        config.validate()?;

        let mut mysqld = Mysqld {
            config,
            container: String::new(),
            endpoint: Endpoint::new("", ""),
            state: State::Unstarted,
            runtime: Box::new(runtime),
        };

        mysqld.start(environment, probe, clock)?;
        Ok(mysqld)
    }

    /// Connection descriptor in `user@tcp(host:port)/db` form
    pub fn dsn(&self) -> String {
        self.endpoint.dsn()
    }

    /// Connection URL for Rust MySQL clients
    pub fn url(&self) -> String {
        self.endpoint.url()
    }

    pub fn host(&self) -> &str {
        &self.endpoint.host
    }

    pub fn port(&self) -> &str {
        &self.endpoint.port
    }

    pub fn container_id(&self) -> &str {
        &self.container
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn config(&self) -> &MysqldConfig {
        &self.config
    }

    /// Kill and remove the container.
    ///
    /// Removal is attempted even when kill fails. Calling this on an instance
    /// that is not ready leaves the runtime alone and reports an invalid state.
    pub fn stop(&mut self) -> StopReport {
        if self.state != State::Ready {
            let invalid = |step: &str| {
                Err(MysqlTestError::InvalidState(format!(
                    "cannot {} container in state '{}'",
                    step, self.state
                )))
            };
            return StopReport {
                kill: invalid("kill"),
                remove: invalid("remove"),
            };
        }

        let report = self.remove_container();
        self.state = State::Stopped;
        tracing::info!("Stopped mysqld container {}", self.container);
        report
    }

    fn start(
        &mut self,
        environment: &dyn Environment,
        probe: &dyn Probe,
        clock: &dyn Clock,
    ) -> Result<()> {
        self.state = State::Launching;
        let networking = self.networking(environment)?;
        let args = run_args(&networking, &self.config.tag);

        let container = self
            .runtime
            .run(&args)
            .map_err(|e| reclassify(e, MysqlTestError::Launch))?;
        if container.is_empty() {
            return Err(MysqlTestError::Launch(
                "runtime returned an empty container id".to_string(),
            ));
        }
        self.container = container;
        tracing::info!(
            "Launched mysqld container {} from {}",
            self.container,
            self.config.tag
        );

        self.state = State::DiscoveringAddress;
        let endpoint = match self.resolve_endpoint(&networking) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.remove_container();
                return Err(e);
            }
        };
        tracing::debug!("mysqld container {} reachable at {}", self.container, endpoint);
        self.endpoint = endpoint;

        self.state = State::Polling;
        match self.wait_until_ready(probe, clock) {
            Ok(true) => {
                self.state = State::Ready;
                Ok(())
            }
            Ok(false) => {
                self.state = State::TimedOut;
                tracing::warn!(
                    "mysqld container {} not ready after {}s, removing it",
                    self.container,
                    self.config.timeout_secs()
                );
                self.remove_container();
                Err(MysqlTestError::Timeout(self.config.timeout_secs()))
            }
            Err(e) => {
                self.remove_container();
                Err(e)
            }
        }
    }

    /// Decide how the new container will be reached
    fn networking(&self, environment: &dyn Environment) -> Result<Networking> {
        if !environment.in_container() {
            return Ok(Networking::Publish);
        }

        let hostname = environment.hostname().ok_or_else(|| {
            MysqlTestError::Inspect("running in a container but HOSTNAME is not set".to_string())
        })?;
        let network = self
            .runtime
            .run(&network_mode_args(&hostname))
            .map_err(|e| reclassify(e, MysqlTestError::Inspect))?;

        tracing::debug!("Joining network '{}' of container {}", network, hostname);
        Ok(Networking::Join(network))
    }

    fn resolve_endpoint(&self, networking: &Networking) -> Result<Endpoint> {
        match networking {
            Networking::Join(_) => {
                let ip = self
                    .runtime
                    .run(&internal_ip_args(&self.container))
                    .map_err(|e| reclassify(e, MysqlTestError::Inspect))?;
                Ok(Endpoint::new(ip, MYSQL_PORT))
            }
            Networking::Publish => {
                let port = self
                    .runtime
                    .run(&host_port_args(&self.container))
                    .map_err(|e| reclassify(e, MysqlTestError::Inspect))?;
                Ok(Endpoint::new(LOOPBACK_HOST, port))
            }
        }
    }

    /// Probe once per tick until the server answers or the timeout elapses.
    ///
    /// Returns `Ok(false)` on timeout.
    fn wait_until_ready(&self, probe: &dyn Probe, clock: &dyn Clock) -> Result<bool> {
        let endpoint = &self.endpoint;
        let schedule = TickSchedule::new(clock.now(), self.config.timeout, POLL_INTERVAL)
            .ok_or_else(|| {
                MysqlTestError::Config(format!(
                    "timeout of {}s is out of range",
                    self.config.timeout_secs()
                ))
            })?;

        loop {
            let now = clock.now();
            let wake = schedule.next_wake(now);
            if wake > now {
                clock.sleep(wake - now);
            }

            if schedule.expired(clock.now()) {
                return Ok(false);
            }

            match probe.probe(endpoint)? {
                ProbeOutcome::Ready => {
                    tracing::info!(
                        "mysqld at {} ready after {:?}",
                        endpoint,
                        schedule.elapsed(clock.now())
                    );
                    return Ok(true);
                }
                ProbeOutcome::NotReady(reason) => {
                    tracing::debug!("mysqld at {} not ready yet: {}", endpoint, reason);
                }
            }
        }
    }

    /// Kill then remove the container, attempting both regardless of failures
    fn remove_container(&self) -> StopReport {
        let kill = self.runtime.status(&kill_args(&self.container));
        if let Err(e) = &kill {
            tracing::debug!("kill {} failed: {}", self.container, e);
        }

        let remove = self.runtime.status(&remove_args(&self.container));
        if let Err(e) = &remove {
            tracing::debug!("rm {} failed: {}", self.container, e);
        }

        StopReport { kill, remove }
    }
}

/// Move a runtime failure into the error kind of the step that ran it
fn reclassify(err: MysqlTestError, into: fn(String) -> MysqlTestError) -> MysqlTestError {
    match err {
        MysqlTestError::Launch(msg) | MysqlTestError::Inspect(msg) => into(msg),
        MysqlTestError::Io(e) => into(e.to_string()),
        other => other,
    }
}
