//! The agent driver: registration, polling and reporting.
//!
//! Runs on a current-thread tokio runtime next to the host. The coordinator
//! is shared with the host (which delivers pauses to it) through an
//! `Rc<RefCell<_>>`; the driver never holds the borrow across an `.await`.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::config::AgentConfig;
use crate::coordinator::BreakpointSetCoordinator;
use crate::error::{AgentError, ControlPlaneError};
use crate::files::{FileIndex, FileIndexProvider};
use crate::protocol::{Breakpoint, Debuggee, ListBreakpointsResponse, RegisterResponse};

const AGENT_VERSION: &str = concat!("tether-agent/", env!("CARGO_PKG_VERSION"));

/// The remote service that owns the desired breakpoint set.
#[async_trait(?Send)]
pub trait ControlPlane {
    async fn register(&self, debuggee: &Debuggee) -> Result<RegisterResponse, ControlPlaneError>;

    /// Long-poll for the desired breakpoints.
    async fn list_breakpoints(
        &self,
        debuggee_id: &str,
        wait_token: Option<&str>,
    ) -> Result<ListBreakpointsResponse, ControlPlaneError>;

    async fn update_breakpoint(
        &self,
        debuggee_id: &str,
        breakpoint: &Breakpoint,
    ) -> Result<(), ControlPlaneError>;
}

/// Next registration retry delay: `(d + 1) * 2` seconds, capped at `max`.
#[must_use]
pub fn next_registration_delay(current: Duration, max: Duration) -> Duration {
    Duration::from_secs((current.as_secs() + 1) * 2).min(max)
}

/// Scan the configured work directory for script files.
pub fn scan_work_dir(
    config: &AgentConfig,
    provider: &dyn FileIndexProvider,
) -> Result<FileIndex, AgentError> {
    let root = config
        .work_dir
        .as_deref()
        .filter(|dir| dir.is_dir())
        .ok_or(AgentError::NoWorkingDirectory)?;
    let extensions: Vec<String> = config
        .javascript_file_extensions
        .iter()
        .map(ToString::to_string)
        .collect();
    Ok(provider.scan(root, &extensions)?)
}

/// Describe this process to the control plane.
#[must_use]
pub fn describe_debuggee(config: &AgentConfig, files: &FileIndex) -> Debuggee {
    let service = &config.service;
    let mut labels = std::collections::BTreeMap::new();
    if let Some(name) = &service.service {
        labels.insert("module".to_string(), name.to_string());
    }
    if let Some(version) = &service.version {
        labels.insert("version".to_string(), version.to_string());
    }
    let description = service.description.as_ref().map(ToString::to_string).or_else(|| {
        let name = service.service.as_deref().unwrap_or("default");
        Some(match &service.version {
            Some(version) => format!("{name}-{version}"),
            None => name.to_string(),
        })
    });
    let mut uniquifier = files.aggregate_hash();
    if let Some(app_path) = config.app_path_relative_to_repository.as_deref() {
        uniquifier.push_str(&app_path.to_string_lossy());
    }
    Debuggee {
        id: None,
        project: service.project_id.clone(),
        uniquifier: Some(uniquifier),
        description,
        agent_version: Some(AGENT_VERSION.to_string()),
        labels,
        is_disabled: false,
    }
}

#[derive(Debug, Default)]
struct Signal {
    stopped: Cell<bool>,
    notify: Notify,
}

/// Stops or wakes a running [`Agent`] from elsewhere on the same thread.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    signal: Rc<Signal>,
}

impl AgentHandle {
    pub fn stop(&self) {
        self.signal.stopped.set(true);
        self.signal.notify.notify_one();
    }

    /// Report completed breakpoints now instead of at the next poll.
    pub fn wake(&self) {
        self.signal.notify.notify_one();
    }
}

pub struct Agent<C> {
    control_plane: C,
    coordinator: Rc<RefCell<BreakpointSetCoordinator>>,
    config: AgentConfig,
    debuggee: Debuggee,
    signal: Rc<Signal>,
}

enum Fetch {
    Reregister,
    Stopped,
}

impl<C: ControlPlane> Agent<C> {
    #[must_use]
    pub fn new(control_plane: C, coordinator: BreakpointSetCoordinator, debuggee: Debuggee) -> Self {
        let config = coordinator.engine().config().clone();
        Self {
            control_plane,
            coordinator: Rc::new(RefCell::new(coordinator)),
            config,
            debuggee,
            signal: Rc::default(),
        }
    }

    /// The coordinator, for delivering pauses.
    #[must_use]
    pub fn coordinator(&self) -> Rc<RefCell<BreakpointSetCoordinator>> {
        Rc::clone(&self.coordinator)
    }

    #[must_use]
    pub fn handle(&self) -> AgentHandle {
        AgentHandle {
            signal: Rc::clone(&self.signal),
        }
    }

    pub fn stop(&self) {
        self.handle().stop();
    }

    #[must_use]
    pub fn control_plane(&self) -> &C {
        &self.control_plane
    }

    /// Drive the agent until stopped or a fatal condition is hit. The engine
    /// is shut down before returning either way.
    pub async fn run(&mut self) -> Result<(), AgentError> {
        let result = self.run_loop().await;
        self.coordinator.borrow_mut().shutdown();
        match &result {
            Ok(()) => info!("agent stopped"),
            Err(err) => warn!(%err, "agent stopped"),
        }
        result
    }

    async fn run_loop(&mut self) -> Result<(), AgentError> {
        let mut registration_delay = Duration::ZERO;
        loop {
            let Some(debuggee_id) = self.register(&mut registration_delay).await? else {
                return Ok(());
            };
            match self.fetch_loop(&debuggee_id).await {
                Fetch::Stopped => return Ok(()),
                Fetch::Reregister => {}
            }
        }
    }

    /// Register until it succeeds. `None` when stopped first.
    async fn register(&mut self, delay: &mut Duration) -> Result<Option<String>, AgentError> {
        loop {
            if self.signal.stopped.get() {
                return Ok(None);
            }
            let signal = Rc::clone(&self.signal);
            let Some(result) = interruptible(&signal, self.control_plane.register(&self.debuggee)).await
            else {
                return Ok(None);
            };
            let failure = match result {
                Ok(response) if response.debuggee.is_disabled => {
                    return Err(AgentError::DisabledByServer);
                }
                Ok(RegisterResponse {
                    debuggee: Debuggee { id: Some(id), .. },
                }) => {
                    info!(debuggee = %id, "registered debuggee");
                    *delay = Duration::ZERO;
                    return Ok(Some(id.to_string()));
                }
                Ok(_) => "response carried no debuggee id".to_string(),
                Err(err) => err.to_string(),
            };
            *delay = next_registration_delay(*delay, self.config.internal.max_registration_retry_delay);
            warn!(error = %failure, retry_in = ?*delay, "registration failed");
            if !self.idle(None, *delay).await {
                return Ok(None);
            }
        }
    }

    async fn fetch_loop(&mut self, debuggee_id: &str) -> Fetch {
        let mut wait_token: Option<String> = None;
        loop {
            if self.signal.stopped.get() {
                return Fetch::Stopped;
            }
            let signal = Rc::clone(&self.signal);
            let request = self
                .control_plane
                .list_breakpoints(debuggee_id, wait_token.as_deref());
            let Some(result) = interruptible(&signal, request).await else {
                return Fetch::Stopped;
            };
            match result {
                Ok(response) if response.wait_expired => {
                    debug!("breakpoint wait expired; fetching again");
                }
                Ok(response) => {
                    wait_token = response.next_wait_token;
                    debug!(count = response.breakpoints.len(), "fetched breakpoints");
                    self.coordinator
                        .borrow_mut()
                        .reconcile(response.breakpoints);
                    self.report(debuggee_id).await;
                    if !self
                        .idle(Some(debuggee_id), self.config.breakpoint_update_interval)
                        .await
                    {
                        return Fetch::Stopped;
                    }
                }
                Err(ControlPlaneError::NotFound) => {
                    info!(debuggee = debuggee_id, "debuggee unknown to the server; registering again");
                    return Fetch::Reregister;
                }
                Err(err) => {
                    let delay = self.config.internal.register_delay_on_fetcher_error;
                    warn!(%err, retry_in = ?delay, "fetching breakpoints failed");
                    if !self.idle(Some(debuggee_id), delay).await {
                        return Fetch::Stopped;
                    }
                    return Fetch::Reregister;
                }
            }
        }
    }

    /// Send every pending completion. Failed reports are retried later.
    async fn report(&mut self, debuggee_id: &str) {
        let reports = self.coordinator.borrow_mut().take_reports();
        for breakpoint in reports {
            match self
                .control_plane
                .update_breakpoint(debuggee_id, &breakpoint)
                .await
            {
                Ok(()) => debug!(id = %breakpoint.id, "reported breakpoint"),
                Err(err) => {
                    warn!(id = %breakpoint.id, %err, "reporting breakpoint failed");
                    self.coordinator.borrow_mut().requeue(breakpoint);
                }
            }
        }
    }

    /// Wait `duration` while firing engine timers as they come due. Returns
    /// `false` when stopped.
    async fn idle(&mut self, debuggee_id: Option<&str>, duration: Duration) -> bool {
        let until = tokio::time::Instant::now() + duration;
        let signal = Rc::clone(&self.signal);
        loop {
            if signal.stopped.get() {
                return false;
            }
            let next_timer = {
                let coordinator = self.coordinator.borrow();
                let engine = coordinator.engine();
                engine
                    .next_deadline()
                    .map(|deadline| deadline.saturating_sub(engine.now()))
            };
            tokio::select! {
                () = tokio::time::sleep_until(until) => return true,
                () = sleep_for(next_timer) => {
                    self.coordinator.borrow_mut().poll();
                }
                () = signal.notify.notified() => {
                    if signal.stopped.get() {
                        return false;
                    }
                }
            }
            if let Some(id) = debuggee_id {
                self.report(id).await;
            }
        }
    }
}

async fn sleep_for(duration: Option<Duration>) {
    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

/// Await `future` unless the agent is stopped first.
async fn interruptible<T>(signal: &Signal, future: impl Future<Output = T>) -> Option<T> {
    tokio::pin!(future);
    loop {
        tokio::select! {
            value = &mut future => return Some(value),
            () = signal.notify.notified() => {
                if signal.stopped.get() {
                    return None;
                }
            }
        }
    }
}

/// Scan, describe and start: the usual host entry point.
pub fn prepare(
    config: &AgentConfig,
    provider: &dyn FileIndexProvider,
) -> Result<(FileIndex, Debuggee), AgentError> {
    let files = scan_work_dir(config, provider)?;
    let debuggee = describe_debuggee(config, &files);
    info!(
        root = ?config.work_dir,
        files = files.len(),
        "prepared debuggee"
    );
    Ok((files, debuggee))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_delay_backs_off_to_the_cap() {
        let max = Duration::from_secs(40);
        let mut delay = Duration::ZERO;
        let mut seen = Vec::new();
        for _ in 0..6 {
            delay = next_registration_delay(delay, max);
            seen.push(delay.as_secs());
        }
        assert_eq!(seen, [2, 6, 14, 30, 40, 40]);
    }

    #[test]
    fn debuggee_describes_the_service() {
        let mut config = AgentConfig::default();
        config.service.project_id = Some("proj".into());
        config.service.service = Some("api".into());
        config.service.version = Some("v3".into());
        let debuggee = describe_debuggee(&config, &FileIndex::new());
        assert_eq!(debuggee.project.as_deref(), Some("proj"));
        assert_eq!(debuggee.description.as_deref(), Some("api-v3"));
        assert_eq!(debuggee.labels["module"], "api");
        assert!(debuggee.agent_version.unwrap().starts_with("tether-agent/"));
    }

    #[test]
    fn missing_work_dir_is_fatal() {
        let config = AgentConfig::default();
        let err = scan_work_dir(&config, &crate::files::GlobScanner).unwrap_err();
        assert!(matches!(err, AgentError::NoWorkingDirectory));
    }
}
