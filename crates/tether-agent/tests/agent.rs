mod common;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use common::*;
use tether_agent::protocol::{Debuggee, ListBreakpointsResponse, RegisterResponse};
use tether_agent::timers::TokioClock;
use tether_agent::{Agent, AgentError, ControlPlane, ControlPlaneError};
use tokio::time::Instant;

struct FakeControlPlane {
    start: Instant,
    registrations: RefCell<VecDeque<Result<RegisterResponse, ControlPlaneError>>>,
    listings: RefCell<VecDeque<Result<ListBreakpointsResponse, ControlPlaneError>>>,
    registered_at: RefCell<Vec<Duration>>,
    wait_tokens: RefCell<Vec<Option<String>>>,
    updates: RefCell<Vec<Breakpoint>>,
    failing_updates: Cell<u32>,
}

impl FakeControlPlane {
    fn new() -> Self {
        Self {
            start: Instant::now(),
            registrations: RefCell::default(),
            listings: RefCell::default(),
            registered_at: RefCell::default(),
            wait_tokens: RefCell::default(),
            updates: RefCell::default(),
            failing_updates: Cell::new(0),
        }
    }

    fn register_with(self, response: Result<RegisterResponse, ControlPlaneError>) -> Self {
        self.registrations.borrow_mut().push_back(response);
        self
    }

    fn list_with(self, response: Result<ListBreakpointsResponse, ControlPlaneError>) -> Self {
        self.listings.borrow_mut().push_back(response);
        self
    }

    fn registered_secs(&self) -> Vec<u64> {
        self.registered_at
            .borrow()
            .iter()
            .map(Duration::as_secs)
            .collect()
    }
}

fn registered(id: &str) -> RegisterResponse {
    RegisterResponse {
        debuggee: Debuggee {
            id: Some(id.into()),
            ..Debuggee::default()
        },
    }
}

fn listing(breakpoints: Vec<Breakpoint>) -> ListBreakpointsResponse {
    ListBreakpointsResponse {
        breakpoints,
        ..ListBreakpointsResponse::default()
    }
}

fn transport() -> ControlPlaneError {
    ControlPlaneError::Transport("connection reset".into())
}

#[async_trait(?Send)]
impl ControlPlane for FakeControlPlane {
    async fn register(&self, _debuggee: &Debuggee) -> Result<RegisterResponse, ControlPlaneError> {
        self.registered_at.borrow_mut().push(self.start.elapsed());
        let next = self.registrations.borrow_mut().pop_front();
        next.unwrap_or_else(|| Ok(registered("d-1")))
    }

    async fn list_breakpoints(
        &self,
        debuggee_id: &str,
        wait_token: Option<&str>,
    ) -> Result<ListBreakpointsResponse, ControlPlaneError> {
        assert_eq!(debuggee_id, "d-1");
        self.wait_tokens
            .borrow_mut()
            .push(wait_token.map(ToString::to_string));
        let next = self.listings.borrow_mut().pop_front();
        match next {
            Some(response) => response,
            None => std::future::pending().await,
        }
    }

    async fn update_breakpoint(
        &self,
        _debuggee_id: &str,
        breakpoint: &Breakpoint,
    ) -> Result<(), ControlPlaneError> {
        if self.failing_updates.get() > 0 {
            self.failing_updates.set(self.failing_updates.get() - 1);
            return Err(transport());
        }
        self.updates.borrow_mut().push(breakpoint.clone());
        Ok(())
    }
}

fn agent(control_plane: FakeControlPlane) -> (Agent<FakeControlPlane>, SimulatedRuntime) {
    let runtime = SimulatedRuntime::new();
    runtime.add_script(CODE_JS, 20);
    let engine = BreakpointEngine::builder(config())
        .files(runtime.file_index())
        .clock(TokioClock::new())
        .build(&runtime.slot())
        .unwrap();
    let agent = Agent::new(
        control_plane,
        BreakpointSetCoordinator::new(engine),
        Debuggee::default(),
    );
    (agent, runtime)
}

/// Run the agent until `after` has elapsed, then stop it.
async fn run_for(agent: &mut Agent<FakeControlPlane>, after: Duration) -> Result<(), AgentError> {
    let handle = agent.handle();
    let (result, ()) = tokio::join!(agent.run(), async move {
        tokio::time::sleep(after).await;
        handle.stop();
    });
    result
}

#[tokio::test(start_paused = true)]
async fn registration_backs_off_until_it_succeeds() {
    let control_plane = FakeControlPlane::new()
        .register_with(Err(transport()))
        .register_with(Ok(RegisterResponse::default()))
        .register_with(Err(transport()))
        .list_with(Ok(listing(vec![Breakpoint::at("b1", "code.js", 5)])));
    let (mut agent, runtime) = agent(control_plane);

    run_for(&mut agent, Duration::from_secs(60)).await.unwrap();

    assert_eq!(agent.control_plane().registered_secs(), [0, 2, 8, 22]);
    assert_eq!(runtime.native_breakpoint_count(), 0);
    assert_eq!(agent.coordinator().borrow().engine().num_breakpoints(), 0);
}

#[tokio::test(start_paused = true)]
async fn disabled_debuggee_stops_the_agent() {
    let mut response = registered("d-1");
    response.debuggee.is_disabled = true;
    let (mut agent, _runtime) = agent(FakeControlPlane::new().register_with(Ok(response)));

    let err = agent.run().await.unwrap_err();
    assert!(matches!(err, AgentError::DisabledByServer));
    assert_eq!(agent.control_plane().registered_secs(), [0]);
}

#[tokio::test(start_paused = true)]
async fn unknown_debuggee_registers_again() {
    let control_plane = FakeControlPlane::new()
        .list_with(Ok(ListBreakpointsResponse {
            next_wait_token: Some("t1".to_string()),
            ..ListBreakpointsResponse::default()
        }))
        .list_with(Ok(ListBreakpointsResponse {
            wait_expired: true,
            ..ListBreakpointsResponse::default()
        }))
        .list_with(Err(ControlPlaneError::NotFound));
    let (mut agent, _runtime) = agent(control_plane);

    run_for(&mut agent, Duration::from_secs(30)).await.unwrap();

    let control_plane = agent.control_plane();
    assert_eq!(control_plane.registered_secs(), [0, 10]);
    assert_eq!(
        *control_plane.wait_tokens.borrow(),
        [None, Some("t1".to_string()), Some("t1".to_string()), None]
    );
}

#[tokio::test(start_paused = true)]
async fn fetch_errors_wait_before_registering_again() {
    let control_plane = FakeControlPlane::new().list_with(Err(transport()));
    let (mut agent, _runtime) = agent(control_plane);

    run_for(&mut agent, Duration::from_secs(400)).await.unwrap();
    assert_eq!(agent.control_plane().registered_secs(), [0, 300]);
}

#[tokio::test(start_paused = true)]
async fn hits_are_reported_when_woken() {
    let control_plane =
        FakeControlPlane::new().list_with(Ok(listing(vec![Breakpoint::at("b1", "code.js", 5)])));
    let (mut agent, runtime) = agent(control_plane);
    let coordinator = agent.coordinator();
    let handle = agent.handle();

    let host = async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let mut heap = Heap::new();
        let paused = runtime.call(
            &mut *coordinator.borrow_mut(),
            &mut heap,
            vec![Frame::new("handler", CODE_JS, 5).local("x", 7.0)],
        );
        assert!(paused);
        handle.wake();
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.stop();
    };
    let (result, ()) = tokio::join!(agent.run(), host);
    result.unwrap();

    let updates = agent.control_plane().updates.borrow().clone();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].id, "b1");
    assert!(updates[0].is_final_state);
    assert_eq!(
        updates[0].stack_frames[0].locals,
        vec![Variable::named("x").with_value("7")]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_reports_are_retried() {
    let control_plane = FakeControlPlane::new()
        .list_with(Ok(listing(vec![Breakpoint::at("b1", "missing.js", 5)])))
        .list_with(Ok(listing(vec![Breakpoint::at("b1", "missing.js", 5)])));
    control_plane.failing_updates.set(1);
    let (mut agent, _runtime) = agent(control_plane);

    run_for(&mut agent, Duration::from_secs(30)).await.unwrap();

    let updates = agent.control_plane().updates.borrow().clone();
    assert_eq!(updates.len(), 1);
    assert_eq!(status_text(&updates[0]), messages::SOURCE_FILE_NOT_FOUND);
}
