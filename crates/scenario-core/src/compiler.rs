//! # Call-flow compiler
//!
//! Compiles one role's ordered events into scenario actions. Compilation is
//! a single left-to-right fold with no look-ahead: each event is handled by
//! [`step`], which takes the current [`CompilerState`] by value and returns
//! the next state together with the actions the event produced.
//!
//! ## Dialog bookkeeping
//!
//! - Requests sent after the route set is known carry `[routes]`.
//! - The first received INVITE records the route set and remote target and
//!   stores its CSeq, Via and Record-Route headers plus a fixed dialog tag.
//!   This happens once per role.
//! - Responses with a route-bearing status (180, 183, 200), or any response
//!   while the last request was an INVITE, mark the route set as captured.
//!   Received ones record it again every time.
//! - Responses sent to the initial INVITE echo the captured tag, Via,
//!   Record-Route and, for 2xx, CSeq.
//! - A CANCEL, or the ACK of a rejected INVITE, reuses the branch of the
//!   INVITE it refers to.
//!
//! ## Example
//!
//! ```rust
//! use sippcap_scenario::compiler::{compile, CompileOptions};
//! use sippcap_scenario::{ActionKind, Event, Role};
//!
//! let events = vec![Event::outbound("INVITE"), Event::inbound("200")];
//! let actions = compile(&events, Role::Uac, &CompileOptions::default()).unwrap();
//!
//! assert_eq!(actions.len(), 3);
//! assert_eq!(actions[0].kind, ActionKind::SendRequest);
//! assert!(actions[1].is_optional);
//! assert_eq!(actions[2].payload_hint, "200");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::action::{Action, ActionKind, Binding, Role};
use crate::error::{Result, ScenarioError};
use crate::event::{Direction, Event};
use crate::kind::{MessageKind, RequestMethod, ResponseStatus};

/// Interim status an intermediary may synthesize after an INVITE
pub const TRYING: &str = "100";

/// Which routing headers to capture and replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingProfile {
    /// Endpoints talk to each other directly: one Via, no Record-Route
    #[default]
    Direct,
    /// A proxy sits in the path: two Vias, one Record-Route
    Intermediary,
}

impl RoutingProfile {
    pub fn via_count(&self) -> u8 {
        match self {
            RoutingProfile::Direct => 1,
            RoutingProfile::Intermediary => 2,
        }
    }

    pub fn record_route_count(&self) -> u8 {
        match self {
            RoutingProfile::Direct => 0,
            RoutingProfile::Intermediary => 1,
        }
    }

    /// Via and Record-Route captures for a received message
    fn header_captures(&self) -> impl Iterator<Item = Binding> {
        let vias = (1..=self.via_count()).map(|n| Binding::capture_occurrence("Via", n, "via"));
        let routes = (1..=self.record_route_count())
            .map(|n| Binding::capture_occurrence("Record-Route", n, "route"));
        vias.chain(routes)
    }
}

/// Compiler settings shared by both roles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub routing: RoutingProfile,
    /// Insert a pause before a sent message when the captured gap is at least this long
    pub pause_threshold: Option<Duration>,
}

/// State carried from one event to the next while compiling one role
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerState {
    /// Set once a route set is known; never cleared
    pub have_captured_routes: bool,
    pub saw_first_initiating_request: bool,
    /// Number of actions emitted so far
    pub sequence_counter: u32,
    pub last_request: Option<RequestMethod>,
    /// CSeq number of the first received INVITE
    pub initial_invite_cseq: Option<u32>,
    /// Position of the last sent INVITE
    pub invite_index: Option<u32>,
    /// The last sent INVITE got a non-2xx final response
    pub invite_rejected: bool,
    pub last_timestamp: Option<Duration>,
}

impl CompilerState {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&mut self, actions: &mut Vec<Action>, action: Action) -> u32 {
        let index = self.sequence_counter;
        debug!(index, "{}", action);
        actions.push(action);
        self.sequence_counter += 1;
        index
    }

    fn branch_offset(&self) -> Option<u32> {
        self.invite_index.map(|index| self.sequence_counter - index)
    }

    /// Whether an outbound response answers the initial received INVITE
    fn answers_initial_invite(&self, event: &Event) -> bool {
        if !self.saw_first_initiating_request {
            return false;
        }
        match event.headers.cseq() {
            Some((seq, method)) => method == RequestMethod::Invite.as_str() && Some(seq) == self.initial_invite_cseq,
            None => self.last_request == Some(RequestMethod::Invite),
        }
    }

    /// Whether a response answers an INVITE, by CSeq or else by the last request
    fn answers_invite(&self, event: &Event) -> bool {
        match event.headers.cseq() {
            Some((_, method)) => method == RequestMethod::Invite.as_str(),
            None => self.last_request == Some(RequestMethod::Invite),
        }
    }
}

/// Compile one event
///
/// Fails with [`ScenarioError::InvalidEvent`] for events without direction
/// or kind and with [`ScenarioError::UnsupportedMessageKind`] when the kind
/// is neither a supported method nor a status.
pub fn step(state: CompilerState, event: &Event, options: &CompileOptions) -> Result<(CompilerState, Vec<Action>)> {
    event.validate()?;
    let direction = event
        .direction
        .ok_or_else(|| ScenarioError::invalid_event("missing direction"))?;
    let kind = event.message_kind()?;

    let mut state = state;
    let mut actions = Vec::new();

    if let Some(timestamp) = event.timestamp {
        if let (Direction::Outbound, Some(threshold), Some(last)) =
            (direction, options.pause_threshold, state.last_timestamp)
        {
            let gap = timestamp.saturating_sub(last);
            if !gap.is_zero() && gap >= threshold {
                state.emit(&mut actions, Action::wait(gap.as_millis()));
            }
        }
        state.last_timestamp = Some(timestamp);
    }

    match (kind, direction) {
        (MessageKind::Request(method), Direction::Outbound) => {
            send_request(&mut state, &mut actions, method, event);
        }
        (MessageKind::Request(method), Direction::Inbound) => {
            recv_request(&mut state, &mut actions, method, event, options);
        }
        (MessageKind::Response(status), Direction::Outbound) => {
            send_response(&mut state, &mut actions, status, event, options);
        }
        (MessageKind::Response(status), Direction::Inbound) => {
            recv_response(&mut state, &mut actions, status, event, options);
        }
    }

    Ok((state, actions))
}

fn send_request(state: &mut CompilerState, actions: &mut Vec<Action>, method: RequestMethod, event: &Event) {
    let mut bindings = Vec::new();
    if state.have_captured_routes {
        bindings.push(Binding::UseSavedRoutes);
    }

    let reuses_branch = match method {
        RequestMethod::Cancel => true,
        RequestMethod::Ack => state.invite_rejected,
        _ => false,
    };
    if reuses_branch {
        if let Some(offset) = state.branch_offset() {
            bindings.push(Binding::ReuseBranch { offset });
        }
    }

    let mut action = Action::new(ActionKind::SendRequest, method.as_str())
        .with_bindings(bindings)
        .with_body(event.session_description.clone());
    action.event_package = event.headers.get("Event").map(str::to_string);
    let index = state.emit(actions, action);

    if method.is_dialog_initiating() {
        state.invite_index = Some(index);
        state.invite_rejected = false;
        state.emit(actions, Action::new(ActionKind::RecvResponse, TRYING).optional(true));
    }
    state.last_request = Some(method);
}

fn recv_request(
    state: &mut CompilerState,
    actions: &mut Vec<Action>,
    method: RequestMethod,
    event: &Event,
    options: &CompileOptions,
) {
    let mut bindings = Vec::new();

    if method.is_dialog_initiating() && !state.saw_first_initiating_request {
        bindings.push(Binding::CaptureRoutingTarget);
        bindings.push(Binding::CaptureHeader {
            header: "CSeq".to_string(),
            occurrence: None,
            variable: "invite_cseq".to_string(),
        });
        bindings.extend(options.routing.header_captures());
        bindings.push(Binding::AssignLocalTag);

        state.saw_first_initiating_request = true;
        state.have_captured_routes = true;
        state.initial_invite_cseq = event.headers.cseq().map(|(seq, _)| seq);
    }

    let mut action = Action::new(ActionKind::RecvRequest, method.as_str()).with_bindings(bindings);
    action.event_package = event.headers.get("Event").map(str::to_string);
    state.emit(actions, action);
    state.last_request = Some(method);
}

fn is_route_bearing(state: &CompilerState, status: &ResponseStatus) -> bool {
    status.is_route_bearing_code() || state.last_request == Some(RequestMethod::Invite)
}

fn send_response(
    state: &mut CompilerState,
    actions: &mut Vec<Action>,
    status: ResponseStatus,
    event: &Event,
    options: &CompileOptions,
) {
    let route_bearing = is_route_bearing(state, &status);
    if route_bearing {
        state.have_captured_routes = true;
    }

    let answers_initial = state.answers_initial_invite(event);
    let mut bindings = Vec::new();

    // Captured dialog state wins over the per-call tag
    if answers_initial {
        bindings.push(Binding::EchoLocalTag);
    } else if !state.saw_first_initiating_request && state.invite_index.is_none() {
        bindings.push(Binding::AssignCallTag);
    }

    if route_bearing && answers_initial {
        bindings.push(Binding::EchoVia {
            count: options.routing.via_count(),
        });
        if options.routing.record_route_count() > 0 {
            bindings.push(Binding::EchoRecordRoute {
                count: options.routing.record_route_count(),
            });
        }
        if status.is_success() {
            bindings.push(Binding::EchoRequestCSeq);
        }
    }

    let action = Action::new(ActionKind::SendResponse, status.text)
        .with_bindings(bindings)
        .with_body(event.session_description.clone());
    state.emit(actions, action);
}

fn recv_response(
    state: &mut CompilerState,
    actions: &mut Vec<Action>,
    status: ResponseStatus,
    event: &Event,
    options: &CompileOptions,
) {
    let route_bearing = is_route_bearing(state, &status);
    let mut bindings = Vec::new();
    if route_bearing {
        state.have_captured_routes = true;
        bindings.push(Binding::CaptureRouteSet);
        bindings.extend(options.routing.header_captures());
    }

    if status.is_final() && state.answers_invite(event) {
        state.invite_rejected = !status.is_success();
    }

    // SIPp matches received responses on the bare code
    let action = Action::new(ActionKind::RecvResponse, status.code.to_string())
        .with_bindings(bindings)
        .optional(status.is_provisional());
    state.emit(actions, action);
}

/// Compile one role's events into scenario actions
///
/// Deterministic: the same events and options always produce the same
/// actions. The first failing event aborts compilation.
pub fn compile(events: &[Event], role: Role, options: &CompileOptions) -> Result<Vec<Action>> {
    let span = debug_span!("compile", role = %role);
    let _enter = span.enter();

    let (state, actions) = events
        .iter()
        .try_fold((CompilerState::new(), Vec::new()), |(state, mut actions), event| {
            let (state, emitted) = step(state, event, options)?;
            actions.extend(emitted);
            Ok::<_, ScenarioError>((state, actions))
        })?;

    debug!(
        events = events.len(),
        actions = actions.len(),
        have_captured_routes = state.have_captured_routes,
        "role compiled"
    );
    Ok(actions)
}
