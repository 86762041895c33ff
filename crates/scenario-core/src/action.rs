//! Scenario steps produced by the compiler

use std::fmt;

use serde::{Deserialize, Serialize};

/// Call participant a scenario is generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// A-side, the caller
    Uac,
    /// B-side, the callee
    Uas,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Uac => "UAC",
            Role::Uas => "UAS",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a scenario step does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    SendRequest,
    RecvRequest,
    SendResponse,
    RecvResponse,
    Wait,
}

/// Extraction, assignment and echo directives attached to a step
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Record the route set and remote target of the received initial request
    CaptureRoutingTarget,
    /// Record the route set carried by a received response
    CaptureRouteSet,
    /// Store one header occurrence in a scenario variable
    CaptureHeader {
        header: String,
        occurrence: Option<u8>,
        variable: String,
    },
    /// Create the per-process dialog tag `[pid]-[call_number]`
    AssignLocalTag,
    /// The request carries the captured route set
    UseSavedRoutes,
    /// The response echoes the first `count` captured Via headers
    EchoVia { count: u8 },
    /// The response echoes the first `count` captured Record-Route headers
    EchoRecordRoute { count: u8 },
    /// The response To tag is the captured dialog tag
    EchoLocalTag,
    /// The response To tag is the call number
    AssignCallTag,
    /// The response echoes the CSeq of the initial INVITE
    EchoRequestCSeq,
    /// The request reuses the branch of the INVITE sent `offset` steps earlier
    ReuseBranch { offset: u32 },
}

impl Binding {
    /// Capture a numbered header occurrence into `<prefix>_<n>`
    pub fn capture_occurrence(header: &str, n: u8, prefix: &str) -> Self {
        Binding::CaptureHeader {
            header: header.to_string(),
            occurrence: Some(n),
            variable: format!("{}_{}", prefix, n),
        }
    }

    /// Returns true for bindings that extract state from a received message
    pub fn is_capture(&self) -> bool {
        matches!(
            self,
            Binding::CaptureRoutingTarget
                | Binding::CaptureRouteSet
                | Binding::CaptureHeader { .. }
                | Binding::AssignLocalTag
        )
    }

    /// Returns true for bindings that record a route set (`rrs="true"`)
    pub fn records_route_set(&self) -> bool {
        matches!(self, Binding::CaptureRoutingTarget | Binding::CaptureRouteSet)
    }
}

/// One emitted scenario step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    /// Method name, status line or code, or pause milliseconds for `Wait`
    pub payload_hint: String,
    pub bindings: Vec<Binding>,
    pub is_optional: bool,
    /// Session description carried by the step
    pub body: String,
    /// Observed `Event` header, used by event package templates
    pub event_package: Option<String>,
}

impl Action {
    pub fn new(kind: ActionKind, payload_hint: impl Into<String>) -> Self {
        Self {
            kind,
            payload_hint: payload_hint.into(),
            bindings: Vec::new(),
            is_optional: false,
            body: String::new(),
            event_package: None,
        }
    }

    pub fn wait(milliseconds: u128) -> Self {
        Self::new(ActionKind::Wait, milliseconds.to_string())
    }

    pub fn optional(mut self, is_optional: bool) -> Self {
        self.is_optional = is_optional;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_bindings(mut self, bindings: Vec<Binding>) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn has(&self, binding: &Binding) -> bool {
        self.bindings.contains(binding)
    }

    /// Returns true if a binding matching `predicate` is attached
    pub fn has_any(&self, predicate: impl Fn(&Binding) -> bool) -> bool {
        self.bindings.iter().any(predicate)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind, self.payload_hint)?;
        if self.is_optional {
            write!(f, " optional")?;
        }
        if !self.bindings.is_empty() {
            write!(f, " {:?}", self.bindings)?;
        }
        Ok(())
    }
}
