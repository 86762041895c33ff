//! Structured message templates
//!
//! A [`Template`] is an ordered list of lines. A line may carry a predicate
//! over the [`RenderContext`]; it is emitted only when the predicate holds.
//! Conditional headers such as Content-Type, `[routes]` or echoed Via lines
//! are therefore data, not string concatenation.

use crate::action::{Action, Binding};

/// Default event package for SUBSCRIBE, NOTIFY and PUBLISH
pub const DEFAULT_EVENT_PACKAGE: &str = "presence";

/// Per-scenario values shared by every rendered step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogContext {
    /// A-party number
    pub caller: String,
    /// B-party number
    pub callee: String,
    /// Scenario name, also used as Subject
    pub scenario_name: String,
    /// NOTIFY target; the callee when unset
    pub subscriber: Option<String>,
    /// Event package used when the captured message had no Event header
    pub default_event: String,
}

impl DialogContext {
    pub fn new(caller: impl Into<String>, callee: impl Into<String>, scenario_name: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            callee: callee.into(),
            scenario_name: scenario_name.into(),
            subscriber: None,
            default_event: DEFAULT_EVENT_PACKAGE.to_string(),
        }
    }

    pub fn subscriber(&self) -> &str {
        self.subscriber.as_deref().unwrap_or(&self.callee)
    }
}

/// What a template line predicate can look at
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub dialog: &'a DialogContext,
    pub action: &'a Action,
}

impl<'a> RenderContext<'a> {
    pub fn new(dialog: &'a DialogContext, action: &'a Action) -> Self {
        Self { dialog, action }
    }

    pub fn has_body(&self) -> bool {
        !self.action.body.is_empty()
    }

    pub fn uses_saved_routes(&self) -> bool {
        self.action.has(&Binding::UseSavedRoutes)
    }

    /// Branch offset of the INVITE this request belongs to
    pub fn reused_branch(&self) -> Option<u32> {
        self.action.bindings.iter().find_map(|b| match b {
            Binding::ReuseBranch { offset } => Some(*offset),
            _ => None,
        })
    }

    /// `[branch]`, or `[branch-N]` when the request reuses an earlier branch
    pub fn branch(&self) -> String {
        match self.reused_branch() {
            Some(offset) => format!("[branch-{}]", offset),
            None => "[branch]".to_string(),
        }
    }

    pub fn echoed_vias(&self) -> u8 {
        self.action
            .bindings
            .iter()
            .find_map(|b| match b {
                Binding::EchoVia { count } => Some(*count),
                _ => None,
            })
            .unwrap_or(0)
    }

    pub fn echoed_record_routes(&self) -> u8 {
        self.action
            .bindings
            .iter()
            .find_map(|b| match b {
                Binding::EchoRecordRoute { count } => Some(*count),
                _ => None,
            })
            .unwrap_or(0)
    }

    /// Event package of the step
    pub fn event_package(&self) -> &str {
        self.action
            .event_package
            .as_deref()
            .unwrap_or(&self.dialog.default_event)
    }
}

/// Line predicate
pub type Predicate = fn(&RenderContext<'_>) -> bool;

/// Emit the line only when the step carries a body
pub fn has_body(ctx: &RenderContext<'_>) -> bool {
    ctx.has_body()
}

/// Emit the line only when the step replays the captured route set
pub fn uses_saved_routes(ctx: &RenderContext<'_>) -> bool {
    ctx.uses_saved_routes()
}

/// One template line, optionally gated
#[derive(Debug, Clone)]
pub struct TemplateLine {
    pub text: String,
    pub predicate: Option<Predicate>,
}

impl TemplateLine {
    fn applies(&self, ctx: &RenderContext<'_>) -> bool {
        self.predicate.map_or(true, |p| p(ctx))
    }
}

/// Ordered, predicate-gated lines of a SIP message skeleton
#[derive(Debug, Clone, Default)]
pub struct Template {
    lines: Vec<TemplateLine>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an unconditional line
    pub fn line(mut self, text: impl Into<String>) -> Self {
        self.lines.push(TemplateLine {
            text: text.into(),
            predicate: None,
        });
        self
    }

    /// Append a line emitted only when `predicate` holds
    pub fn line_if(mut self, predicate: Predicate, text: impl Into<String>) -> Self {
        self.lines.push(TemplateLine {
            text: text.into(),
            predicate: Some(predicate),
        });
        self
    }

    /// Append `Content-Type` (only with a body), `Content-Length`, the
    /// separator and the body
    pub fn body(self, content_type: &str, body: &str) -> Self {
        self.line_if(has_body, format!("Content-Type: {}", content_type))
            .line("Content-Length: [len]")
            .line("")
            .line_if(has_body, body)
    }

    /// Render the lines that apply to `ctx`, one per output line
    pub fn render(&self, ctx: &RenderContext<'_>) -> String {
        self.lines
            .iter()
            .filter(|line| line.applies(ctx))
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;

    #[test]
    fn test_gated_lines() {
        let dialog = DialogContext::new("1000", "2000", "test");
        let template = Template::new()
            .line("OPTIONS sip:x SIP/2.0")
            .line_if(uses_saved_routes, "[routes]")
            .body("application/sdp", "v=0");

        let plain = Action::new(ActionKind::SendRequest, "OPTIONS");
        assert_eq!(
            template.render(&RenderContext::new(&dialog, &plain)),
            "OPTIONS sip:x SIP/2.0\nContent-Length: [len]\n"
        );

        let routed = Action::new(ActionKind::SendRequest, "OPTIONS")
            .with_bindings(vec![Binding::UseSavedRoutes])
            .with_body("v=0");
        assert_eq!(
            template.render(&RenderContext::new(&dialog, &routed)),
            "OPTIONS sip:x SIP/2.0\n[routes]\nContent-Type: application/sdp\nContent-Length: [len]\n\nv=0"
        );
    }

    #[test]
    fn test_branch_and_echo_counts() {
        let dialog = DialogContext::new("1000", "2000", "test");
        let action = Action::new(ActionKind::SendRequest, "CANCEL").with_bindings(vec![
            Binding::ReuseBranch { offset: 3 },
            Binding::EchoVia { count: 2 },
        ]);
        let ctx = RenderContext::new(&dialog, &action);
        assert_eq!(ctx.branch(), "[branch-3]");
        assert_eq!(ctx.echoed_vias(), 2);
        assert_eq!(ctx.echoed_record_routes(), 0);
        assert_eq!(ctx.event_package(), DEFAULT_EVENT_PACKAGE);
    }
}
