//! Request templates
//!
//! One SIPp message skeleton per [`RequestMethod`]. Values that do not
//! depend on the step (party numbers, subject) are filled in when the
//! template is built; headers that depend on the compiled bindings are
//! gated lines.

use crate::classifier::SDP_MEDIA_TYPE;
use crate::kind::RequestMethod;
use crate::template::{uses_saved_routes, RenderContext, Template};

const ALLOW: &str = "Allow: INVITE, ACK, BYE, CANCEL, OPTIONS, PRACK, REFER, NOTIFY, MESSAGE, SUBSCRIBE, INFO, UPDATE";
const VIA: &str = "Via: SIP/2.0/[transport] [local_ip]:[local_port];branch=";

fn no_saved_routes(ctx: &RenderContext<'_>) -> bool {
    !ctx.uses_saved_routes()
}

// Inside the confirmed dialog: route set known and not answering an INVITE transaction
fn in_dialog(ctx: &RenderContext<'_>) -> bool {
    ctx.uses_saved_routes() && ctx.reused_branch().is_none()
}

fn outside_dialog(ctx: &RenderContext<'_>) -> bool {
    !in_dialog(ctx)
}

fn reuses_branch(ctx: &RenderContext<'_>) -> bool {
    ctx.reused_branch().is_some()
}

fn new_transaction(ctx: &RenderContext<'_>) -> bool {
    ctx.reused_branch().is_none()
}

impl RequestMethod {
    /// Build the message template for this method
    pub fn template(&self, ctx: &RenderContext<'_>) -> Template {
        let dialog = ctx.dialog;
        let caller = dialog.caller.as_str();
        let callee = dialog.callee.as_str();
        let subject = format!("Subject: {}", dialog.scenario_name);
        let body = ctx.action.body.as_str();
        let via = format!("{}{}", VIA, ctx.branch());
        let contact = format!("Contact: <sip:{}@[local_ip]:[local_port]>", caller);
        let local_from = format!("From: sipp <sip:{}@[local_ip]:[local_port]>;tag=[pid]-[call_number]", caller);
        let remote_to = format!("To: sut <sip:{}@[remote_ip]:[remote_port]>", callee);
        let remote_uri = format!("sip:{}@[remote_ip]:[remote_port]", callee);

        // Request line that follows the dialog route set once it is known
        let routed_request_line = |template: Template, method: &str| {
            template
                .line_if(in_dialog, format!("{} [next_url] SIP/2.0", method))
                .line_if(outside_dialog, format!("{} {} SIP/2.0", method, remote_uri))
        };

        match self {
            RequestMethod::Invite => routed_request_line(Template::new(), "INVITE")
                .line(via)
                .line_if(uses_saved_routes, "[routes]")
                .line(local_from)
                .line_if(no_saved_routes, remote_to.clone())
                .line_if(uses_saved_routes, format!("{}[peer_tag_param]", remote_to))
                .line("Call-ID: [call_id]")
                .line("CSeq: [cseq] INVITE")
                .line("Supported: 100rel")
                .line(format!("Contact: <sip:{}@[local_ip]:[local_port];user=phone>", caller))
                .line("Max-Forwards: 70")
                .line(ALLOW)
                .line(subject)
                .body(SDP_MEDIA_TYPE, body),

            RequestMethod::Ack => routed_request_line(Template::new(), "ACK")
                .line(via)
                .line("[last_From:]")
                .line("[last_To:]")
                .line("[last_Call-ID:]")
                .line_if(in_dialog, "[routes]")
                .line_if(new_transaction, "CSeq: [cseq] ACK")
                .line_if(reuses_branch, "CSeq: [last_cseq_number] ACK")
                .line(contact)
                .line("Max-Forwards: 70")
                .line(subject)
                .body(SDP_MEDIA_TYPE, body),

            RequestMethod::Bye => routed_request_line(Template::new(), "BYE")
                .line(via)
                .line(local_from)
                .line(format!("{}[peer_tag_param]", remote_to))
                .line("[last_Call-ID:]")
                .line_if(uses_saved_routes, "[routes]")
                .line("CSeq: [cseq] BYE")
                .line(contact)
                .line("Max-Forwards: 70")
                .line("Reason: Q.850;cause=16;text=\"Terminated\"")
                .body(SDP_MEDIA_TYPE, body),

            RequestMethod::Cancel => Template::new()
                .line(format!("CANCEL {} SIP/2.0", remote_uri))
                .line(via)
                .line("[last_From:]")
                .line("[last_To:]")
                .line("[last_Call-ID:]")
                .line("CSeq: [last_cseq_number] CANCEL")
                .line(contact)
                .line("Max-Forwards: 70")
                .line("Reason: Q.850;cause=16;text=\"Terminated\"")
                .body(SDP_MEDIA_TYPE, body),

            RequestMethod::Register => Template::new()
                .line("REGISTER sip:[remote_ip] SIP/2.0")
                .line(via)
                .line(format!("From: <sip:{}@[remote_ip]:[remote_port]>;tag=[pid]-[call_number]", caller))
                .line(format!("To: <sip:{}@[remote_ip]:[remote_port]>", caller))
                .line(format!("Contact: <sip:{}@[local_ip]:[local_port]>;transport=[transport]", caller))
                .line("Expires: 3600")
                .line("Call-ID: [call_id]")
                .line("CSeq: [cseq] REGISTER")
                .line("Max-Forwards: 70")
                .body(SDP_MEDIA_TYPE, body),

            RequestMethod::Options => Template::new()
                .line(format!("OPTIONS {} SIP/2.0", remote_uri))
                .line(via)
                .line(format!("From: \"{}\" <sip:{}@[local_ip]>;tag=[pid]-[call_number]", caller, caller))
                .line(format!("To: <sip:{}@[remote_ip]>", callee))
                .line("Call-ID: [call_id]")
                .line("CSeq: [cseq] OPTIONS")
                .line(subject)
                .line("User-Agent: SIPp")
                .line("Accept: application/sdp")
                .line("Max-Forwards: 70")
                .body(SDP_MEDIA_TYPE, body),

            RequestMethod::Prack => routed_request_line(Template::new(), "PRACK")
                .line(via)
                .line("[last_From:]")
                .line("[last_To:]")
                .line("[last_Call-ID:]")
                .line_if(uses_saved_routes, "[routes]")
                .line("CSeq: [cseq] PRACK")
                .line("Max-Forwards: 70")
                .line(subject)
                .body(SDP_MEDIA_TYPE, body),

            RequestMethod::Subscribe => Template::new()
                .line(format!("SUBSCRIBE sip:{}@[remote_ip] SIP/2.0", callee))
                .line(via)
                .line(format!("From: <sip:{}@[local_ip]:[local_port]>;tag=[pid]-[call_number]", caller))
                .line(format!("To: <sip:{}@[remote_ip]:[remote_port]>", callee))
                .line(format!("Contact: <sip:{}@[local_ip]:[local_port];transport=[transport]>", caller))
                .line("Call-ID: [call_id]")
                .line("CSeq: [cseq] SUBSCRIBE")
                .line(format!("Event: {}", ctx.event_package()))
                .line("Expires: 3600")
                .line("Max-Forwards: 70")
                .line("User-Agent: SIPp")
                .line(ALLOW)
                .body(SDP_MEDIA_TYPE, body),

            RequestMethod::Notify => Template::new()
                .line(format!("NOTIFY sip:{}@[remote_ip]:[remote_port] SIP/2.0", dialog.subscriber()))
                .line(via)
                .line(format!("From: <sip:{}@[local_ip]:[local_port]>;tag=[pid]-[call_number]", caller))
                .line(format!("To: <sip:{}@[remote_ip]:[remote_port]>", dialog.subscriber()))
                .line(contact)
                .line("Call-ID: [call_id]")
                .line("CSeq: [cseq] NOTIFY")
                .line(format!("Event: {}", ctx.event_package()))
                .line("Subscription-State: active;expires=3600")
                .line("Max-Forwards: 70")
                .line("Allow-Events: talk, hold, refer, conference")
                .body(SDP_MEDIA_TYPE, body),

            RequestMethod::Publish => Template::new()
                .line(format!("PUBLISH sip:{}@[remote_ip]:[remote_port] SIP/2.0", caller))
                .line(format!("Via: SIP/2.0/[transport] [local_ip]:[local_port];rport;branch={}", ctx.branch()))
                .line(format!("From: <sip:{}@[remote_ip]>;tag=[pid]-[call_number]", caller))
                .line(format!("To: <sip:{}@[remote_ip]>", caller))
                .line("Call-ID: [call_id]")
                .line("CSeq: [cseq] PUBLISH")
                .line(contact)
                .line("Expires: 60")
                .line("Max-Forwards: 70")
                .line("User-Agent: SIPp")
                .line(format!("Event: {}", ctx.event_package()))
                .body(SDP_MEDIA_TYPE, body),

            RequestMethod::Info => routed_request_line(Template::new(), "INFO")
                .line(via)
                .line(local_from)
                .line(format!("{}[peer_tag_param]", remote_to))
                .line("Call-ID: [call_id]")
                .line_if(uses_saved_routes, "[routes]")
                .line("CSeq: [cseq] INFO")
                .line("Max-Forwards: 70")
                .line(contact)
                .body(SDP_MEDIA_TYPE, body),

            RequestMethod::Refer => routed_request_line(Template::new(), "REFER")
                .line(via)
                .line(local_from)
                .line(format!("{}[peer_tag_param]", remote_to))
                .line("Call-ID: [call_id]")
                .line_if(uses_saved_routes, "[routes]")
                .line("CSeq: [cseq] REFER")
                .line(contact)
                .line(ALLOW)
                .line("Max-Forwards: 70")
                .line(format!("Refer-To: <sip:{}@[remote_ip];user=phone>", callee))
                .line(format!("Referred-By: <sip:{}@[local_ip]:[local_port]>", caller))
                .body(SDP_MEDIA_TYPE, body),

            RequestMethod::Message => Template::new()
                .line(format!("MESSAGE sip:{}@[remote_ip] SIP/2.0", callee))
                .line(via)
                .line(format!("From: \"{}\" <sip:{}@[local_ip]>;tag=[pid]-[call_number]", caller, caller))
                .line(format!("To: <sip:{}@[remote_ip]>", callee))
                .line("Call-ID: [call_id]")
                .line("CSeq: [cseq] MESSAGE")
                .line("Max-Forwards: 70")
                .line(contact)
                .line("User-Agent: SIPp")
                .line(subject)
                .body(SDP_MEDIA_TYPE, body),

            RequestMethod::Update => routed_request_line(Template::new(), "UPDATE")
                .line(via)
                .line(local_from)
                .line(format!("{}[peer_tag_param]", remote_to))
                .line("Call-ID: [call_id]")
                .line_if(uses_saved_routes, "[routes]")
                .line("CSeq: [cseq] UPDATE")
                .line("Max-Forwards: 70")
                .line("User-Agent: SIPp")
                .line(contact)
                .body(SDP_MEDIA_TYPE, body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionKind, Binding};
    use crate::template::DialogContext;

    fn render(method: RequestMethod, action: &Action) -> String {
        let dialog = DialogContext::new("999912344321", "888812344321", "Basic call");
        let ctx = RenderContext::new(&dialog, action);
        method.template(&ctx).render(&ctx)
    }

    #[test]
    fn test_every_method_has_length_and_request_line() {
        for method in RequestMethod::ALL {
            let action = Action::new(ActionKind::SendRequest, method.as_str());
            let text = render(method, &action);
            assert!(text.starts_with(method.as_str()), "{}", text);
            assert!(text.contains("Content-Length: [len]"), "{}", text);
            assert!(!text.contains("Content-Type"), "{}", text);
        }
    }

    #[test]
    fn test_initial_invite() {
        let action = Action::new(ActionKind::SendRequest, "INVITE").with_body("v=0\nm=audio [media_port] RTP/AVP 0");
        let text = render(RequestMethod::Invite, &action);
        assert!(text.starts_with("INVITE sip:888812344321@[remote_ip]:[remote_port] SIP/2.0\n"));
        assert!(text.contains("From: sipp <sip:999912344321@[local_ip]:[local_port]>;tag=[pid]-[call_number]"));
        assert!(text.contains("Subject: Basic call"));
        assert!(text.contains("Content-Type: application/sdp\nContent-Length: [len]\n\nv=0\n"));
        assert!(!text.contains("[routes]"));
    }

    #[test]
    fn test_in_dialog_ack_uses_route_set() {
        let action = Action::new(ActionKind::SendRequest, "ACK").with_bindings(vec![Binding::UseSavedRoutes]);
        let text = render(RequestMethod::Ack, &action);
        assert!(text.starts_with("ACK [next_url] SIP/2.0\n"));
        assert!(text.contains("\n[routes]\n"));
        assert!(text.contains("branch=[branch]\n"));
    }

    #[test]
    fn test_ack_of_rejected_invite() {
        let action = Action::new(ActionKind::SendRequest, "ACK")
            .with_bindings(vec![Binding::UseSavedRoutes, Binding::ReuseBranch { offset: 3 }]);
        let text = render(RequestMethod::Ack, &action);
        assert!(text.starts_with("ACK sip:888812344321@[remote_ip]:[remote_port] SIP/2.0\n"));
        assert!(text.contains("branch=[branch-3]"));
        assert!(text.contains("CSeq: [last_cseq_number] ACK"));
        assert!(!text.contains("[routes]"));
    }

    #[test]
    fn test_subscribe_event_package() {
        let mut action = Action::new(ActionKind::SendRequest, "SUBSCRIBE");
        action.event_package = Some("dialog".to_string());
        let text = render(RequestMethod::Subscribe, &action);
        assert!(text.contains("\nEvent: dialog\n"));
    }
}
