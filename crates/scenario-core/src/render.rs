//! Action rendering
//!
//! Turns one compiled [`Action`] into a SIPp scenario fragment: a `<send>`
//! with a CDATA message, a `<recv>` expectation or a `<pause>`.

use quick_xml::events::{BytesCData, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::action::{Action, ActionKind, Binding};
use crate::classifier::SDP_MEDIA_TYPE;
use crate::error::{Result, ScenarioError};
use crate::kind::{RequestMethod, ResponseStatus};
use crate::template::{DialogContext, RenderContext, Template};

fn echoes_local_tag(ctx: &RenderContext<'_>) -> bool {
    ctx.action.has(&Binding::EchoLocalTag)
}

fn assigns_call_tag(ctx: &RenderContext<'_>) -> bool {
    !echoes_local_tag(ctx) && ctx.action.has(&Binding::AssignCallTag)
}

fn keeps_observed_to(ctx: &RenderContext<'_>) -> bool {
    !echoes_local_tag(ctx) && !assigns_call_tag(ctx)
}

fn echoes_request_cseq(ctx: &RenderContext<'_>) -> bool {
    ctx.action.has(&Binding::EchoRequestCSeq)
}

fn keeps_last_cseq(ctx: &RenderContext<'_>) -> bool {
    !echoes_request_cseq(ctx)
}

fn keeps_last_via(ctx: &RenderContext<'_>) -> bool {
    ctx.echoed_vias() == 0
}

/// Response skeleton shared by every status
pub fn response_template(ctx: &RenderContext<'_>, status_line: &str) -> Template {
    let mut template = Template::new().line(status_line).line_if(keeps_last_via, "[last_Via:]");
    for n in 1..=ctx.echoed_vias() {
        template = template.line(format!("Via: [$via_{}]", n));
    }

    template = template
        .line("[last_From:]")
        .line_if(echoes_local_tag, "[last_To:];tag=[$local_tag]")
        .line_if(assigns_call_tag, "[last_To:];tag=[call_number]")
        .line_if(keeps_observed_to, "[last_To:]");
    for n in 1..=ctx.echoed_record_routes() {
        template = template.line(format!("Record-Route: [$route_{}]", n));
    }

    template
        .line("[last_Call-ID:]")
        .line_if(echoes_request_cseq, "CSeq: [$invite_cseq]")
        .line_if(keeps_last_cseq, "[last_CSeq:]")
        .line("Contact: <sip:[local_ip]:[local_port];transport=[transport]>")
        .body(SDP_MEDIA_TYPE, &ctx.action.body)
}

fn unrenderable(reason: impl ToString) -> ScenarioError {
    ScenarioError::UnrenderableAction(reason.to_string())
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(unrenderable)
}

fn into_text(writer: Writer<Vec<u8>>) -> Result<String> {
    let mut text = String::from_utf8(writer.into_inner()).map_err(unrenderable)?;
    text.push('\n');
    Ok(text)
}

fn send_block(message: &str) -> Result<String> {
    if message.contains("]]>") {
        return Err(unrenderable("message text contains ']]>'"));
    }
    let mut writer = Writer::new(Vec::new());
    write(&mut writer, Event::Start(BytesStart::new("send")))?;
    write(&mut writer, Event::CData(BytesCData::new(format!("\n{}\n", message))))?;
    write(&mut writer, Event::End(BytesEnd::new("send")))?;
    into_text(writer)
}

fn recv_block(attribute: &str, action: &Action) -> Result<String> {
    let mut recv = BytesStart::new("recv");
    recv.push_attribute((attribute, action.payload_hint.as_str()));
    recv.push_attribute(("optional", if action.is_optional { "true" } else { "false" }));
    if action.has_any(Binding::records_route_set) {
        recv.push_attribute(("rrs", "true"));
    }

    let mut writer = Writer::new(Vec::new());
    write(&mut writer, Event::Start(recv))?;

    let directives: Vec<BytesStart<'static>> = action
        .bindings
        .iter()
        .filter(|b| b.is_capture())
        .filter_map(directive)
        .collect();
    if !directives.is_empty() {
        write(&mut writer, Event::Start(BytesStart::new("action")))?;
        for d in directives {
            write(&mut writer, Event::Empty(d))?;
        }
        write(&mut writer, Event::End(BytesEnd::new("action")))?;
    }

    write(&mut writer, Event::End(BytesEnd::new("recv")))?;
    into_text(writer)
}

// <ereg>/<assignstr> element for a capture binding
fn directive(binding: &Binding) -> Option<BytesStart<'static>> {
    match binding {
        Binding::CaptureHeader {
            header,
            occurrence,
            variable,
        } => {
            let mut ereg = BytesStart::new("ereg");
            ereg.push_attribute(("regexp", ".*"));
            ereg.push_attribute(("search_in", "hdr"));
            ereg.push_attribute(("header", format!("{}:", header).as_str()));
            if let Some(n) = occurrence {
                ereg.push_attribute(("occurrence", n.to_string().as_str()));
            }
            ereg.push_attribute(("assign_to", variable.as_str()));
            Some(ereg)
        }
        Binding::AssignLocalTag => {
            let mut assign = BytesStart::new("assignstr");
            assign.push_attribute(("assign_to", "local_tag"));
            assign.push_attribute(("value", "[pid]-[call_number]"));
            Some(assign)
        }
        _ => None,
    }
}

fn pause_block(milliseconds: u64) -> Result<String> {
    let mut pause = BytesStart::new("pause");
    pause.push_attribute(("milliseconds", milliseconds.to_string().as_str()));
    let mut writer = Writer::new(Vec::new());
    write(&mut writer, Event::Empty(pause))?;
    into_text(writer)
}

/// Render one action
///
/// Fails with [`ScenarioError::UnrenderableAction`] when a send step names
/// a method without a template, a status that cannot be parsed, or a pause
/// that is not a number of milliseconds.
pub fn render(action: &Action, dialog: &DialogContext) -> Result<String> {
    let ctx = RenderContext::new(dialog, action);

    match action.kind {
        ActionKind::SendRequest => {
            let method: RequestMethod = action
                .payload_hint
                .parse()
                .map_err(|_| ScenarioError::UnrenderableAction(format!("no template for '{}'", action.payload_hint)))?;
            send_block(&method.template(&ctx).render(&ctx))
        }
        ActionKind::SendResponse => {
            let status = ResponseStatus::parse(&action.payload_hint)
                .map_err(|_| ScenarioError::UnrenderableAction(format!("bad status '{}'", action.payload_hint)))?;
            send_block(&response_template(&ctx, &status.status_line()).render(&ctx))
        }
        ActionKind::RecvRequest => recv_block("request", action),
        ActionKind::RecvResponse => recv_block("response", action),
        ActionKind::Wait => {
            let milliseconds: u64 = action
                .payload_hint
                .parse()
                .map_err(|_| ScenarioError::UnrenderableAction(format!("bad pause '{}'", action.payload_hint)))?;
            pause_block(milliseconds)
        }
    }
}
