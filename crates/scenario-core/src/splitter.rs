//! Role splitting
//!
//! Partitions the captured packets into one event sequence per role. A
//! packet is tested against both roles independently, so a capture taken
//! at a midpoint can contribute the same packet to both sequences.

use sippcap_capture::PacketRecord;
use tracing::{info, warn};

use crate::classifier::{classify, RoleAddress};
use crate::error::{Result, ScenarioError};
use crate::event::Event;

/// Ordered events for the A-side (caller) and B-side (callee)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleEvents {
    pub caller: Vec<Event>,
    pub callee: Vec<Event>,
}

/// Split `packets` into per-role event sequences
///
/// Packets that do not involve a role are skipped for that role. Any other
/// classification error aborts the split. Fails with
/// [`ScenarioError::NoEventsForRole`] if a sequence ends up empty; the
/// caller side is checked first.
pub fn split(packets: &[PacketRecord], caller: &RoleAddress, callee: &RoleAddress) -> Result<RoleEvents> {
    let mut events = RoleEvents::default();

    for packet in packets {
        if let Some(event) = classify_for(packet, caller)? {
            events.caller.push(event);
        }
        if let Some(event) = classify_for(packet, callee)? {
            events.callee.push(event);
        }
    }

    if events.caller.is_empty() {
        return Err(ScenarioError::NoEventsForRole(caller.to_string()));
    }
    if events.callee.is_empty() {
        return Err(ScenarioError::NoEventsForRole(callee.to_string()));
    }

    info!(
        "captured {} UAC packets & {} UAS packets",
        events.caller.len(),
        events.callee.len()
    );
    Ok(events)
}

fn classify_for(packet: &PacketRecord, role: &RoleAddress) -> Result<Option<Event>> {
    match classify(packet, role) {
        Ok(event) => Ok(Some(event)),
        Err(e @ ScenarioError::UnroutablePacket { .. }) => {
            warn!(
                frame = packet.frame,
                source = %packet.source,
                destination = %packet.destination,
                error = %e,
                "packet skipped"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
