//! The unit of work moving through the pipeline (spec §3 "Packet").

use std::time::Instant;

use crate::peer::Address;

/// An owned datagram in flight through the proxy.
///
/// `send_time` is absent on receipt, set when the packet is admitted into
/// the latency queue, and overwritten again when it moves onto the virtual
/// link's on-deck slot. Packets move between holders by transfer; nothing
/// clones a payload once it has been received.
#[derive(Debug)]
pub struct Packet {
    pub payload: Vec<u8>,
    pub forward_to: Address,
    pub send_time: Option<Instant>,
}

impl Packet {
    pub fn new(payload: Vec<u8>, forward_to: Address) -> Self {
        Self {
            payload,
            forward_to,
            send_time: None,
        }
    }
}
