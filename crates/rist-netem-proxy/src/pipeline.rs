//! The packet pipeline: a single-threaded, cooperative, non-blocking
//! forwarding engine (spec §3 "Pipeline holders", §4.4, §5).

use std::collections::VecDeque;
use std::io::{self, ErrorKind};
use std::net::UdpSocket;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{ProxyError, Result};
use crate::impairment::ImpairmentState;
use crate::packet::Packet;
use crate::peer::{Address, PeerTable};

/// Sleep inserted only when all four phases were idle this iteration, to
/// avoid pegging a core (spec §5 "Suspension points"). Never applied while
/// any holder is non-empty.
const IDLE_SLEEP: Duration = Duration::from_micros(200);

pub struct Pipeline {
    socket: UdpSocket,
    peers: PeerTable,
    rng: StdRng,
    mtu: usize,

    receive_bag: Vec<Packet>,
    latency_queue: VecDeque<Packet>,
    send_bag: Vec<Packet>,
    on_deck: Option<Packet>,

    started: bool,
}

impl Pipeline {
    pub fn new(listen: Address, peers: PeerTable, rng: StdRng, mtu: usize) -> Result<Self> {
        let socket = UdpSocket::bind(listen).map_err(ProxyError::Socket)?;
        socket.set_nonblocking(true).map_err(ProxyError::Socket)?;
        Ok(Self {
            socket,
            peers,
            rng,
            mtu,
            receive_bag: Vec::new(),
            latency_queue: VecDeque::new(),
            send_bag: Vec::new(),
            on_deck: None,
            started: false,
        })
    }

    /// Runs one full pass of phases A–D, refreshing impairment state between
    /// each (spec §4.4). Returns whether any phase did useful work, so the
    /// caller can decide whether to idle-sleep.
    pub fn step(&mut self, state: &mut ImpairmentState) -> Result<bool> {
        let mut busy = false;

        busy |= self.drain_send_bag(state)?;
        state.update(self.started)?;

        busy |= self.drain_receive_queue()?;
        state.update(self.started)?;

        busy |= self.admit_to_latency_queue(state);
        state.update(self.started)?;

        busy |= self.serialize_through_link(state);
        state.update(self.started)?;

        Ok(busy)
    }

    /// Runs the proxy until `running` flips false, sleeping briefly on idle
    /// iterations (spec §5).
    pub fn run(
        &mut self,
        state: &mut ImpairmentState,
        running: &dyn Fn() -> bool,
    ) -> Result<()> {
        while running() {
            let busy = self.step(state)?;
            if !self.any_holder_nonempty() && !busy {
                std::thread::sleep(IDLE_SLEEP);
            }
        }
        Ok(())
    }

    fn any_holder_nonempty(&self) -> bool {
        !self.receive_bag.is_empty()
            || !self.latency_queue.is_empty()
            || !self.send_bag.is_empty()
            || self.on_deck.is_some()
    }

    /// Phase A — drain send-bag, corrupting and transmitting from the tail.
    fn drain_send_bag(&mut self, state: &ImpairmentState) -> Result<bool> {
        let mut did_work = false;
        while let Some(packet) = self.send_bag.last_mut() {
            let corruption_rate = state.clamped_corruption_rate();
            if self.rng.random::<f64>() < corruption_rate {
                let k = state.no_of_packet_corruptions.sample_int();
                for _ in 0..k {
                    corrupt_one_bit(&mut packet.payload, &mut self.rng);
                }
            }

            match self.socket.send_to(&packet.payload, packet.forward_to) {
                Ok(_) => {
                    self.send_bag.pop();
                    did_work = true;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::error!(error = %e, "send_to failed");
                    return Err(ProxyError::Socket(e));
                }
            }
        }
        Ok(did_work)
    }

    /// Phase B — drain the kernel receive queue into the receive-bag.
    fn drain_receive_queue(&mut self) -> Result<bool> {
        let mut did_work = false;
        let mut buf = vec![0u8; self.mtu];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((len, src)) => {
                    self.started = true;
                    self.peers.learn(src);
                    if let Some(forward_to) = self.peers.forward_for(src) {
                        self.receive_bag
                            .push(Packet::new(buf[..len].to_vec(), forward_to));
                    }
                    did_work = true;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::error!(error = %e, "recv_from failed");
                    return Err(ProxyError::Socket(e));
                }
            }
        }
        Ok(did_work)
    }

    /// Phase C — random-index drain of the receive-bag into the latency
    /// queue, subject to the loss draw (spec §4.4, §9 "random-pick-and-pop-last").
    fn admit_to_latency_queue(&mut self, state: &ImpairmentState) -> bool {
        let mut did_work = false;
        while !self.receive_bag.is_empty() {
            let idx = self.rng.random_range(0..self.receive_bag.len());
            let mut packet = self.receive_bag.swap_remove(idx);
            did_work = true;

            let loss_rate = state.clamped_loss_rate();
            if self.rng.random::<f64>() < loss_rate {
                continue;
            }

            packet.send_time = Some(Instant::now() + secs(state.latency));
            self.latency_queue.push_front(packet);
        }
        did_work
    }

    /// Phase D — serialize exactly one packet at a time through the virtual
    /// link, whose service time is proportional to payload size and
    /// inversely proportional to bandwidth (spec §4.4).
    fn serialize_through_link(&mut self, state: &ImpairmentState) -> bool {
        let now = Instant::now();

        if let Some(packet) = &self.on_deck {
            if packet.send_time.is_none_or(|t| now >= t) {
                let packet = self.on_deck.take().unwrap();
                self.send_bag.push(packet);
                return true;
            }
            return false;
        }

        let ready = self
            .latency_queue
            .back()
            .is_some_and(|p| p.send_time.is_none_or(|t| now >= t));
        if !ready {
            return false;
        }

        let mut packet = self.latency_queue.pop_back().unwrap();
        let service_time = if state.bandwidth > 0.0 {
            secs(packet.payload.len() as f64 / state.bandwidth)
        } else {
            Duration::from_secs(u64::MAX / 2)
        };
        packet.send_time = Some(now + service_time);
        self.on_deck = Some(packet);
        true
    }
}

fn secs(s: f64) -> Duration {
    Duration::try_from_secs_f64(s.max(0.0)).unwrap_or(Duration::ZERO)
}

/// Flips one uniformly random bit in a uniformly random byte. A no-op on an
/// empty payload, since there is no byte index to pick (spec §7 "Corruption
/// of zero-length packet", §9 "Zero-length datagrams").
fn corrupt_one_bit(payload: &mut [u8], rng: &mut StdRng) {
    if payload.is_empty() {
        tracing::warn!("corrupted payload of length zero skipped");
        return;
    }
    let i = rng.random_range(0..payload.len());
    let b: u8 = rng.random_range(0..8);
    payload[i] ^= 1u8 << b;
}

/// Opens a bound, non-blocking socket error path as an I/O result for
/// callers that want the raw `std::net` type without the pipeline wrapper
/// (used by integration tests driving a raw peer).
pub fn bind_nonblocking(addr: Address) -> io::Result<UdpSocket> {
    let socket = UdpSocket::bind(addr)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use std::path::Path;

    fn state_with(bandwidth: f64, latency: f64, loss: f64, corruption: f64) -> ImpairmentState {
        let dir = tempfile::tempdir().unwrap();
        // Leak the tempdir path by leaking the TempDir itself so the
        // directory survives for the life of the test's ImpairmentState.
        let path: &'static Path = Box::leak(Box::new(dir.into_path()));
        ImpairmentState::new(
            path,
            Duration::from_secs(3600),
            Provider::constant(bandwidth),
            Provider::constant(latency),
            Provider::constant(loss),
            Provider::constant(corruption),
            Provider::constant(1.0),
        )
        .unwrap()
    }

    #[test]
    fn corrupt_one_bit_is_noop_on_empty_payload() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut payload: Vec<u8> = Vec::new();
        corrupt_one_bit(&mut payload, &mut rng);
        assert!(payload.is_empty());
    }

    #[test]
    fn corrupt_one_bit_flips_exactly_one_bit() {
        let mut rng = StdRng::seed_from_u64(1);
        let original = vec![0u8; 64];
        let mut corrupted = original.clone();
        corrupt_one_bit(&mut corrupted, &mut rng);

        let diff_bits: u32 = original
            .iter()
            .zip(corrupted.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        assert_eq!(diff_bits, 1);
    }

    #[test]
    fn identity_link_delivers_every_payload_unchanged() {
        let listen: Address = "127.0.0.1:0".parse().unwrap();
        let peer: Address = "127.0.0.1:0".parse().unwrap();
        let mut pipeline = Pipeline::new(
            listen,
            PeerTable::with_known_peer(peer),
            StdRng::seed_from_u64(1),
            4096,
        )
        .unwrap();

        let mut state = state_with(1_000_000_000.0, 0.0, 0.0, 0.0);

        // No kernel traffic in this unit test; exercise admission + link
        // serialization directly via a synthetic receive-bag entry.
        let target: Address = "127.0.0.1:9999".parse().unwrap();
        pipeline
            .receive_bag
            .push(Packet::new(b"hello".to_vec(), target));
        pipeline.admit_to_latency_queue(&state);
        assert_eq!(pipeline.latency_queue.len(), 1);

        pipeline.serialize_through_link(&state);
        assert!(pipeline.on_deck.is_some());

        std::thread::sleep(Duration::from_millis(1));
        pipeline.serialize_through_link(&state);
        assert_eq!(pipeline.send_bag.len(), 1);
        assert_eq!(pipeline.send_bag[0].payload, b"hello");

        state.close().unwrap();
    }

    #[test]
    fn loss_of_one_discards_the_packet() {
        let listen: Address = "127.0.0.1:0".parse().unwrap();
        let peer: Address = "127.0.0.1:0".parse().unwrap();
        let mut pipeline = Pipeline::new(
            listen,
            PeerTable::with_known_peer(peer),
            StdRng::seed_from_u64(1),
            4096,
        )
        .unwrap();
        let state = state_with(1_000_000.0, 0.0, 1.0, 0.0);

        let target: Address = "127.0.0.1:9999".parse().unwrap();
        pipeline
            .receive_bag
            .push(Packet::new(b"gone".to_vec(), target));
        pipeline.admit_to_latency_queue(&state);
        assert!(pipeline.latency_queue.is_empty());

        state.close().unwrap();
    }

    #[test]
    fn low_bandwidth_queues_on_deck_without_panicking() {
        let listen: Address = "127.0.0.1:0".parse().unwrap();
        let peer: Address = "127.0.0.1:0".parse().unwrap();
        let mut pipeline = Pipeline::new(
            listen,
            PeerTable::with_known_peer(peer),
            StdRng::seed_from_u64(1),
            4096,
        )
        .unwrap();
        let state = state_with(1.0, 0.0, 0.0, 0.0);

        let target: Address = "127.0.0.1:9999".parse().unwrap();
        pipeline
            .receive_bag
            .push(Packet::new(vec![0u8; 100], target));
        pipeline.admit_to_latency_queue(&state);
        pipeline.serialize_through_link(&state);
        assert!(pipeline.on_deck.is_some());
        // Immediately re-checking should not release it yet at 1 B/s for 100 bytes.
        let released = pipeline.serialize_through_link(&state);
        assert!(!released);

        state.close().unwrap();
    }
}
