//! Flow multiplexing and wire framing (spec.md §4.5). Every datagram
//! carries a fixed 11-byte big-endian header identifying which logical
//! flow it belongs to and what kind of payload follows.

use crate::decoder::DecoderPool;
use crate::encoder::Encoder;
use crate::error::TransportError;
use log::{debug, warn};
use std::collections::HashMap;

pub const HEADER_LEN: usize = 11;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameType {
    Data = 0x00,
    Ack = 0x01,
    Close = 0x02,
    CloseAwaiting = 0x03,
    Empty = 0x05,
}

impl FrameType {
    fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(FrameType::Data),
            0x01 => Some(FrameType::Ack),
            0x02 => Some(FrameType::Close),
            0x03 => Some(FrameType::CloseAwaiting),
            0x05 => Some(FrameType::Empty),
            _ => None,
        }
    }
}

/// The fixed 11-byte header. `remote_ip` travels as a raw big-endian u32;
/// the core never interprets it beyond flow identification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    pub sport: u16,
    pub dport: u16,
    pub remote_ip: u32,
    pub frame_type: FrameType,
    pub random_id: u16,
}

impl FrameHeader {
    pub fn to_bytes(&self, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        out.extend_from_slice(&self.sport.to_be_bytes());
        out.extend_from_slice(&self.dport.to_be_bytes());
        out.extend_from_slice(&self.remote_ip.to_be_bytes());
        out.push(self.frame_type as u8);
        out.extend_from_slice(&self.random_id.to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    /// Splits a raw datagram into its header and body. Rejects datagrams
    /// shorter than the header or carrying an unassigned frame type
    /// (`0x04`).
    pub fn parse(buf: &[u8]) -> Result<(FrameHeader, &[u8]), TransportError> {
        if buf.len() < HEADER_LEN {
            return Err(TransportError::MalformedHeader(format!(
                "datagram of {} bytes shorter than {}-byte header",
                buf.len(),
                HEADER_LEN
            )));
        }
        let sport = u16::from_be_bytes([buf[0], buf[1]]);
        let dport = u16::from_be_bytes([buf[2], buf[3]]);
        let remote_ip = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let frame_type = FrameType::from_u8(buf[8])
            .ok_or_else(|| TransportError::MalformedHeader(format!("unknown frame type {:#x}", buf[8])))?;
        let random_id = u16::from_be_bytes([buf[9], buf[10]]);
        Ok((
            FrameHeader {
                sport,
                dport,
                remote_ip,
                frame_type,
                random_id,
            },
            &buf[HEADER_LEN..],
        ))
    }
}

/// The wire-visible identity of a flow: TCP-side five-tuple fields plus
/// the nonce that disambiguates concurrent flows over the same tuple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub sport: u16,
    pub dport: u16,
    pub remote_ip: u32,
    pub random_id: u16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowState {
    Init,
    OpenedSimplex,
    OpenedDuplex,
    CloseAwaiting,
}

pub struct Flow {
    pub state: FlowState,
    pub udp_remote: (u32, u16),
    pub encoder: Encoder,
    pub decoder: DecoderPool,
    outbound_data_seen: bool,
    inbound_data_seen: bool,
}

impl Flow {
    fn new(udp_remote: (u32, u16), coding_window: usize) -> Self {
        Flow {
            state: FlowState::Init,
            udp_remote,
            encoder: Encoder::new(coding_window),
            decoder: DecoderPool::new(coding_window),
            outbound_data_seen: false,
            inbound_data_seen: false,
        }
    }

    fn recompute_open_state(&mut self) {
        match self.state {
            FlowState::Init => self.state = FlowState::OpenedSimplex,
            FlowState::OpenedSimplex => {
                if self.outbound_data_seen && self.inbound_data_seen {
                    self.state = FlowState::OpenedDuplex;
                }
            }
            FlowState::OpenedDuplex | FlowState::CloseAwaiting => {}
        }
    }

    /// Handles a clear packet arriving from the upstream tunnel: ingests
    /// it into the sliding window, then draws `ceil(ratio)` freshly coded
    /// packets to send (spec.md §6's `ENCODED_PER_SOURCE_RATIO`). This is
    /// `SPEC_FULL.md`'s resolution of the undefined `handleInClear`
    /// contract.
    pub fn on_clear_packet(
        &mut self,
        clear: crate::packet::ClearPacket,
        field: &crate::gf::Field,
        ratio: f32,
        rng: &mut impl rand::RngCore,
    ) -> Result<Vec<crate::packet::EncodedPacket>, TransportError> {
        self.note_outbound_data()?;
        self.encoder.ingest_clear_packet(clear);
        let count = ratio.ceil().max(1.0) as usize;
        Ok((0..count).filter_map(|_| self.encoder.encode(field, rng)).collect())
    }

    /// Call when a `DATA` datagram is about to be sent on this flow.
    pub fn note_outbound_data(&mut self) -> Result<(), TransportError> {
        if self.state == FlowState::CloseAwaiting {
            return Err(TransportError::StateViolation(
                "cannot send DATA while CLOSE_AWAITING".into(),
            ));
        }
        self.outbound_data_seen = true;
        self.recompute_open_state();
        Ok(())
    }

    /// Call when a `DATA` datagram arrives on this flow. Per scenario 6,
    /// `DATA` received during `CLOSE_AWAITING` is a state violation: the
    /// caller discards the message and must not retry this call.
    pub fn note_inbound_data(&mut self) -> Result<(), TransportError> {
        if self.state == FlowState::CloseAwaiting {
            return Err(TransportError::StateViolation(
                "DATA received on a CLOSE_AWAITING flow".into(),
            ));
        }
        self.inbound_data_seen = true;
        self.recompute_open_state();
        Ok(())
    }

    /// Call when sending `CLOSE`. Any opened state may transition to
    /// `CLOSE_AWAITING`; closing an unopened or already-closing flow is a
    /// state violation.
    pub fn note_close_sent(&mut self) -> Result<(), TransportError> {
        match self.state {
            FlowState::OpenedSimplex | FlowState::OpenedDuplex => {
                self.state = FlowState::CloseAwaiting;
                Ok(())
            }
            FlowState::Init => Err(TransportError::StateViolation(
                "cannot send CLOSE on an unopened flow".into(),
            )),
            FlowState::CloseAwaiting => Err(TransportError::StateViolation(
                "flow is already CLOSE_AWAITING".into(),
            )),
        }
    }
}

/// Owns every live flow. Mirrors spec.md's single-threaded event-loop
/// model: all mutation happens on the loop thread, one table, no
/// internal locking.
pub struct MuxTable {
    flows: HashMap<FlowKey, Flow>,
    coding_window: usize,
}

impl MuxTable {
    pub fn new(coding_window: usize) -> Self {
        MuxTable {
            flows: HashMap::new(),
            coding_window,
        }
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Returns the existing flow for `key`, or allocates a fresh one with
    /// a newly initialized encoder and decoder.
    pub fn assign_mux(&mut self, key: FlowKey, udp_remote: (u32, u16)) -> &mut Flow {
        self.flows.entry(key).or_insert_with(|| {
            debug!("assigning fresh flow for {:?}", key);
            Flow::new(udp_remote, self.coding_window)
        })
    }

    pub fn get_mux(&self, key: &FlowKey) -> Option<&Flow> {
        self.flows.get(key)
    }

    pub fn get_mux_mut(&mut self, key: &FlowKey) -> Option<&mut Flow> {
        self.flows.get_mut(key)
    }

    /// Closes and removes the flow for `key`. Double-remove (removing a
    /// key with no flow) is a programming error, not a recoverable
    /// condition, matching spec.md §4.5.
    pub fn remove_mux(&mut self, key: &FlowKey) {
        match self.flows.remove(key) {
            Some(_) => debug!("removed flow {:?}", key),
            None => panic!("double-remove of mux {:?}", key),
        }
    }
}

/// Drains a single inbound datagram against the table, routing `DATA`
/// into the flow's decoder pool and discarding anything state-illegal.
/// Returns the newly decoded clear packets, if any.
pub fn handle_inbound_datagram(
    table: &mut MuxTable,
    field: &crate::gf::Field,
    buf: &[u8],
    udp_remote: (u32, u16),
) -> Result<Vec<(usize, crate::packet::ClearPacket)>, TransportError> {
    let (header, body) = FrameHeader::parse(buf)?;
    let key = FlowKey {
        sport: header.sport,
        dport: header.dport,
        remote_ip: header.remote_ip,
        random_id: header.random_id,
    };

    match header.frame_type {
        FrameType::Data => {
            let flow = table.assign_mux(key, udp_remote);
            if flow.note_inbound_data().is_err() {
                warn!("discarding DATA on state-illegal flow {:?}", key);
                return Ok(Vec::new());
            }
            let pkt = crate::packet::EncodedPacket::from_bytes(body, 0)
                .ok_or_else(|| TransportError::MalformedHeader("truncated DATA body".into()))?;
            flow.decoder.add_if_innovative(field, pkt)?;
            Ok(flow.decoder.extract_packets(field))
        }
        FrameType::Close => {
            if let Some(flow) = table.get_mux_mut(&key) {
                if flow.state == FlowState::CloseAwaiting {
                    table.remove_mux(&key);
                } else {
                    let _ = flow.note_close_sent();
                }
            }
            Ok(Vec::new())
        }
        FrameType::CloseAwaiting | FrameType::Ack | FrameType::Empty => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip_scenario() {
        let header = FrameHeader {
            sport: 0x1234,
            dport: 0x5678,
            remote_ip: 0x0A000001,
            frame_type: FrameType::Data,
            random_id: 0xBEEF,
        };
        let body = [0xAA, 0xBB];
        let framed = header.to_bytes(&body);
        assert_eq!(framed.len(), 13);
        assert_eq!(hex::encode(&framed[0..11]), "123456780a00000100beef");

        let (parsed, parsed_body) = FrameHeader::parse(&framed).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed_body, &body);
    }

    #[test]
    fn on_clear_packet_draws_ceil_ratio_encoded_packets() {
        use crate::gf::field;
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let f = field();
        let mut rng = StdRng::seed_from_u64(3);
        let mut table = MuxTable::new(4);
        let key = FlowKey {
            sport: 1,
            dport: 2,
            remote_ip: 3,
            random_id: 4,
        };
        let flow = table.assign_mux(key, (0, 0));
        let coded = flow
            .on_clear_packet(crate::packet::ClearPacket::new(vec![1, 2]), f, 2.4, &mut rng)
            .unwrap();
        assert_eq!(coded.len(), 3); // ceil(2.4) == 3
        assert_eq!(flow.state, FlowState::OpenedSimplex);
    }

    #[test]
    fn rejects_short_datagram_and_unassigned_type() {
        assert!(FrameHeader::parse(&[0; 5]).is_err());

        let mut buf = vec![0u8; 11];
        buf[8] = 0x04;
        assert!(FrameHeader::parse(&buf).is_err());
    }

    #[test]
    fn flow_assignment_scenario() {
        let mut table = MuxTable::new(4);
        let key = FlowKey {
            sport: 1,
            dport: 2,
            remote_ip: 3,
            random_id: 42,
        };
        table.assign_mux(key, (9, 9));
        assert_eq!(table.len(), 1);
        table.assign_mux(key, (9, 9));
        assert_eq!(table.len(), 1);

        let other = FlowKey { random_id: 43, ..key };
        table.assign_mux(other, (9, 9));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn close_teardown_scenario() {
        let mut table = MuxTable::new(4);
        let key = FlowKey {
            sport: 1,
            dport: 2,
            remote_ip: 3,
            random_id: 42,
        };
        {
            let flow = table.assign_mux(key, (9, 9));
            flow.note_outbound_data().unwrap();
            flow.note_close_sent().unwrap();
            assert_eq!(flow.state, FlowState::CloseAwaiting);
        }

        let flow = table.get_mux_mut(&key).unwrap();
        let before = flow.decoder.n_packets();
        assert!(flow.note_inbound_data().is_err());
        assert_eq!(flow.decoder.n_packets(), before);
        assert_eq!(flow.state, FlowState::CloseAwaiting);
    }

    #[test]
    fn duplex_transition_needs_both_directions() {
        let mut table = MuxTable::new(4);
        let key = FlowKey {
            sport: 1,
            dport: 2,
            remote_ip: 3,
            random_id: 42,
        };
        let flow = table.assign_mux(key, (9, 9));
        flow.note_outbound_data().unwrap();
        assert_eq!(flow.state, FlowState::OpenedSimplex);
        flow.note_inbound_data().unwrap();
        assert_eq!(flow.state, FlowState::OpenedDuplex);
    }

    #[test]
    fn double_remove_panics() {
        let mut table = MuxTable::new(4);
        let key = FlowKey {
            sport: 1,
            dport: 2,
            remote_ip: 3,
            random_id: 42,
        };
        table.assign_mux(key, (9, 9));
        table.remove_mux(&key);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            table.remove_mux(&key);
        }));
        assert!(result.is_err());
    }
}
