//! Sliding-window RLNC encoder (spec.md §4.3). Maintains the last
//! `CODING_WINDOW` clear packets and emits encoded packets with fresh
//! random coefficient vectors over that window.

use crate::gf::Field;
use crate::packet::{ClearPacket, EncodedPacket};
use log::debug;
use rand::RngCore;
use std::collections::VecDeque;

pub struct Encoder {
    window: VecDeque<ClearPacket>,
    capacity: usize,
    /// Absolute index of `window`'s front element.
    base_offset: u64,
    /// Absolute index the next `ingest_clear_packet` call will assign.
    next_index: u64,
}

impl Encoder {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "coding window must hold at least one packet");
        Encoder {
            window: VecDeque::with_capacity(capacity),
            capacity,
            base_offset: 0,
            next_index: 0,
        }
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Appends `p` to the window; drops the oldest packet once the window
    /// exceeds capacity, advancing `base_offset` by one.
    pub fn ingest_clear_packet(&mut self, p: ClearPacket) {
        self.window.push_back(p);
        self.next_index += 1;
        if self.window.len() > self.capacity {
            self.window.pop_front();
            self.base_offset += 1;
            debug!("encoder window full, dropped oldest packet, base_offset={}", self.base_offset);
        }
    }

    /// Draws random coefficients over the current window and returns the
    /// resulting field-linear combination. The coefficient vector is
    /// always `capacity` wide so a flow's decoder pool can use one fixed
    /// column count per generation: slots beyond the current window fill
    /// (`window.len()..capacity`) have no source packet yet and are left
    /// at zero, which is exactly the right contribution for a packet that
    /// does not exist. Implementations may redraw on an all-zero vector
    /// to avoid wasting a packet, but it is not required for correctness:
    /// the decoder simply rejects it as non-innovative.
    pub fn encode(&self, field: &Field, rng: &mut impl RngCore) -> Option<EncodedPacket> {
        let w = self.window.len();
        if w == 0 {
            return None;
        }
        let mut coeffs = vec![0u8; self.capacity];
        rng.fill_bytes(&mut coeffs[..w]);

        let packet_len = self.window[0].len();
        let mut payload = vec![0u8; packet_len];
        for (coeff, packet) in coeffs.iter().zip(self.window.iter()) {
            if *coeff == 0 {
                continue;
            }
            for (out, &b) in payload.iter_mut().zip(packet.payload.iter()) {
                *out = field.gadd(*out, field.gmul(*coeff, b));
            }
        }

        Some(EncodedPacket::new(coeffs, payload, self.base_offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gf::field;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn window_drops_oldest_and_advances_base_offset() {
        let mut enc = Encoder::new(2);
        enc.ingest_clear_packet(ClearPacket::new(vec![1]));
        enc.ingest_clear_packet(ClearPacket::new(vec![2]));
        assert_eq!(enc.base_offset(), 0);
        enc.ingest_clear_packet(ClearPacket::new(vec![3]));
        assert_eq!(enc.base_offset(), 1);
        assert_eq!(enc.window_len(), 2);
    }

    #[test]
    fn encode_combines_window_payloads() {
        let f = field();
        let mut enc = Encoder::new(4);
        enc.ingest_clear_packet(ClearPacket::new(vec![0x01, 0x02]));
        enc.ingest_clear_packet(ClearPacket::new(vec![0x03, 0x04]));

        let mut rng = StdRng::seed_from_u64(1);
        let pkt = enc.encode(f, &mut rng).unwrap();
        assert_eq!(pkt.num_coeffs(), 4); // full capacity width, not just the 2 admitted so far
        assert_eq!(&pkt.coeffs[2..], &[0, 0]); // not-yet-admitted slots stay zero

        let mut expected = vec![0u8; 2];
        let window = [[0x01u8, 0x02], [0x03, 0x04]];
        for (c, src) in pkt.coeffs.iter().zip(window.iter()) {
            for i in 0..2 {
                expected[i] = f.gadd(expected[i], f.gmul(*c, src[i]));
            }
        }
        assert_eq!(pkt.payload, expected);
    }

    #[test]
    fn encode_on_empty_window_returns_none() {
        let f = field();
        let enc = Encoder::new(4);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(enc.encode(f, &mut rng).is_none());
    }
}
