//! Clear and encoded packet types. A clear packet is an un-coded source
//! packet; an encoded packet carries a coefficient vector plus the
//! corresponding field-linear combination of payloads.

/// An owned byte buffer of a fixed flow width. Equal-width for all
/// packets of one flow (`PACKET_LENGTH`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClearPacket {
    pub payload: Vec<u8>,
}

impl ClearPacket {
    pub fn new(payload: Vec<u8>) -> Self {
        ClearPacket { payload }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// A coefficient vector over GF(2^8) plus the payload it linearly
/// combines. `base_offset` is the absolute index of the encoder window's
/// earliest slot at encode time, so a receiver can align its own
/// coefficient indexing (spec.md §4.3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedPacket {
    pub coeffs: Vec<u8>,
    pub payload: Vec<u8>,
    pub base_offset: u64,
}

impl EncodedPacket {
    pub fn new(coeffs: Vec<u8>, payload: Vec<u8>, base_offset: u64) -> Self {
        EncodedPacket {
            coeffs,
            payload,
            base_offset,
        }
    }

    pub fn num_coeffs(&self) -> usize {
        self.coeffs.len()
    }

    /// Serializes as `<coeff_len: u16 be><coeffs><payload>`, the body
    /// format carried after the flow framing header for `DATA` datagrams.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.coeffs.len() + self.payload.len());
        out.extend_from_slice(&(self.coeffs.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.coeffs);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parses the body produced by [`to_bytes`]. `base_offset` travels in
    /// the flow framing header rather than the body, so it is supplied by
    /// the caller (the mux, after parsing the header).
    pub fn from_bytes(buf: &[u8], base_offset: u64) -> Option<Self> {
        if buf.len() < 2 {
            return None;
        }
        let coeff_len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        if buf.len() < 2 + coeff_len {
            return None;
        }
        let coeffs = buf[2..2 + coeff_len].to_vec();
        let payload = buf[2 + coeff_len..].to_vec();
        Some(EncodedPacket {
            coeffs,
            payload,
            base_offset,
        })
    }
}
