//! RLNC flow-multiplexed transport core: GF(2^8) arithmetic, a sliding
//! coding window encoder, an incremental-RREF decoder pool, and flow
//! multiplexing/framing, wired to a minimal tokio event loop harness.

pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod gf;
pub mod matrix;
pub mod mux;
pub mod packet;
pub mod telemetry;
pub mod transport;
