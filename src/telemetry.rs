//! Telemetry metrics for the coding engine and mux.
//!
//! Exported metrics:
//! - `encoded_packets_total`: packets emitted by `Encoder::encode`.
//! - `decoded_packets_total`: clear packets delivered by `extract_packets`.
//! - `non_innovative_total`: encoded packets rejected as non-innovative.
//! - `malformed_header_total`: datagrams discarded for a bad framing header.
//! - `active_flows`: current `MuxTable` size.
//! - `flow_teardowns_total`: flows removed via `remove_mux`.

use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_gauge, Encoder as PromEncoder, IntCounter, IntGauge, TextEncoder};

lazy_static! {
    pub static ref ENCODED_PACKETS: IntCounter =
        register_int_counter!("encoded_packets_total", "Total encoded packets emitted").unwrap();
    pub static ref DECODED_PACKETS: IntCounter =
        register_int_counter!("decoded_packets_total", "Total clear packets delivered").unwrap();
    pub static ref NON_INNOVATIVE: IntCounter = register_int_counter!(
        "non_innovative_total",
        "Encoded packets rejected as non-innovative"
    )
    .unwrap();
    pub static ref MALFORMED_HEADER: IntCounter = register_int_counter!(
        "malformed_header_total",
        "Datagrams discarded for a bad framing header"
    )
    .unwrap();
    pub static ref ACTIVE_FLOWS: IntGauge =
        register_int_gauge!("active_flows", "Number of live flows in the mux table").unwrap();
    pub static ref FLOW_TEARDOWNS: IntCounter =
        register_int_counter!("flow_teardowns_total", "Flows removed via remove_mux").unwrap();
}

pub fn serve(addr: &str) {
    use std::io::Write;
    use std::net::TcpListener;
    let listener = TcpListener::bind(addr).expect("bind metrics listener");
    std::thread::spawn(move || {
        let encoder = TextEncoder::new();
        for stream in listener.incoming() {
            if let Ok(mut s) = stream {
                let metrics = prometheus::gather();
                let mut buf = Vec::new();
                encoder.encode(&metrics, &mut buf).unwrap();
                let _ = s.write_all(&buf);
            }
        }
    });
}

pub fn flush() {
    let encoder = TextEncoder::new();
    let metrics = prometheus::gather();
    let mut buf = Vec::new();
    if encoder.encode(&metrics, &mut buf).is_ok() {
        log::info!("\n{}", String::from_utf8_lossy(&buf));
    }
}
