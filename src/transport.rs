//! Event loop harness (spec.md §5, supplemented per `SPEC_FULL.md`'s
//! Event loop / transport harness module). A single-threaded, tokio-based
//! loop multiplexing readiness on a tunnel device, a UDP socket, and a
//! per-flow inactivity timer — narrowed from the teacher's full
//! `core.rs`/`main.rs` event loop to this crate's actual external
//! contract (spec.md §6).

use crate::config::Config;
use crate::gf::Field;
use crate::mux::{handle_inbound_datagram, FlowKey, FrameHeader, FrameType, MuxTable};
use crate::telemetry;
use log::{error, info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::time::{Duration, Instant};

/// A local clear-packet source/sink: the "upstream tunnel device" of
/// spec.md §6. The core neither interprets nor validates its contents.
pub trait TunnelDevice: Send {
    fn read_packet(
        &mut self,
        buf: &mut [u8],
    ) -> impl std::future::Future<Output = std::io::Result<usize>> + Send;
    fn write_packet(&mut self, buf: &[u8]) -> impl std::future::Future<Output = std::io::Result<()>> + Send;
}

/// The UDP substrate the core's framed datagrams travel over.
pub trait DatagramSocket: Send {
    fn send_to(
        &self,
        buf: &[u8],
        addr: SocketAddr,
    ) -> impl std::future::Future<Output = std::io::Result<usize>> + Send;
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl std::future::Future<Output = std::io::Result<(usize, SocketAddr)>> + Send;
}

impl DatagramSocket for tokio::net::UdpSocket {
    async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> std::io::Result<usize> {
        tokio::net::UdpSocket::send_to(self, buf, addr).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        tokio::net::UdpSocket::recv_from(self, buf).await
    }
}

/// An in-process loopback tunnel used by integration tests in place of a
/// real TUN/TAP device.
pub struct LoopbackTunnel {
    inbound: tokio::sync::mpsc::Receiver<Vec<u8>>,
    outbound: tokio::sync::mpsc::Sender<Vec<u8>>,
}

impl LoopbackTunnel {
    pub fn pair() -> (LoopbackTunnel, tokio::sync::mpsc::Sender<Vec<u8>>, tokio::sync::mpsc::Receiver<Vec<u8>>) {
        let (tx_in, rx_in) = tokio::sync::mpsc::channel(64);
        let (tx_out, rx_out) = tokio::sync::mpsc::channel(64);
        (
            LoopbackTunnel {
                inbound: rx_in,
                outbound: tx_out,
            },
            tx_in,
            rx_out,
        )
    }
}

impl TunnelDevice for LoopbackTunnel {
    async fn read_packet(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.inbound.recv().await {
            Some(data) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            None => Ok(0),
        }
    }

    async fn write_packet(&mut self, buf: &[u8]) -> std::io::Result<()> {
        let _ = self.outbound.send(buf.to_vec()).await;
        Ok(())
    }
}

/// Inactivity timeout before a flow with no recent activity starts
/// teardown (spec.md §5 "Cancellation and timeouts").
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TransportLoop<T: TunnelDevice, S: DatagramSocket> {
    tunnel: T,
    socket: S,
    field: Field,
    table: MuxTable,
    last_activity: HashMap<FlowKey, Instant>,
}

impl<T: TunnelDevice, S: DatagramSocket> TransportLoop<T, S> {
    pub fn new(tunnel: T, socket: S, config: &Config) -> Self {
        TransportLoop {
            tunnel,
            socket,
            field: Field::new(config.field_polynomial),
            table: MuxTable::new(config.coding_window),
            last_activity: HashMap::new(),
        }
    }

    /// Runs one iteration: races the tunnel, the socket, and a fixed
    /// sweep tick, processing whichever becomes ready first to
    /// completion (spec.md §5: "each event is processed to completion
    /// before the next").
    pub async fn run_once(&mut self, local_tunnel_buf: &mut [u8], local_udp_buf: &mut [u8]) -> std::io::Result<()> {
        tokio::select! {
            read = self.tunnel.read_packet(local_tunnel_buf) => {
                let n = read?;
                if n > 0 {
                    self.on_clear_packet(&local_tunnel_buf[..n]).await;
                }
            }
            recv = self.socket.recv_from(local_udp_buf) => {
                let (n, src) = recv?;
                if n > 0 {
                    self.on_datagram(&local_udp_buf[..n], src).await;
                }
            }
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                self.sweep_inactive_flows().await;
            }
        }
        Ok(())
    }

    /// Handles a clear packet arriving from the tunnel device. The actual
    /// coding work is `Flow::on_clear_packet`; this harness has no way to
    /// learn which flow a bare tunnel buffer belongs to (spec.md's tunnel
    /// device contract carries no addressing), so routing to the right
    /// flow is left to the enclosing binary, which knows its own
    /// five-tuple assignment policy.
    async fn on_clear_packet(&mut self, _buf: &[u8]) {
        warn!("on_clear_packet requires flow routing context from the enclosing binary");
    }

    /// Handles an inbound framed datagram: parses the header, routes into
    /// the flow's decoder, and writes any newly-decoded clear packets to
    /// the tunnel device.
    async fn on_datagram(&mut self, buf: &[u8], src: SocketAddr) {
        let udp_remote = match src.ip() {
            std::net::IpAddr::V4(v4) => (u32::from(v4), src.port()),
            std::net::IpAddr::V6(_) => {
                warn!("IPv6 remotes are not representable in the four-byte remote_ip header field");
                return;
            }
        };

        match handle_inbound_datagram(&mut self.table, &self.field, buf, udp_remote) {
            Ok(clear) => {
                if let Ok((header, _)) = FrameHeader::parse(buf) {
                    let key = FlowKey {
                        sport: header.sport,
                        dport: header.dport,
                        remote_ip: header.remote_ip,
                        random_id: header.random_id,
                    };
                    self.last_activity.insert(key, Instant::now());
                    if header.frame_type == FrameType::Close {
                        if self.table.get_mux(&key).is_none() {
                            self.last_activity.remove(&key);
                        }
                    }
                }
                for (_, packet) in clear {
                    telemetry::DECODED_PACKETS.inc();
                    if let Err(e) = self.tunnel.write_packet(&packet.payload).await {
                        error!("failed writing decoded packet to tunnel: {e}");
                    }
                }
            }
            Err(e) => {
                warn!("discarding inbound datagram: {e}");
                telemetry::MALFORMED_HEADER.inc();
            }
        }
        telemetry::ACTIVE_FLOWS.set(self.table.len() as i64);
    }

    /// Tears down flows that have seen no traffic within
    /// `INACTIVITY_TIMEOUT`.
    async fn sweep_inactive_flows(&mut self) {
        let now = Instant::now();
        let expired: Vec<FlowKey> = self
            .last_activity
            .iter()
            .filter(|(_, &seen)| now.duration_since(seen) > INACTIVITY_TIMEOUT)
            .map(|(k, _)| *k)
            .collect();
        for key in expired {
            if self.table.get_mux(&key).is_some() {
                info!("tearing down inactive flow {:?}", key);
                self.table.remove_mux(&key);
                telemetry::FLOW_TEARDOWNS.inc();
            }
            self.last_activity.remove(&key);
        }
        telemetry::ACTIVE_FLOWS.set(self.table.len() as i64);
    }
}
