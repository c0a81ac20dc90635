use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::RwLock;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time;
use tracing::{debug, error, info, trace, warn};

use crate::transport::Transport;

/// Default port the consumer side listens on.
pub const DEFAULT_PORT: u16 = 31415;

/// Upper bound on a datagram honored by this transport, header included. Anything larger
///  is dropped at the sender rather than truncated at the receiver.
pub const MAX_DATAGRAM_LEN: usize = 512;

/// Datagram-socket transport, typically loopback UDP.
///
/// A process normally holds one role: the producer side is constructed with the
///  consumer's address, the consumer side with a listening port. `loopback` sets up both
///  roles in a single process, which is how the demo and the end-to-end tests run.
///
/// The consumer does not know the producer's address up front - it learns the return
///  address from the first data datagram it receives and sends acks there from then on.
///  Acks before that point are dropped, which is fine: the producer retransmits.
pub struct UdpTransport {
    producer_socket: Option<UdpSocket>,
    consumer_socket: Option<UdpSocket>,
    consumer_addr: Option<SocketAddr>,
    producer_addr: RwLock<Option<SocketAddr>>,
}

impl UdpTransport {
    /// Producer-side transport sending data towards `consumer_addr`.
    pub async fn producer(consumer_addr: SocketAddr) -> anyhow::Result<UdpTransport> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        info!("bound producer socket to {:?}", socket.local_addr()?);

        Ok(UdpTransport {
            producer_socket: Some(socket),
            consumer_socket: None,
            consumer_addr: Some(consumer_addr),
            producer_addr: RwLock::new(None),
        })
    }

    /// Consumer-side transport listening on `listen_port` (loopback).
    pub async fn consumer(listen_port: u16) -> anyhow::Result<UdpTransport> {
        let socket = UdpSocket::bind(("127.0.0.1", listen_port)).await?;
        info!("bound consumer socket to {:?}", socket.local_addr()?);

        Ok(UdpTransport {
            producer_socket: None,
            consumer_socket: Some(socket),
            consumer_addr: None,
            producer_addr: RwLock::new(None),
        })
    }

    /// Both roles in one process, wired across loopback on `port`.
    pub async fn loopback(port: u16) -> anyhow::Result<UdpTransport> {
        let consumer_socket = UdpSocket::bind(("127.0.0.1", port)).await?;
        let producer_socket = UdpSocket::bind("127.0.0.1:0").await?;
        info!(
            "bound loopback pair: producer {:?}, consumer {:?}",
            producer_socket.local_addr()?,
            consumer_socket.local_addr()?
        );

        Ok(UdpTransport {
            producer_socket: Some(producer_socket),
            consumer_addr: Some(consumer_socket.local_addr()?),
            consumer_socket: Some(consumer_socket),
            producer_addr: RwLock::new(None),
        })
    }

    /// The address the consumer side listens on, if this transport has that role.
    ///  Useful when binding to an ephemeral port.
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        self.consumer_socket
            .as_ref()
            .map(|socket| socket.local_addr().expect("UdpSocket should have an initialized local addr"))
    }

    async fn do_send(socket: &UdpSocket, to: SocketAddr, datagram: &[u8]) {
        if datagram.len() > MAX_DATAGRAM_LEN {
            warn!(
                "datagram of {} bytes exceeds the transport maximum of {} - dropping",
                datagram.len(),
                MAX_DATAGRAM_LEN
            );
            return;
        }

        trace!("sending {} bytes to {:?}", datagram.len(), to);
        if let Err(e) = socket.send_to(datagram, to).await {
            error!("error sending UDP datagram to {:?}: {}", to, e);
        }
    }

    async fn do_recv(socket: &UdpSocket, timeout: Duration) -> Option<(Vec<u8>, SocketAddr)> {
        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        match time::timeout(timeout, socket.recv_from(&mut buf)).await {
            Err(_elapsed) => None,
            Ok(Err(e)) => {
                error!("socket error: {}", e);
                None
            }
            Ok(Ok((num_read, from))) => Some((buf[..num_read].to_vec(), from)),
        }
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn producer_send(&self, datagram: &[u8]) {
        let (Some(socket), Some(to)) = (&self.producer_socket, self.consumer_addr) else {
            warn!("transport has no producer role - dropping data datagram");
            return;
        };
        Self::do_send(socket, to, datagram).await;
    }

    async fn producer_recv(&self, timeout: Duration) -> Option<Vec<u8>> {
        let Some(socket) = &self.producer_socket else {
            warn!("transport has no producer role - nothing to receive");
            return None;
        };
        Self::do_recv(socket, timeout).await.map(|(datagram, _)| datagram)
    }

    async fn consumer_send(&self, datagram: &[u8]) {
        let Some(socket) = &self.consumer_socket else {
            warn!("transport has no consumer role - dropping ack datagram");
            return;
        };
        let Some(to) = *self.producer_addr.read().unwrap() else {
            trace!("producer address not yet known - dropping ack");
            return;
        };
        Self::do_send(socket, to, datagram).await;
    }

    async fn consumer_recv(&self, timeout: Duration) -> Option<Vec<u8>> {
        let Some(socket) = &self.consumer_socket else {
            warn!("transport has no consumer role - nothing to receive");
            return None;
        };

        let (datagram, from) = Self::do_recv(socket, timeout).await?;

        let mut producer_addr = self.producer_addr.write().unwrap();
        if *producer_addr != Some(from) {
            debug!("learned producer return address {:?}", from);
            *producer_addr = Some(from);
        }

        Some(datagram)
    }
}
