use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use std::time::Duration;

/// The one-hop datagram channel between the two endpoints, seen from both sides.
///
/// The `producer_*` operations are what the producer endpoint calls (send data, receive
///  acks); the `consumer_*` operations are the mirror image. Sends are best-effort and
///  non-blocking: implementations log transient failures and swallow them. Receives
///  block up to the given timeout and return `None` on expiry.
///
/// A transport is permitted to lose, duplicate, reorder and delay datagrams arbitrarily.
///  It must preserve datagram boundaries and payload contents when it does deliver, and
///  it never fabricates payloads. The endpoints are written to be correct for any
///  schedule consistent with these properties.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Best-effort delivery of a data datagram towards the consumer peer.
    async fn producer_send(&self, datagram: &[u8]);

    /// Next acknowledgement datagram, or `None` after `timeout`.
    async fn producer_recv(&self, timeout: Duration) -> Option<Vec<u8>>;

    /// Best-effort delivery of an ack datagram towards the producer peer. May be a no-op
    ///  while the consumer has not yet learned the producer's return address.
    async fn consumer_send(&self, datagram: &[u8]);

    /// Next data datagram, or `None` after `timeout`.
    async fn consumer_recv(&self, timeout: Duration) -> Option<Vec<u8>>;
}
