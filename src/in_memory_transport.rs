use async_trait::async_trait;
use std::time::Duration;

use crate::blocking_queue::BlockingQueue;
use crate::transport::Transport;

/// In-process transport: one queue per direction, lossless and in-order.
///
/// This is the transport for tests and for wiring a producer and consumer together
///  inside a single process. Tests also drive it directly - injecting raw datagrams on
///  the data path and draining the ack path - which is why the in-flight counts are
///  exposed.
pub struct InMemoryTransport {
    data: BlockingQueue<Vec<u8>>,
    acks: BlockingQueue<Vec<u8>>,
}

impl InMemoryTransport {
    pub fn new() -> InMemoryTransport {
        InMemoryTransport {
            data: BlockingQueue::new(),
            acks: BlockingQueue::new(),
        }
    }

    /// Number of data datagrams sent by the producer side and not yet received.
    pub fn data_in_flight(&self) -> usize {
        self.data.len()
    }

    /// Number of ack datagrams sent by the consumer side and not yet received.
    pub fn acks_in_flight(&self) -> usize {
        self.acks.len()
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn producer_send(&self, datagram: &[u8]) {
        self.data.enqueue(datagram.to_vec());
    }

    async fn producer_recv(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.acks.dequeue_timeout(timeout).await
    }

    async fn consumer_send(&self, datagram: &[u8]) {
        self.acks.enqueue(datagram.to_vec());
    }

    async fn consumer_recv(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.data.dequeue_timeout(timeout).await
    }
}
