use std::sync::Arc;

use crate::config::QdpConfig;
use crate::consumer::{Consumer, MissedFrameListener};
use crate::producer::Producer;
use crate::record::Record;
use crate::transport::Transport;

/// Both endpoints bundled over one shared transport: enqueue on one side, dequeue on the
///  other, with the reliability protocol in between.
///
/// This is the single-process deployment shape (and what the stress tests drive); split
///  deployments construct a `Producer` and a `Consumer` separately, each with its own
///  side of a transport.
///
/// Not clonable - the endpoints own their worker tasks. Dropping the queue tears the
///  workers down; `stop` does so in an orderly fashion, consumer first.
pub struct ReliableQueue<T: Record> {
    // declaration order matters: dropping tears down the consumer before the producer
    consumer: Consumer<T>,
    producer: Producer<T>,
}

impl<T: Record> ReliableQueue<T> {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<QdpConfig>) -> anyhow::Result<ReliableQueue<T>> {
        Self::with_missed_frame_listener(transport, config, None)
    }

    pub fn with_missed_frame_listener(
        transport: Arc<dyn Transport>,
        config: Arc<QdpConfig>,
        missed_frame_listener: Option<Arc<dyn MissedFrameListener>>,
    ) -> anyhow::Result<ReliableQueue<T>> {
        let consumer = Consumer::new(transport.clone(), config.clone(), missed_frame_listener)?;
        let producer = Producer::new(transport, config)?;

        Ok(ReliableQueue { producer, consumer })
    }

    pub fn enqueue(&self, record: T) {
        self.producer.enqueue(record);
    }

    pub async fn dequeue(&self) -> T {
        self.consumer.dequeue().await
    }

    /// Records on the sending side not yet framed plus records on the receiving side not
    ///  yet taken. Racy by nature - suitable for monitoring, not for synchronization.
    pub fn size(&self) -> usize {
        self.producer.size() + self.consumer.size()
    }

    pub async fn stop(&mut self) {
        self.consumer.stop().await;
        self.producer.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory_transport::InMemoryTransport;
    use std::time::Duration;
    use tokio::time;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_round_trip_through_the_facade() {
        let transport = Arc::new(InMemoryTransport::new());
        let mut queue: ReliableQueue<i32> =
            ReliableQueue::new(transport, Arc::new(QdpConfig::default())).unwrap();

        for value in 0..10 {
            queue.enqueue(value);
        }
        for expected in 0..10 {
            assert_eq!(queue.dequeue().await, expected);
        }

        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.size(), 0);

        queue.stop().await;
    }
}
