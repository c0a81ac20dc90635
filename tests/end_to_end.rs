//! Whole-protocol scenarios: both endpoints against ideal, faulty and UDP transports.

use async_trait::async_trait;
use rand::Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time;

use qdp::{
    Consumer, InMemoryTransport, MissedFrameListener, Producer, QdpConfig, ReliableQueue,
    Transport, UdpTransport,
};

/// Wraps the in-memory transport and misbehaves on both send paths: each datagram is
///  independently lost, duplicated (a copy is held back and re-sent later) or delayed
///  (held back until the next send flushes it) with the configured probabilities.
///  Receives pass through.
struct FaultyTransport {
    inner: InMemoryTransport,
    loss: f64,
    duplicate: f64,
    delay: f64,
    held_data: Mutex<Option<Vec<u8>>>,
    held_acks: Mutex<Option<Vec<u8>>>,
}

impl FaultyTransport {
    fn new(loss: f64, duplicate: f64, delay: f64) -> FaultyTransport {
        FaultyTransport {
            inner: InMemoryTransport::new(),
            loss,
            duplicate,
            delay,
            held_data: Mutex::new(None),
            held_acks: Mutex::new(None),
        }
    }

    /// decides the fate of one datagram; returns what actually goes on the wire now
    fn schedule(&self, held: &Mutex<Option<Vec<u8>>>, datagram: &[u8]) -> Vec<Vec<u8>> {
        let roll: f64 = rand::thread_rng().gen();
        let mut to_send = Vec::new();

        if roll < self.duplicate {
            // send now, and hold a copy that a later send will flush as a duplicate
            if let Some(flushed) = held.lock().unwrap().replace(datagram.to_vec()) {
                to_send.push(flushed);
            }
            to_send.push(datagram.to_vec());
        }
        else if roll < self.duplicate + self.delay {
            // hold this one back; whatever was held before goes out now (reordering)
            if let Some(flushed) = held.lock().unwrap().replace(datagram.to_vec()) {
                to_send.push(flushed);
            }
        }
        else if roll < self.duplicate + self.delay + self.loss {
            // dropped on the floor
        }
        else {
            to_send.push(datagram.to_vec());
        }

        to_send
    }
}

#[async_trait]
impl Transport for FaultyTransport {
    async fn producer_send(&self, datagram: &[u8]) {
        for datagram in self.schedule(&self.held_data, datagram) {
            self.inner.producer_send(&datagram).await;
        }
    }

    async fn producer_recv(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.inner.producer_recv(timeout).await
    }

    async fn consumer_send(&self, datagram: &[u8]) {
        for datagram in self.schedule(&self.held_acks, datagram) {
            self.inner.consumer_send(&datagram).await;
        }
    }

    async fn consumer_recv(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.inner.consumer_recv(timeout).await
    }
}

struct CollectingListener {
    skipped: Mutex<Vec<u16>>,
}

impl CollectingListener {
    fn new() -> CollectingListener {
        CollectingListener {
            skipped: Mutex::new(Vec::new()),
        }
    }
}

impl MissedFrameListener for CollectingListener {
    fn on_missed_frame(&self, seq_no: u16) {
        self.skipped.lock().unwrap().push(seq_no);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ideal_transport_delivers_everything_in_order() {
    let transport = Arc::new(InMemoryTransport::new());
    let mut queue: ReliableQueue<i32> =
        ReliableQueue::new(transport.clone(), Arc::new(QdpConfig::default())).unwrap();

    for value in 0..200 {
        queue.enqueue(value);
    }
    for expected in 0..200 {
        assert_eq!(queue.dequeue().await, expected);
    }

    // everything acknowledged: the pending window drains and retransmission stops
    time::sleep(Duration::from_millis(400)).await;
    assert_eq!(transport.data_in_flight(), 0);
    assert_eq!(queue.size(), 0);

    queue.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lossy_duplicating_reordering_transport() {
    let transport = Arc::new(FaultyTransport::new(1.0 / 6.0, 1.0 / 6.0, 1.0 / 6.0));
    let listener = Arc::new(CollectingListener::new());
    let mut queue: ReliableQueue<i32> = ReliableQueue::with_missed_frame_listener(
        transport,
        Arc::new(QdpConfig::default()),
        Some(listener.clone()),
    )
    .unwrap();

    const COUNT: i32 = 200;
    for value in 0..COUNT {
        queue.enqueue(value);
    }

    let mut delivered = Vec::new();
    loop {
        match time::timeout(Duration::from_secs(3), queue.dequeue()).await {
            Ok(value) => delivered.push(value),
            Err(_elapsed) => break, // quiet for a while: the stream has drained
        }
    }

    // in order, at most once
    assert!(delivered.windows(2).all(|pair| pair[0] < pair[1]));

    // every record was either delivered or announced as skipped - sequence number S
    //  carries value S - 1
    let skipped = listener.skipped.lock().unwrap();
    let mut accounted: Vec<i32> = delivered.clone();
    accounted.extend(skipped.iter().map(|&seq_no| seq_no as i32 - 1));
    accounted.sort();
    assert_eq!(accounted, (0..COUNT).collect::<Vec<_>>());

    queue.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_udp_loopback_round_trip() {
    let transport = Arc::new(UdpTransport::loopback(0).await.unwrap());
    let mut queue: ReliableQueue<i32> =
        ReliableQueue::new(transport, Arc::new(QdpConfig::default())).unwrap();

    for value in 0..50 {
        queue.enqueue(value);
    }
    for expected in 0..50 {
        let value = time::timeout(Duration::from_secs(10), queue.dequeue())
            .await
            .expect("delivery stalled");
        assert_eq!(value, expected);
    }

    queue.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_udp_split_endpoints() {
    let consumer_transport = Arc::new(UdpTransport::consumer(0).await.unwrap());
    let listen_addr = consumer_transport.listen_addr().unwrap();
    let producer_transport = Arc::new(UdpTransport::producer(listen_addr).await.unwrap());

    let config = Arc::new(QdpConfig::default());
    let mut consumer: Consumer<i32> =
        Consumer::new(consumer_transport, config.clone(), None).unwrap();
    let mut producer: Producer<i32> = Producer::new(producer_transport, config).unwrap();

    for value in 0..50 {
        producer.enqueue(value);
    }
    for expected in 0..50 {
        let value = time::timeout(Duration::from_secs(10), consumer.dequeue())
            .await
            .expect("delivery stalled");
        assert_eq!(value, expected);
    }

    consumer.stop().await;
    producer.stop().await;
}
