use rustc_hash::FxHashMap;
#[cfg(test)] use mockall::automock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::blocking_queue::BlockingQueue;
use crate::config::QdpConfig;
use crate::frame::{Frame, FrameId};
use crate::record::Record;
use crate::seq_no::SeqNo;
use crate::transport::Transport;

/// Notified whenever the consumer gives up on a sequence number and delivers past it.
///  Skips are expected operation under loss, not errors.
#[cfg_attr(test, automock)]
pub trait MissedFrameListener: Send + Sync + 'static {
    fn on_missed_frame(&self, seq_no: u16);
}

/// The receiving endpoint of a queue.
///
/// A worker task receives data frames from the transport, drops duplicates and
///  out-of-window arrivals, buffers what arrived ahead of the delivery frontier, and
///  moves the contiguous prefix into the output queue in sequence order. The frontier is
///  acknowledged cumulatively: on every advance, and periodically while idle.
///
/// A sequence number whose frame does not show up while later frames are already
///  buffered is skipped after `skip_timeout` (reported via the listener); any later
///  arrival of it is treated as a duplicate.
pub struct Consumer<T: Record> {
    output: Arc<BlockingQueue<T>>,
    stop_requested: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Record> Consumer<T> {
    pub fn new(
        transport: Arc<dyn Transport>,
        config: Arc<QdpConfig>,
        missed_frame_listener: Option<Arc<dyn MissedFrameListener>>,
    ) -> anyhow::Result<Consumer<T>> {
        config.validate()?;

        let output: Arc<BlockingQueue<T>> = Arc::new(BlockingQueue::new());
        let stop_requested = Arc::new(AtomicBool::new(false));

        let worker = ConsumerWorker {
            transport,
            config,
            output: output.clone(),
            stop_requested: stop_requested.clone(),
            missed_frame_listener,
            frontier: FrameId {
                seq_no: SeqNo::ZERO,
                tx_epoch: 0,
            },
            pending: FxHashMap::default(),
            last_progress: Instant::now(),
            last_ack_sent: Instant::now(),
        };

        Ok(Consumer {
            output,
            stop_requested,
            worker: Some(tokio::spawn(worker.run())),
        })
    }

    /// Waits until a record is available and returns it.
    pub async fn dequeue(&self) -> T {
        self.output.dequeue().await
    }

    /// Number of delivered records not yet taken by the application.
    pub fn size(&self) -> usize {
        self.output.len()
    }

    /// Stops the worker and waits for it. Safe to call more than once.
    pub async fn stop(&mut self) {
        self.stop_requested.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }
}

impl<T: Record> Drop for Consumer<T> {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.abort();
        }
    }
}

/// Worker-task state, owned by the single worker task - no locking.
struct ConsumerWorker<T: Record> {
    transport: Arc<dyn Transport>,
    config: Arc<QdpConfig>,
    output: Arc<BlockingQueue<T>>,
    stop_requested: Arc<AtomicBool>,
    missed_frame_listener: Option<Arc<dyn MissedFrameListener>>,

    /// Id of the last record delivered (or skipped past); the next in-order delivery is
    ///  `frontier.seq_no + 1`. Skipping advances the sequence number but keeps the epoch.
    frontier: FrameId,

    /// Frames accepted ahead of the frontier, keyed by raw sequence number. Every key
    ///  passes the not-a-duplicate test against the current frontier.
    pending: FxHashMap<u16, (FrameId, T)>,

    /// Last instant the frontier moved forward - or, while nothing is buffered, 'now':
    ///  the skip clock only runs while buffered later frames prove that something was
    ///  sent and is overdue. An idle consumer must not drift past sequence numbers that
    ///  were never produced.
    last_progress: Instant,
    last_ack_sent: Instant,
}

impl<T: Record> ConsumerWorker<T> {
    async fn run(mut self) {
        debug!("starting consumer worker");
        self.send_ack().await; // announce the initial frontier

        while !self.stop_requested.load(Ordering::Relaxed) {
            if let Some(datagram) = self
                .transport
                .consumer_recv(self.config.worker_receive_timeout)
                .await
            {
                self.on_datagram(&datagram);
            }

            let advanced = self.deliver_ready();

            if self.pending.is_empty() {
                self.last_progress = Instant::now();
            }

            if advanced || self.last_ack_sent.elapsed() >= self.config.ack_idle_interval {
                self.send_ack().await;
            }
        }

        debug!("consumer worker stopped");
    }

    fn on_datagram(&mut self, datagram: &[u8]) {
        let frame = match Frame::decode(datagram) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("malformed datagram on the data path - discarding: {:#}", e);
                return;
            }
        };

        if !frame.has_body() {
            trace!("bodyless frame on the data path - ignoring");
            return;
        }

        if frame.header.data_size as usize != T::ENCODED_LEN {
            warn!(
                "frame {} carries {} body bytes where the record size is {} - discarding",
                frame.header.id,
                frame.header.data_size,
                T::ENCODED_LEN
            );
            return;
        }

        if self.is_duplicate(frame.header.id) {
            debug!("frame {} is a duplicate or out of window - discarding", frame.header.id);
            return;
        }

        let record = match T::deser(&mut &frame.body[..]) {
            Ok(record) => record,
            Err(e) => {
                warn!("frame {} carries an undecodable record - discarding: {:#}", frame.header.id, e);
                return;
            }
        };

        trace!("buffering frame {}", frame.header.id);
        self.pending.insert(frame.header.id.seq_no.to_raw(), (frame.header.id, record));
    }

    /// The not-a-duplicate test. A frame is rejected if its sequence number is in the
    ///  half-window at or behind the frontier (delivered or skipped already), if it is
    ///  tagged with an epoch before the frontier's (a stale retransmission from before a
    ///  sequence wrap), or if it is already buffered.
    fn is_duplicate(&self, id: FrameId) -> bool {
        id.seq_no.is_at_or_behind(self.frontier.seq_no)
            || id.tx_epoch < self.frontier.tx_epoch
            || self.pending.contains_key(&id.seq_no.to_raw())
    }

    /// Delivers the contiguous run of buffered frames following the frontier, skipping
    ///  past a missing sequence number once its wait is up. Returns whether the frontier
    ///  advanced.
    fn deliver_ready(&mut self) -> bool {
        let mut advanced = false;

        loop {
            let expected = self.frontier.seq_no.next();

            if let Some((id, record)) = self.pending.remove(&expected.to_raw()) {
                trace!("delivering frame {}", id);
                self.output.enqueue(record);
                self.frontier = id;
                self.last_progress = Instant::now();
                advanced = true;
                continue;
            }

            if self.pending.is_empty()
                || self.last_progress.elapsed() < self.config.skip_timeout
            {
                break;
            }

            // later frames are buffered but the expected one never showed up: give up on
            //  it and move on, one sequence number per skip timeout
            warn!("frame {} not received within the skip timeout - skipping", expected);
            self.frontier.seq_no = expected;
            self.last_progress = Instant::now();
            advanced = true;

            if let Some(listener) = &self.missed_frame_listener {
                listener.on_missed_frame(expected.to_raw());
            }
        }

        advanced
    }

    /// Cumulative ack for everything up to the frontier.
    async fn send_ack(&mut self) {
        trace!("acknowledging up to {}", self.frontier);
        self.transport.consumer_send(&Frame::ack(self.frontier).encode()).await;
        self.last_ack_sent = Instant::now();
    }
}
