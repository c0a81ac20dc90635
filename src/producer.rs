use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

use crate::blocking_queue::BlockingQueue;
use crate::config::QdpConfig;
use crate::frame::{Frame, FrameId};
use crate::record::Record;
use crate::seq_no::SeqNo;
use crate::transport::Transport;

/// The sending endpoint of a queue.
///
/// Records handed to `enqueue` are framed with monotonically increasing sequence numbers
///  by a worker task, transmitted, and retained in a pending window until the consumer
///  acknowledges them. The oldest unacknowledged frame is retransmitted on a timer; a
///  full window stalls admission of new records but never retransmission.
///
/// Durability is not on offer: `stop` discards whatever is still unacknowledged, and a
///  consumer that never answers is retransmitted to indefinitely.
pub struct Producer<T: Record> {
    input: Arc<BlockingQueue<T>>,
    stop_requested: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    max_pending_frames: usize,
}

impl<T: Record> Producer<T> {
    pub fn new(transport: Arc<dyn Transport>, config: Arc<QdpConfig>) -> anyhow::Result<Producer<T>> {
        config.validate()?;

        let input: Arc<BlockingQueue<T>> = Arc::new(BlockingQueue::new());
        let stop_requested = Arc::new(AtomicBool::new(false));
        let max_pending_frames = config.max_pending_frames;

        let worker = ProducerWorker {
            transport,
            config,
            input: input.clone(),
            stop_requested: stop_requested.clone(),
            started: Instant::now(),
            next_seq_no: SeqNo::from_raw(1),
            pending: VecDeque::new(),
            head_last_sent: Instant::now(),
        };

        Ok(Producer {
            input,
            stop_requested,
            worker: Some(tokio::spawn(worker.run())),
            max_pending_frames,
        })
    }

    /// Queues a record for framing and transmission. Never blocks.
    pub fn enqueue(&self, record: T) {
        self.input.enqueue(record);
    }

    /// Number of records queued but not yet framed by the worker.
    pub fn size(&self) -> usize {
        self.input.len()
    }

    pub fn max_pending_frames(&self) -> usize {
        self.max_pending_frames
    }

    /// Stops the worker and waits for it. After return no further frames are emitted;
    ///  unacknowledged pending frames are discarded. Safe to call more than once.
    pub async fn stop(&mut self) {
        self.stop_requested.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }
}

impl<T: Record> Drop for Producer<T> {
    fn drop(&mut self) {
        if let Some(worker) = &self.worker {
            worker.abort();
        }
    }
}

/// A transmitted-but-unacknowledged frame. The encoded datagram is retained as sent;
///  retransmission is a plain re-send of the buffer.
struct PendingFrame {
    id: FrameId,
    datagram: Bytes,
}

/// Worker-task state. Everything in here is owned by the single worker task, so none of
///  it needs locking.
struct ProducerWorker<T: Record> {
    transport: Arc<dyn Transport>,
    config: Arc<QdpConfig>,
    input: Arc<BlockingQueue<T>>,
    stop_requested: Arc<AtomicBool>,

    started: Instant,
    next_seq_no: SeqNo,

    /// Sequence numbers in here are strictly increasing and contiguous; the front is
    ///  always the oldest unacknowledged frame.
    pending: VecDeque<PendingFrame>,
    /// When the front of `pending` was last put on the wire. Reset on (re)send and when
    ///  an ack moves the front.
    head_last_sent: Instant,
}

impl<T: Record> ProducerWorker<T> {
    async fn run(mut self) {
        debug!("starting producer worker");

        while !self.stop_requested.load(Ordering::Relaxed) {
            let until_next_resend = self.resend_head_if_due().await;

            if self.pending.len() >= self.config.max_pending_frames {
                trace!("pending window full - stalling admission for {:?}", until_next_resend);
                time::sleep(until_next_resend).await;
            }
            else if let Some(record) = self.input.dequeue_timeout(until_next_resend).await {
                self.send_new_frame(record).await;
            }

            self.drain_acks().await;
        }

        debug!(
            "producer worker stopped - discarding {} unacknowledged frames",
            self.pending.len()
        );
    }

    /// Retransmits the oldest pending frame if its resend period has elapsed. Returns
    ///  how long the loop may wait before the next retransmission could be due.
    async fn resend_head_if_due(&mut self) -> Duration {
        let Some(head) = self.pending.front() else {
            return self.config.resend_period;
        };

        let since_last_send = self.head_last_sent.elapsed();
        if since_last_send >= self.config.resend_period {
            debug!("resending frame {}", head.id);
            self.transport.producer_send(&head.datagram).await;
            self.head_last_sent = Instant::now();
            self.config.resend_period
        }
        else {
            self.config.resend_period - since_last_send
        }
    }

    async fn send_new_frame(&mut self, record: T) {
        let id = FrameId {
            seq_no: self.next_seq_no,
            tx_epoch: self.current_tx_epoch(),
        };
        self.next_seq_no = self.next_seq_no.next();

        let mut body = BytesMut::with_capacity(T::ENCODED_LEN);
        record.ser(&mut body);
        let datagram = Frame::data(id, body.freeze()).encode().freeze();

        debug!("sending new frame {}", id);
        self.transport.producer_send(&datagram).await;

        if self.pending.is_empty() {
            self.head_last_sent = Instant::now();
        }
        self.pending.push_back(PendingFrame { id, datagram });
    }

    /// Applies every ack that is already available, without waiting for more.
    async fn drain_acks(&mut self) {
        while let Some(datagram) = self.transport.producer_recv(Duration::ZERO).await {
            match Frame::decode(&datagram) {
                Ok(frame) if !frame.has_body() => self.apply_ack(frame.header.id.seq_no),
                Ok(frame) => warn!("data frame {} on the ack path - ignoring", frame.header.id),
                Err(e) => debug!("malformed datagram on the ack path - discarding: {:#}", e),
            }
        }
    }

    /// Cumulative ack: an ack for sequence number S clears every pending frame up to and
    ///  including S. An ack matching no pending frame is stale (or a duplicate of one
    ///  already applied) and is ignored, which makes ack application idempotent under
    ///  duplication and reordering.
    fn apply_ack(&mut self, acked: SeqNo) {
        let Some(position) = self.pending.iter().position(|frame| frame.id.seq_no == acked)
        else {
            debug!("ack {} matches no pending frame - ignoring", acked);
            return;
        };

        debug!("ack {} clears {} pending frames", acked, position + 1);
        self.pending.drain(..=position);
        self.head_last_sent = Instant::now();

        if let Some(head) = self.pending.front() {
            trace!("next pending frame is {}", head.id);
        }
    }

    fn current_tx_epoch(&self) -> u16 {
        self.started.elapsed().as_secs() as u16
    }
}
