use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time;

/// An unbounded FIFO handoff between one enqueuing and one dequeuing task.
///
/// `enqueue` never blocks; back-pressure towards the application is provided elsewhere
///  (the producer's pending-window cap), not by this queue. The dequeue side parks on a
///  signal and wakes on the first enqueue that makes the queue non-empty.
///
/// NB: FIFO order and at-most-once removal are only guaranteed for a single concurrent
///  dequeuer, which is how both endpoints use it.
pub struct BlockingQueue<T> {
    queue: Mutex<VecDeque<T>>,
    dequeuer_signal: Notify,
}

impl<T> BlockingQueue<T> {
    pub fn new() -> BlockingQueue<T> {
        BlockingQueue {
            queue: Mutex::new(VecDeque::new()),
            dequeuer_signal: Notify::new(),
        }
    }

    pub fn enqueue(&self, element: T) {
        self.queue.lock().unwrap().push_back(element);
        self.dequeuer_signal.notify_one();
    }

    /// Waits until an element is available and returns it.
    pub async fn dequeue(&self) -> T {
        loop {
            // register interest before checking, so an enqueue between check and await
            //  leaves a stored permit rather than a lost wakeup
            let signalled = self.dequeuer_signal.notified();

            if let Some(element) = self.queue.lock().unwrap().pop_front() {
                return element;
            }

            signalled.await;
        }
    }

    /// Waits up to `timeout` for an element; `None` on expiry. A zero timeout degrades
    ///  to a non-blocking poll.
    pub async fn dequeue_timeout(&self, timeout: Duration) -> Option<T> {
        time::timeout(timeout, self.dequeue()).await.ok()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
