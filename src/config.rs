use anyhow::bail;
use std::time::Duration;

/// Protocol tuning knobs, shared by both endpoints of a queue.
///
/// The defaults are what the protocol was designed around; they assume a local or
///  loopback network. Both endpoint constructors call `validate`.
#[derive(Clone, Debug)]
pub struct QdpConfig {
    /// Maximum number of data frames that may be in flight (transmitted but not yet
    ///  acknowledged). A full window stalls admission of new records but not
    ///  retransmission.
    pub max_pending_frames: usize,

    /// How long the oldest unacknowledged frame may go without a (re)transmission.
    ///  Retransmission is bounded to one frame per period.
    pub resend_period: Duration,

    /// How long the consumer waits for a missing sequence number while later frames are
    ///  buffered, before declaring it lost and advancing past it. One sequence number is
    ///  skipped per period, so recovery from a burst of losses is deliberately serial.
    pub skip_timeout: Duration,

    /// Upper bound on any single wait inside the worker loops; this bounds how quickly
    ///  a worker notices a stop request.
    pub worker_receive_timeout: Duration,

    /// How often the consumer re-announces its delivery frontier while no progress is
    ///  being made. Acks on progress are immediate; this is the safety net against
    ///  lost acks.
    pub ack_idle_interval: Duration,
}

impl Default for QdpConfig {
    fn default() -> QdpConfig {
        QdpConfig {
            max_pending_frames: 8,
            resend_period: Duration::from_millis(100),
            skip_timeout: Duration::from_millis(200),
            worker_receive_timeout: Duration::from_millis(100),
            ack_idle_interval: Duration::from_millis(250),
        }
    }
}

impl QdpConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_pending_frames == 0 {
            bail!("the pending window must admit at least one frame");
        }
        if self.resend_period.is_zero() {
            bail!("a zero resend period would retransmit in a busy loop");
        }
        if self.skip_timeout.is_zero() {
            bail!("a zero skip timeout would skip frames that are merely reordered");
        }
        if self.worker_receive_timeout.is_zero() {
            bail!("a zero worker receive timeout would spin the worker loops");
        }
        if self.ack_idle_interval < self.worker_receive_timeout {
            bail!("an idle ack interval below the worker receive timeout degrades to per-iteration acks");
        }

        Ok(())
    }
}
