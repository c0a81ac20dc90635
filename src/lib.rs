//! QDP - a reliable, ordered, one-way datagram queue on top of an unreliable,
//!  connectionless datagram transport.
//!
//! A producer process enqueues fixed-size application records; a consumer process
//!  dequeues them in the original insertion order, with duplicates suppressed and gaps
//!  either filled by retransmission or skipped after a bounded wait. The typical
//!  deployment is one producer streaming structured samples (e.g. a signal time series)
//!  to one consumer across loopback or a local network.
//!
//! ## Design goals
//!
//! * The abstraction is a queue, not a byte stream: `enqueue` on one side, blocking
//!   `dequeue` on the other, exactly one record per datagram
//! * Delivery is in sequence order, at most once, for every record that is delivered
//!   at all
//! * Latency is preferred over completeness: a record whose frame is lost and whose
//!   retransmissions do not arrive in time is *skipped* after a bounded wait rather
//!   than stalling the stream indefinitely (skips are reported, see
//!   [`MissedFrameListener`])
//! * Flow control is a fixed-size sliding window of unacknowledged frames on the
//!   sender; a full window stalls admission of new records, never retransmission
//! * No handshake, no session state, no congestion control, no encryption - the two
//!   endpoints only agree on a record type and a transport
//!
//! ## Wire format
//!
//! Exactly one frame per datagram, fixed layout, all numbers big-endian:
//!
//! ```ascii
//! 0:  sequence number (u16) - assigned by the producer starting at 1, wrapping
//!      modulo 2^16; an acknowledgement echoes the acknowledged number
//! 2:  tx epoch (u16) - producer-local seconds since start, wrapping; disambiguates
//!      retransmissions from a previous trip around the sequence space
//! 4:  data size (u16) - 0 marks an acknowledgement; otherwise the record length,
//!      and that many body bytes follow
//! 6:  body - the encoded record, verbatim
//! ```
//!
//! ## Reliability cycle
//!
//! The producer keeps every transmitted frame in a pending window until it is covered
//!  by a cumulative ack, retransmitting the oldest one on a timer. The consumer buffers
//!  out-of-order arrivals, delivers the contiguous prefix, and acknowledges its delivery
//!  frontier whenever it advances and periodically while idle. Both sides tolerate the
//!  transport losing, duplicating, reordering and delaying datagrams arbitrarily; the
//!  duplicate test stays correct across sequence wrap-around by combining a half-window
//!  exclusion test with the epoch tag.
//!
//! ## Related
//!
//! * TCP delivers everything in order at any latency cost; this protocol skips
//! * UDT / QUIC are connection-oriented stream transports with handshakes
//! * Aeron-style brokers never drop messages and pre-allocate per-peer buffers;
//!   this protocol is two symmetric endpoints and one shared transport

mod blocking_queue;
mod config;
mod consumer;
mod frame;
mod in_memory_transport;
mod producer;
mod record;
mod reliable_queue;
mod seq_no;
mod transport;
mod udp_transport;

pub use blocking_queue::BlockingQueue;
pub use config::QdpConfig;
pub use consumer::{Consumer, MissedFrameListener};
pub use frame::{Frame, FrameHeader, FrameId};
pub use in_memory_transport::InMemoryTransport;
pub use producer::Producer;
pub use record::Record;
pub use reliable_queue::ReliableQueue;
pub use seq_no::SeqNo;
pub use transport::Transport;
pub use udp_transport::{UdpTransport, DEFAULT_PORT, MAX_DATAGRAM_LEN};
