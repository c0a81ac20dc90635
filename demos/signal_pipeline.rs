//! A producer samples a 1 Hz sine wave at 100 Hz and streams the samples over loopback
//!  UDP; a consumer prints whatever makes it through, in order.
//!
//! Run with `cargo run --example signal_pipeline`.

use anyhow::bail;
use bytes::{Buf, BufMut, BytesMut};
use bytes_varint::try_get_fixed::TryGetFixedSupport;
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::info;

use qdp::{Consumer, Producer, QdpConfig, Record, UdpTransport, DEFAULT_PORT};

#[derive(Copy, Clone, Debug)]
struct SignalSample {
    value: f64,
    timestamp_secs: f64,
}

impl Record for SignalSample {
    const ENCODED_LEN: usize = 2 * size_of::<u64>();

    fn ser(&self, buf: &mut BytesMut) {
        buf.put_u64(self.value.to_bits());
        buf.put_u64(self.timestamp_secs.to_bits());
    }

    fn deser(buf: &mut impl Buf) -> anyhow::Result<Self> {
        let sample = SignalSample {
            value: f64::from_bits(buf.try_get_u64()?),
            timestamp_secs: f64::from_bits(buf.try_get_u64()?),
        };
        if !sample.value.is_finite() || !sample.timestamp_secs.is_finite() {
            bail!("non-finite sample");
        }
        Ok(sample)
    }
}

fn generate_signal(elapsed_secs: f64) -> f64 {
    (elapsed_secs.fract() * 2.0 * PI).sin()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = Arc::new(QdpConfig::default());

    let consumer_transport = Arc::new(UdpTransport::consumer(DEFAULT_PORT).await?);
    let consumer: Consumer<SignalSample> = Consumer::new(consumer_transport, config.clone(), None)?;

    let producer_transport = Arc::new(UdpTransport::producer(
        format!("127.0.0.1:{DEFAULT_PORT}").parse()?,
    ).await?);
    let producer: Producer<SignalSample> = Producer::new(producer_transport, config)?;
    info!("signal pipeline up, streaming at 100 Hz");

    tokio::spawn(async move {
        let started = Instant::now();
        let mut tick = time::interval(Duration::from_millis(10));
        loop {
            tick.tick().await;
            let elapsed_secs = started.elapsed().as_secs_f64();
            producer.enqueue(SignalSample {
                value: generate_signal(elapsed_secs),
                timestamp_secs: elapsed_secs,
            });
        }
    });

    loop {
        let sample = consumer.dequeue().await;
        println!("time stamp {:.6}\t\tsignal {:.6}", sample.timestamp_secs, sample.value);
    }
}
