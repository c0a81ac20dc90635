use bytes::{Buf, BufMut, BytesMut};
use bytes_varint::try_get_fixed::TryGetFixedSupport;

/// A fixed-size application payload carried by one data frame.
///
/// Producer and consumer of a queue must instantiate the same record type - the protocol
///  carries the encoded bytes verbatim and does not negotiate sizes. `ENCODED_LEN` must
///  match what `ser` writes and `deser` reads exactly; it is what the consumer checks an
///  incoming data frame's declared size against.
pub trait Record: Copy + Send + 'static {
    const ENCODED_LEN: usize;

    fn ser(&self, buf: &mut BytesMut);

    fn deser(buf: &mut impl Buf) -> anyhow::Result<Self>;
}

impl Record for i32 {
    const ENCODED_LEN: usize = size_of::<i32>();

    fn ser(&self, buf: &mut BytesMut) {
        buf.put_i32(*self);
    }

    fn deser(buf: &mut impl Buf) -> anyhow::Result<Self> {
        Ok(buf.try_get_i32()?)
    }
}
