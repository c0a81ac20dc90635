use anyhow::bail;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use bytes_varint::try_get_fixed::TryGetFixedSupport;
use std::fmt::{Display, Formatter};

use crate::seq_no::SeqNo;

/// Identity of a frame: the producer-assigned sequence number plus a coarse time tag.
///
/// The time tag is the number of whole seconds since the producer started, truncated to
///  16 bits (roughly 18 hours before it wraps). Its only job is to let the consumer tell
///  a fresh frame apart from a very old retransmission whose sequence number happens to
///  collide after wrap-around.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct FrameId {
    pub seq_no: SeqNo,
    pub tx_epoch: u16,
}

impl Display for FrameId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}@{}", self.seq_no, self.tx_epoch)
    }
}

/// Frame header - all numbers in network byte order (BE):
/// ```ascii
/// 0:  sequence number (u16), wraps modulo 2^16; an ack echoes the acknowledged number
/// 2:  tx epoch (u16): producer-local seconds since start, modulo 2^16
/// 4:  data size (u16): 0 for an acknowledgement, else the record length in bytes
/// ```
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct FrameHeader {
    pub id: FrameId,
    pub data_size: u16,
}

impl FrameHeader {
    pub const ENCODED_LEN: usize = 3 * size_of::<u16>();

    pub fn ser(&self, buf: &mut BytesMut) {
        buf.put_u16(self.id.seq_no.to_raw());
        buf.put_u16(self.id.tx_epoch);
        buf.put_u16(self.data_size);
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<FrameHeader> {
        let seq_no = buf.try_get_u16()?;
        let tx_epoch = buf.try_get_u16()?;
        let data_size = buf.try_get_u16()?;
        Ok(FrameHeader {
            id: FrameId {
                seq_no: SeqNo::from_raw(seq_no),
                tx_epoch,
            },
            data_size,
        })
    }
}

/// A complete frame: header plus, for data frames, the encoded record.
///
/// The encoded byte view is the unit of transmission - exactly one frame per datagram.
///  Acknowledgement frames consist of the header alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub body: Bytes,
}

impl Frame {
    pub fn data(id: FrameId, body: Bytes) -> Frame {
        Frame {
            header: FrameHeader {
                id,
                data_size: body.len() as u16,
            },
            body,
        }
    }

    pub fn ack(id: FrameId) -> Frame {
        Frame {
            header: FrameHeader { id, data_size: 0 },
            body: Bytes::new(),
        }
    }

    pub fn has_body(&self) -> bool {
        self.header.data_size != 0
    }

    /// Serializes header and body into one contiguous buffer. No I/O, no allocation
    ///  beyond the result.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(FrameHeader::ENCODED_LEN + self.body.len());
        self.header.ser(&mut buf);
        buf.put_slice(&self.body);
        buf
    }

    /// Parses a received datagram. A buffer shorter than a header, or shorter than the
    ///  length its header declares, is a protocol error.
    pub fn decode(datagram: &[u8]) -> anyhow::Result<Frame> {
        let mut buf = datagram;
        let header = FrameHeader::deser(&mut buf)?;

        if buf.remaining() < header.data_size as usize {
            bail!(
                "frame {} declares {} body bytes but only {} are present",
                header.id,
                header.data_size,
                buf.remaining()
            );
        }

        Ok(Frame {
            header,
            body: Bytes::copy_from_slice(&buf[..header.data_size as usize]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn id(seq_no: u16, tx_epoch: u16) -> FrameId {
        FrameId {
            seq_no: SeqNo::from_raw(seq_no),
            tx_epoch,
        }
    }

    #[rstest]
    #[case(0, 0, 0)]
    #[case(1, 0, 4)]
    #[case(9999, 17, 16)]
    #[case(u16::MAX, u16::MAX, 1)]
    fn test_header_ser_roundtrip(#[case] seq_no: u16, #[case] tx_epoch: u16, #[case] data_size: u16) {
        let original = FrameHeader {
            id: id(seq_no, tx_epoch),
            data_size,
        };

        let mut buf = BytesMut::new();
        original.ser(&mut buf);
        assert_eq!(buf.len(), FrameHeader::ENCODED_LEN);

        let mut b: &[u8] = &buf;
        let deser = FrameHeader::deser(&mut b).unwrap();
        assert!(b.is_empty());
        assert_eq!(deser, original);
    }

    #[test]
    fn test_header_layout() {
        let header = FrameHeader {
            id: id(0x0102, 0x0304),
            data_size: 0x0506,
        };
        let mut buf = BytesMut::new();
        header.ser(&mut buf);
        assert_eq!(&buf[..], &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
    }

    #[test]
    fn test_data_frame_roundtrip() {
        let original = Frame::data(id(7, 2), Bytes::from_static(&[1, 2, 3, 4]));
        assert!(original.has_body());

        let encoded = original.encode();
        assert_eq!(encoded.len(), FrameHeader::ENCODED_LEN + 4);

        let decoded = Frame::decode(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_ack_frame_roundtrip() {
        let original = Frame::ack(id(300, 1));
        assert!(!original.has_body());

        let encoded = original.encode();
        assert_eq!(encoded.len(), FrameHeader::ENCODED_LEN);

        let decoded = Frame::decode(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[rstest]
    #[case::empty(vec![])]
    #[case::short_header(vec![0, 1, 0, 0])]
    #[case::truncated_body(vec![0, 1, 0, 0, 0, 4, 9, 9])]
    fn test_decode_rejects_malformed(#[case] datagram: Vec<u8>) {
        assert!(Frame::decode(&datagram).is_err());
    }

    #[test]
    fn test_decode_ignores_trailing_bytes_beyond_declared_size() {
        let mut encoded = Frame::data(id(1, 0), Bytes::from_static(&[5, 6])).encode();
        encoded.put_u8(99);

        let decoded = Frame::decode(&encoded).unwrap();
        assert_eq!(&decoded.body[..], &[5, 6]);
    }
}
