use std::fmt::{Display, Formatter};

/// A 16-bit wrapping sequence number.
///
/// All comparisons are modular: there is no total order on sequence numbers, only a
///  half-window-biased notion of 'ahead' and 'behind' relative to some reference point.
///  Working through this newtype keeps the wrap-around arithmetic in one place instead of
///  scattering raw unsigned subtractions across the endpoints.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SeqNo(u16);

impl Display for SeqNo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SeqNo {
    pub const ZERO: SeqNo = SeqNo(0);

    /// Half of the sequence space. Anything up to this far behind a reference point is
    ///  considered 'at or behind' it; everything else is 'ahead'.
    const HALF_WINDOW: u16 = 1 << 15;

    pub fn from_raw(value: u16) -> Self {
        Self(value)
    }

    pub fn to_raw(&self) -> u16 {
        self.0
    }

    pub fn next(&self) -> SeqNo {
        SeqNo(self.0.wrapping_add(1))
    }

    /// Signed modular difference `self - other`, biased into `[-2^15, 2^15)`.
    pub fn distance(&self, other: SeqNo) -> i16 {
        self.0.wrapping_sub(other.0) as i16
    }

    /// True if `self` lies in the half of the sequence space at or behind `reference`,
    ///  i.e. in the 2^15 values `[reference - 2^15 + 1, reference]` (mod 2^16).
    ///
    /// NB: the computation must hold up when `reference` is numerically smaller than the
    ///  window size - the window then wraps around the top of the sequence space.
    pub fn is_at_or_behind(&self, reference: SeqNo) -> bool {
        reference.0.wrapping_sub(self.0) < Self::HALF_WINDOW
    }
}
