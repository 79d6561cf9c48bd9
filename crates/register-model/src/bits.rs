//! Fixed-width bit vector used for register values and masks.
//!
//! Bit 0 is the least significant bit. Multi-byte conversions are little-endian
//! by byte index, so `byte[0]` holds bits 0..=7.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not, Shl, Shr};

use bitvec::{field::BitField, order::Lsb0, slice::BitSlice, vec::BitVec};

use crate::error::{RegisterError, Result};

/// Fixed-width binary value.
///
/// Binary operators keep the width of the left operand; missing bits of the
/// right operand read as zero.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct BitVector {
    bits: BitVec<u8, Lsb0>,
}

impl BitVector {
    /// All-zero vector of `width` bits.
    #[must_use]
    pub fn zeros(width: usize) -> Self {
        Self {
            bits: BitVec::repeat(false, width),
        }
    }

    /// All-one vector of `width` bits.
    #[must_use]
    pub fn ones(width: usize) -> Self {
        Self {
            bits: BitVec::repeat(true, width),
        }
    }

    /// Builds a vector from the low `width` bits of `value`.
    #[must_use]
    pub fn from_u64(width: usize, value: u64) -> Self {
        Self::from_le_bytes(width, &value.to_le_bytes())
    }

    /// Builds a vector from little-endian bytes, zero-extending or truncating to `width`.
    #[must_use]
    pub fn from_le_bytes(width: usize, bytes: &[u8]) -> Self {
        let mut bits = BitVec::from_slice(bytes);
        bits.resize(width, false);
        Self { bits }
    }

    /// Parses an MSB-first binary string.
    ///
    /// An optional `0b` prefix and `_` separators are accepted. The width is
    /// the number of digits.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::InvalidBitString`] when the string is empty or
    /// holds anything besides `0`, `1` and `_`.
    pub fn from_bin_str(text: &str) -> Result<Self> {
        let digits = text.strip_prefix("0b").unwrap_or(text);
        let mut lsb_first = Vec::with_capacity(digits.len());
        for ch in digits.chars().rev() {
            match ch {
                '0' => lsb_first.push(false),
                '1' => lsb_first.push(true),
                '_' => {}
                _ => return Err(RegisterError::InvalidBitString(text.to_owned())),
            }
        }
        if lsb_first.is_empty() {
            return Err(RegisterError::InvalidBitString(text.to_owned()));
        }
        Ok(Self {
            bits: lsb_first.into_iter().collect(),
        })
    }

    /// Parses a hexadecimal string into a vector of `width` bits.
    ///
    /// Digits beyond `width` are truncated.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::InvalidBitString`] on an empty string or a
    /// non-hex digit.
    pub fn from_hex_str(width: usize, text: &str) -> Result<Self> {
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);
        let mut out = Self::zeros(width);
        let mut index = 0;
        let mut seen = false;
        for ch in digits.chars().rev() {
            if ch == '_' {
                continue;
            }
            let nibble = ch
                .to_digit(16)
                .ok_or_else(|| RegisterError::InvalidBitString(text.to_owned()))?;
            seen = true;
            let end = width.min(index + 4);
            if index < end {
                out.bits[index..end].store_le(nibble);
            }
            index += 4;
        }
        if !seen {
            return Err(RegisterError::InvalidBitString(text.to_owned()));
        }
        Ok(out)
    }

    /// Number of bits.
    #[must_use]
    pub fn width(&self) -> usize {
        self.bits.len()
    }

    /// Number of bytes needed to hold the value, `ceil(width / 8)`.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.width().div_ceil(8)
    }

    /// Returns bit `index`, or `None` past the width.
    #[must_use]
    pub fn bit(&self, index: usize) -> Option<bool> {
        (index < self.width()).then(|| self.bits[index])
    }

    /// Sets bit `index`.
    ///
    /// Returns false and leaves the vector untouched when `index >= width`.
    pub fn set_bit(&mut self, index: usize, value: bool) -> bool {
        match self.bits.get_mut(index) {
            Some(mut bit) => {
                *bit = value;
                true
            }
            None => false,
        }
    }

    /// Returns true when no bit is set.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.bits.not_any()
    }

    /// Number of set bits.
    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.bits.count_ones()
    }

    /// Low 64 bits as an integer.
    #[must_use]
    pub fn to_u64(&self) -> u64 {
        let low = &self.bits[..self.width().min(64)];
        if low.is_empty() {
            0
        } else {
            low.load_le()
        }
    }

    /// Little-endian byte image, `byte_len()` bytes long. Unused high bits are zero.
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bits = self.bits.clone();
        bits.set_uninitialized(false);
        bits.as_raw_slice().to_vec()
    }

    /// Copy zero-extended or truncated to `width` bits.
    #[must_use]
    pub fn resized(&self, width: usize) -> Self {
        let mut bits = self.bits.clone();
        bits.resize(width, false);
        Self { bits }
    }

    /// Extracts the inclusive range between two bit indexes given in either order.
    ///
    /// Returns `None` when the range leaves the vector.
    #[must_use]
    pub fn slice(&self, ind1: usize, ind2: usize) -> Option<Self> {
        let (low, high) = ordered(ind1, ind2);
        if high >= self.width() {
            return None;
        }
        Some(Self {
            bits: self.bits[low..=high].to_bitvec(),
        })
    }

    /// Overwrites the inclusive range with the low bits of `value`.
    ///
    /// Bits of the range above `value`'s width are cleared. Returns false and
    /// leaves the vector untouched when the range leaves the vector.
    pub fn set_slice(&mut self, ind1: usize, ind2: usize, value: &Self) -> bool {
        let (low, high) = ordered(ind1, ind2);
        if high >= self.width() {
            return false;
        }
        let window = &mut self.bits[low..=high];
        let copied = window.len().min(value.width());
        window.fill(false);
        window[..copied].copy_from_bitslice(&value.bits[..copied]);
        true
    }

    /// Places `self` above `lower`: the result is `lower.width() + self.width()` bits wide.
    #[must_use]
    pub fn concat(&self, lower: &Self) -> Self {
        let mut bits = lower.bits.clone();
        bits.extend_from_bitslice(&self.bits);
        Self { bits }
    }

    /// MSB-first binary digits, exactly `width` characters.
    #[must_use]
    pub fn to_bin_string(&self) -> String {
        self.bits
            .iter()
            .by_vals()
            .rev()
            .map(|bit| if bit { '1' } else { '0' })
            .collect()
    }

    /// `0x` followed by `ceil(width / 4)` uppercase hex digits.
    #[must_use]
    pub fn to_hex_string(&self) -> String {
        let digits = self.width().div_ceil(4);
        let mut out = String::with_capacity(digits + 2);
        out.push_str("0x");
        for nibble in self.bits.chunks(4).rev() {
            let digit = nibble.load_le::<u32>();
            out.push(char::from_digit(digit, 16).map_or('0', |ch| ch.to_ascii_uppercase()));
        }
        out
    }

    /// Right operand brought to the receiver's width, missing bits zero.
    fn operand(&self, rhs: &Self) -> BitVec<u8, Lsb0> {
        let mut bits = rhs.bits.clone();
        bits.resize(self.width(), false);
        bits
    }

    fn shifted(&self, amount: usize, shift: fn(&mut BitSlice<u8, Lsb0>, usize)) -> Self {
        if amount >= self.width() {
            return Self::zeros(self.width());
        }
        let mut bits = self.bits.clone();
        shift(&mut bits, amount);
        Self { bits }
    }
}

const fn ordered(ind1: usize, ind2: usize) -> (usize, usize) {
    if ind1 <= ind2 {
        (ind1, ind2)
    } else {
        (ind2, ind1)
    }
}

impl fmt::Display for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bin_string())
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector<{}>({})", self.width(), self.to_hex_string())
    }
}

impl BitAnd<&BitVector> for &BitVector {
    type Output = BitVector;

    fn bitand(self, rhs: &BitVector) -> BitVector {
        let mut bits = self.bits.clone();
        bits &= self.operand(rhs).as_bitslice();
        BitVector { bits }
    }
}

impl BitAnd<&Self> for BitVector {
    type Output = Self;

    fn bitand(self, rhs: &Self) -> Self {
        &self & rhs
    }
}

impl BitOr<&BitVector> for &BitVector {
    type Output = BitVector;

    fn bitor(self, rhs: &BitVector) -> BitVector {
        let mut bits = self.bits.clone();
        bits |= self.operand(rhs).as_bitslice();
        BitVector { bits }
    }
}

impl BitOr<&Self> for BitVector {
    type Output = Self;

    fn bitor(self, rhs: &Self) -> Self {
        &self | rhs
    }
}

impl BitXor<&BitVector> for &BitVector {
    type Output = BitVector;

    fn bitxor(self, rhs: &BitVector) -> BitVector {
        let mut bits = self.bits.clone();
        bits ^= self.operand(rhs).as_bitslice();
        BitVector { bits }
    }
}

impl Not for &BitVector {
    type Output = BitVector;

    fn not(self) -> BitVector {
        BitVector {
            bits: !self.bits.clone(),
        }
    }
}

impl Not for BitVector {
    type Output = Self;

    fn not(self) -> Self {
        !&self
    }
}

impl Shl<usize> for &BitVector {
    type Output = BitVector;

    fn shl(self, amount: usize) -> BitVector {
        self.shifted(amount, BitSlice::shift_right)
    }
}

impl Shr<usize> for &BitVector {
    type Output = BitVector;

    fn shr(self, amount: usize) -> BitVector {
        self.shifted(amount, BitSlice::shift_left)
    }
}

#[cfg(test)]
mod tests {
    use super::BitVector;

    #[test]
    fn integer_conversion_truncates_to_width() {
        let value = BitVector::from_u64(12, 0xFFFF);
        assert_eq!(value.width(), 12);
        assert_eq!(value.to_u64(), 0xFFF);
        assert_eq!(value.byte_len(), 2);
    }

    #[test]
    fn byte_image_is_little_endian_and_zero_padded() {
        let value = BitVector::from_u64(20, 0xA_BCDE);
        assert_eq!(value.to_le_bytes(), vec![0xDE, 0xBC, 0x0A]);
        let back = BitVector::from_le_bytes(20, &[0xDE, 0xBC, 0xFA]);
        assert_eq!(back.to_u64(), 0xA_BCDE);
    }

    #[test]
    fn short_byte_input_zero_extends() {
        let value = BitVector::from_le_bytes(32, &[0x34, 0x12]);
        assert_eq!(value.to_u64(), 0x1234);
    }

    #[test]
    fn slices_accept_either_index_order() {
        let value = BitVector::from_u64(16, 0xABCD);
        assert_eq!(value.slice(4, 11).map(|s| s.to_u64()), Some(0xBC));
        assert_eq!(value.slice(11, 4).map(|s| s.to_u64()), Some(0xBC));
        assert!(value.slice(8, 16).is_none());
    }

    #[test]
    fn set_slice_clears_bits_above_value_width() {
        let mut value = BitVector::ones(8);
        assert!(value.set_slice(2, 5, &BitVector::from_u64(2, 0b01)));
        assert_eq!(value.to_u64(), 0b1100_0111);
        assert!(!value.set_slice(6, 9, &BitVector::zeros(4)));
        assert_eq!(value.to_u64(), 0b1100_0111);
    }

    #[test]
    fn shifts_are_logical_and_width_preserving() {
        let value = BitVector::from_u64(8, 0b1001_0110);
        assert_eq!((&value << 2).to_u64(), 0b0101_1000);
        assert_eq!((&value >> 3).to_u64(), 0b0001_0010);
        assert!((&value << 8).is_zero());
        assert!((&value >> 100).is_zero());
    }

    #[test]
    fn boolean_ops_keep_left_width() {
        let wide = BitVector::ones(16);
        let narrow = BitVector::from_u64(8, 0x0F);
        assert_eq!((&wide & &narrow).to_u64(), 0x000F);
        assert_eq!((&narrow | &wide).to_u64(), 0xFF);
        assert_eq!((!&narrow).to_u64(), 0xF0);
        assert_eq!((&wide ^ &narrow).to_u64(), 0xFFF0);
    }

    #[test]
    fn strings_are_msb_first() {
        let value = BitVector::from_u64(10, 0x2C5);
        assert_eq!(value.to_bin_string(), "1011000101");
        assert_eq!(value.to_hex_string(), "0x2C5");
        assert_eq!(BitVector::from_bin_str("0b10_1100_0101").ok(), Some(value));
        assert!(BitVector::from_bin_str("0b").is_err());
        assert!(BitVector::from_bin_str("102").is_err());
    }

    #[test]
    fn hex_parsing_truncates_to_width() {
        let value = BitVector::from_hex_str(12, "0xDEADBEEF").expect("valid hex");
        assert_eq!(value.to_u64(), 0xEEF);
        assert!(BitVector::from_hex_str(8, "0xZZ").is_err());
    }

    #[test]
    fn set_bit_reports_out_of_range_index() {
        let mut value = BitVector::zeros(4);
        assert!(value.set_bit(3, true));
        assert!(!value.set_bit(4, true));
        assert_eq!(value.to_u64(), 0b1000);
        assert_eq!(value.width(), 4);
    }

    #[test]
    fn inverted_byte_image_keeps_padding_clear() {
        let value = !&BitVector::from_u64(12, 0x0F0);
        assert_eq!(value.to_le_bytes(), vec![0x0F, 0x0F]);
        assert_eq!(BitVector::zeros(0).to_u64(), 0);
        assert!(BitVector::zeros(0).to_le_bytes().is_empty());
    }

    #[test]
    fn concat_places_receiver_in_high_bits() {
        let high = BitVector::from_u64(4, 0xA);
        let low = BitVector::from_u64(8, 0x5C);
        let joined = high.concat(&low);
        assert_eq!(joined.width(), 12);
        assert_eq!(joined.to_u64(), 0xA5C);
    }
}
