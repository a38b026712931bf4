//! Signed and unsigned subfields of a 32-bit word.
//!
//! A [`BitField`] names a contiguous run of bits. `extract` pulls the
//! run out as an integer (sign-extending it for signed fields) and
//! `insert` packs an integer back in. Both are pure.
//!
//! Values that do not fit a field are rejected with
//! [`FieldError::OutOfRange`]; the codec never truncates.

use std::fmt;
use thiserror::Error;

/// Number of bits in a machine word.
pub const WORD_BITS: u32 = 32;

/// A contiguous run of bits within a 32-bit word.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitField {
    /// Number of bits in the field (1..=32).
    width: u32,
    /// Position of the least significant bit of the field.
    shift: u32,
    /// Whether the field holds a two's complement value.
    signed: bool,
}

impl BitField {
    /// An unsigned field spanning bits `from_bit..=to_bit`.
    ///
    /// # Panics
    /// Panics if the span is empty or runs past bit 31. Field layouts
    /// are `const` items, so this fails at compile time.
    pub const fn new(from_bit: u32, to_bit: u32) -> Self {
        Self::span(from_bit, to_bit, false)
    }

    /// A signed (two's complement) field spanning bits `from_bit..=to_bit`.
    pub const fn new_signed(from_bit: u32, to_bit: u32) -> Self {
        Self::span(from_bit, to_bit, true)
    }

    const fn span(from_bit: u32, to_bit: u32, signed: bool) -> Self {
        assert!(from_bit <= to_bit, "bit field must not be empty");
        assert!(to_bit < WORD_BITS, "bit field must fit in a 32-bit word");
        Self {
            width: to_bit - from_bit + 1,
            shift: from_bit,
            signed,
        }
    }

    /// Build a field from its width and shift, checking the layout.
    pub fn try_new(width: u32, shift: u32, signed: bool) -> Result<Self, FieldError> {
        if width == 0 || width > WORD_BITS || shift >= WORD_BITS || width + shift > WORD_BITS {
            return Err(FieldError::InvalidLayout { width, shift });
        }
        Ok(Self { width, shift, signed })
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub const fn shift(&self) -> u32 {
        self.shift
    }

    #[inline]
    pub const fn is_signed(&self) -> bool {
        self.signed
    }

    /// Mask of `width` low-order ones (not shifted into place).
    #[inline]
    pub const fn mask(&self) -> u32 {
        low_mask(self.width)
    }

    /// Mask of the field's bit positions within the word.
    #[inline]
    pub const fn word_mask(&self) -> u32 {
        self.mask() << self.shift
    }

    /// Smallest value the field can hold.
    pub const fn min_value(&self) -> i64 {
        if self.signed {
            -(1i64 << (self.width - 1))
        } else {
            0
        }
    }

    /// Largest value the field can hold.
    pub const fn max_value(&self) -> i64 {
        if self.signed {
            (1i64 << (self.width - 1)) - 1
        } else {
            (1i64 << self.width) - 1
        }
    }

    /// Check whether `value` is representable in this field.
    #[inline]
    pub const fn fits(&self, value: i64) -> bool {
        value >= self.min_value() && value <= self.max_value()
    }

    /// Check whether two fields share any bit position.
    pub const fn overlaps(&self, other: &BitField) -> bool {
        self.word_mask() & other.word_mask() != 0
    }

    /// Raw field bits, shifted down and masked. Never sign-extended.
    #[inline]
    pub const fn extract_bits(&self, word: u32) -> u32 {
        (word >> self.shift) & self.mask()
    }

    /// Field value; sign-extended when the field is signed.
    pub const fn extract(&self, word: u32) -> i64 {
        let bits = self.extract_bits(word);
        if self.signed {
            sign_extend(bits, self.width)
        } else {
            bits as i64
        }
    }

    /// Return a copy of `word` with this field replaced by `value`.
    ///
    /// Negative values are stored in two's complement. Values outside
    /// [`min_value`](Self::min_value)..=[`max_value`](Self::max_value)
    /// are rejected.
    pub fn insert(&self, word: u32, value: i64) -> Result<u32, FieldError> {
        if !self.fits(value) {
            return Err(FieldError::OutOfRange {
                value,
                min: self.min_value(),
                max: self.max_value(),
            });
        }
        // In range, so masking keeps every significant bit
        let bits = (value as u64 & self.mask() as u64) as u32;
        Ok((word & !self.word_mask()) | (bits << self.shift))
    }
}

impl fmt::Debug for BitField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hi = self.shift + self.width - 1;
        let kind = if self.signed { "signed" } else { "unsigned" };
        write!(f, "BitField({}..={}, {})", self.shift, hi, kind)
    }
}

/// Mask with the low `width` bits set (`width` in 0..=32).
const fn low_mask(width: u32) -> u32 {
    if width >= WORD_BITS {
        u32::MAX
    } else {
        (1u32 << width) - 1
    }
}

/// Interpret the low `width` bits of `bits` as a two's complement value.
///
/// Done with an explicit top-bit test: if bit `width - 1` is set the
/// result is `bits - 2^width`.
pub const fn sign_extend(bits: u32, width: u32) -> i64 {
    assert!(width >= 1 && width <= WORD_BITS, "sign_extend width out of range");
    let bits = (bits & low_mask(width)) as i64;
    let top = 1i64 << (width - 1);
    if bits & top != 0 {
        bits - (1i64 << width)
    } else {
        bits
    }
}

/// Errors raised by the bitfield codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("value {value} does not fit field range {min}..={max}")]
    OutOfRange { value: i64, min: i64, max: i64 },

    #[error("invalid field layout: width {width}, shift {shift}")]
    InvalidLayout { width: u32, shift: u32 },
}
