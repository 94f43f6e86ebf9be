//! NaN-boxed encoding of `push` immediates.
//!
//! A `push` operand is a single 64-bit word that carries a float, an
//! integer, a boolean or unit.
//!
//! # Encoding (64 bits)
//!
//! - **Float**: raw IEEE 754 bits. Negative quiet NaNs collide with the box
//!   prefix and are canonicalized to the positive quiet NaN.
//! - **Int**: box prefix | tag(1) | 48-bit two's complement payload
//! - **Bool**: box prefix | tag(2) | value in lowest bit
//! - **Unit**: box prefix | tag(3)

use std::fmt;

use crate::bytecode::value::Value;

/// Sign bit plus quiet-NaN exponent. No non-NaN float has all of these set.
const BOX_PREFIX: u64 = 0xFFF8_0000_0000_0000u64;
const CANONICAL_NAN: u64 = 0x7FF8_0000_0000_0000u64;
const TAG_SHIFT: usize = 48;
const TAG_BITS: u64 = 0x7;
const PAYLOAD_MASK: u64 = 0x0000_FFFF_FFFF_FFFFu64;

const TAG_INT: u64 = 1;
const TAG_BOOL: u64 = 2;
const TAG_UNIT: u64 = 3;

/// Smallest integer representable as an immediate.
pub const IMMEDIATE_INT_MIN: i64 = -(1i64 << 47);
/// Largest integer representable as an immediate.
pub const IMMEDIATE_INT_MAX: i64 = (1i64 << 47) - 1;

#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct NaNValue(u64);

impl NaNValue {
    #[inline]
    pub fn from_f64(val: f64) -> Self {
        let bits = val.to_bits();
        if bits & BOX_PREFIX == BOX_PREFIX {
            Self(CANONICAL_NAN)
        } else {
            Self(bits)
        }
    }

    /// Box an integer, or `None` when it does not fit in 48 bits.
    #[inline]
    pub fn from_int(val: i64) -> Option<Self> {
        if (IMMEDIATE_INT_MIN..=IMMEDIATE_INT_MAX).contains(&val) {
            Some(Self::boxed(TAG_INT, val as u64 & PAYLOAD_MASK))
        } else {
            None
        }
    }

    #[inline]
    pub fn from_bool(val: bool) -> Self {
        Self::boxed(TAG_BOOL, val as u64)
    }

    #[inline]
    pub fn unit() -> Self {
        Self::boxed(TAG_UNIT, 0)
    }

    #[inline]
    fn boxed(tag: u64, payload: u64) -> Self {
        Self(BOX_PREFIX | (tag << TAG_SHIFT) | payload)
    }

    #[inline]
    pub fn from_word(word: i64) -> Self {
        Self(word as u64)
    }

    #[inline]
    pub fn to_word(self) -> i64 {
        self.0 as i64
    }

    #[inline]
    pub fn is_float(self) -> bool {
        self.0 & BOX_PREFIX != BOX_PREFIX
    }

    #[inline]
    fn tag(self) -> u64 {
        (self.0 >> TAG_SHIFT) & TAG_BITS
    }

    /// Decode into a runtime value. `None` for a boxed word with an unknown tag.
    pub fn to_value(self) -> Option<Value> {
        if self.is_float() {
            return Some(Value::Float(f64::from_bits(self.0)));
        }
        let payload = self.0 & PAYLOAD_MASK;
        match self.tag() {
            // Sign-extend the 48-bit payload.
            TAG_INT => Some(Value::Int(((payload << 16) as i64) >> 16)),
            TAG_BOOL => Some(Value::Bool(payload & 1 == 1)),
            TAG_UNIT => Some(Value::Unit),
            _ => None,
        }
    }
}

impl fmt::Debug for NaNValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NaNValue({:#018x})", self.0)
    }
}

/// Listing form: `3`, `2.5`, `true`, `()`.
impl fmt::Display for NaNValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_value() {
            Some(Value::Int(n)) => f.write_str(itoa::Buffer::new().format(n)),
            Some(Value::Float(x)) => f.write_str(ryu::Buffer::new().format(x)),
            Some(Value::Bool(b)) => write!(f, "{}", b),
            Some(Value::Unit) => f.write_str("()"),
            _ => write!(f, "{:#x}", self.0),
        }
    }
}
