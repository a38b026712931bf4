//! Bit-level primitives.
//!
//! Everything above this module treats a machine word as a set of
//! named subfields. This module provides the one type that knows how
//! to get integers in and out of those subfields:
//! - [`BitField`] - a `{ width, shift, signed }` slice of a 32-bit word

mod field;

pub use field::{sign_extend, BitField, FieldError, WORD_BITS};
