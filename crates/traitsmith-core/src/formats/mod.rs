//! # Formats
//!
//! Byte-level representations of engine output.
//!
//! - `canonical`: the bit-exact trait-set encoding that gets content-addressed

pub mod canonical;

pub use canonical::{
    CanonicalEntry, CanonicalHeader, CanonicalTraitSet, canonical_from_bytes, canonical_to_bytes,
};
