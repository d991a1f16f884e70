//! # Engine Primitives
//!
//! Hardcoded constants for the Traitsmith engine.
//!
//! Percentages are carried as basis points (hundredths of a percent) so that
//! every weight comparison in the engine is exact integer arithmetic.

/// Basis points in one hundred percent.
///
/// A tier declared as `80.0` percent is stored as `8000`.
pub const FULL_PERCENTAGE_BPS: u32 = 10_000;

/// Tolerance on the sum of active tier percentages, in basis points.
///
/// One basis point is 0.01 percent.
pub const PERCENTAGE_EPSILON_BPS: u32 = 1;

/// Default multiplier for the backtrack budget.
///
/// Budget = factor × required part count × average branching factor.
pub const DEFAULT_BUDGET_FACTOR: usize = 4;

/// Default number of seeds tried by `generate_retrying` before giving up.
pub const DEFAULT_RETRY_SEEDS: u32 = 8;

/// Maximum number of part types a single generation request may name.
pub const MAX_REQUIRED_PARTS: usize = 256;

/// Maximum number of pins a single generation request may carry.
pub const MAX_PINS: usize = 256;

/// Maximum length for entity codes and names in a catalog.
pub const MAX_CODE_LENGTH: usize = 255;

// =============================================================================
// CANONICAL TRAIT SET FORMAT
// =============================================================================

/// Magic bytes for the canonical trait-set format header.
pub const MAGIC_BYTES: &[u8; 4] = b"TSRS";

/// Current canonical format version.
///
/// Increment this when making breaking changes to the canonical layout;
/// doing so changes every content address derived from it.
pub const FORMAT_VERSION: u8 = 1;

/// Size of the canonical header (magic + version).
pub const HEADER_LEN: usize = 5;

/// Maximum canonical payload accepted by the decoder (1 MB).
pub const MAX_CANONICAL_SIZE: usize = 1024 * 1024;

// =============================================================================
// MULTIHASH CODES
// =============================================================================

/// Multihash code for sha2-256.
pub const MULTIHASH_SHA2_256: u64 = 0x12;

/// Multihash code for blake3 (256-bit output).
pub const MULTIHASH_BLAKE3: u64 = 0x1e;

/// Digest length for both supported algorithms.
pub const DIGEST_LEN: usize = 32;
