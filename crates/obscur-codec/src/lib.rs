//! ObscurCore Byte-Level Utilities
//!
//! Leaf utilities shared by every layer of the package format: fixed-endian
//! integer packing, Base128 varints, a fixed-capacity ring buffer, and the
//! two security-sensitive helpers that everything above relies on —
//! constant-time comparison and observable zeroisation.
//!
//! Nothing here knows about the package format itself. Keeping these at the
//! bottom of the dependency graph lets the wire and crypto layers share one
//! definition of "compare secrets" and "wipe secrets".

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod endian;
pub mod ring;
pub mod varint;

mod cmp;
mod wipe;

pub use cmp::ct_eq;
pub use endian::{put_u32_le, put_u64_le, read_u32_le};
pub use ring::{RingBuffer, RingBufferError};
pub use varint::{VarintError, read_uvarint, write_uvarint};
pub use wipe::{wipe, wipe_vec};
