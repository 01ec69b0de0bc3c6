//! Provides a fixed-capacity buffer for bit-level packing of data.
//!
//! Protocols with tight size budgets frequently store values in
//! fewer bits than their natural type width. A boolean costs one
//! bit, a counter that never exceeds 2000 fits into 11 bits, and
//! so on. [`BitBuffer`] packs such fields back to back without
//! any padding between them.
//!
//! # Layout
//!
//! Bits are filled starting at the LSB of each byte, working
//! towards the MSB. Values wider than a byte are split into
//! byte-sized chunks, least significant chunk first.
//!
//! The resulting stream is not self-describing. Consumers must
//! replay the exact sequence of reads matching the writes that
//! produced the data. The only exception are byte arrays and
//! strings, which carry a signed 32-bit length prefix.
//!
//! # Capacity
//!
//! The capacity of a buffer is fixed upon construction. The
//! plain `write_*` and `read_*` methods trust the caller to
//! check [`BitBuffer::can_write`] and [`BitBuffer::can_read`]
//! beforehand and panic when the storage is overrun.
//!
//! Every operation also has a `try_*` counterpart which
//! validates the request first and reports an [`Error`]
//! without touching the buffer state when it can't be served.

#![deny(rust_2018_idioms, rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

use std::string::FromUtf8Error;

use thiserror::Error;

mod buffer;
pub use buffer::BitBuffer;

mod checked;

/// Errors produced by the checked operations of a [`BitBuffer`].
#[derive(Debug, Error)]
pub enum Error {
    /// The operation would move the cursor past the end of
    /// the buffer.
    #[error("buffer capacity exceeded: requested {requested} bits, {available} available")]
    CapacityExceeded { requested: usize, available: usize },

    /// A partial operation requested more bits than the target
    /// type can hold.
    #[error("bit width {bits} exceeds the {max}-bit width of the target type")]
    InvalidWidth { bits: u32, max: u32 },

    /// A decoded length prefix was negative.
    #[error("invalid length prefix: {0}")]
    InvalidLength(i32),

    /// A byte sequence is too long to be described by the
    /// signed 32-bit length prefix.
    #[error("sequence of {0} bytes is too long to be length-prefixed")]
    LengthOverflow(usize),

    /// Failed to decode an UTF-8 string where one was expected.
    #[error("{0}")]
    Utf8(#[from] FromUtf8Error),
}
