//! Buffers and binary (de)serialization.
//!
//! This module provides:
//!
//! - [`Buffer`]: the FIFO byte queue every layer reads from and writes to
//! - [`ReadBuffer`] / [`WriteBuffer`]: type-level read/write capability,
//!   so codecs stay blind to whether they touch a network stream or a
//!   staging area
//! - [`BinaryEncode`] / [`BinaryDecode`]: symmetric little-endian wire
//!   codecs for every primitive and, via the [`crate::types`] and
//!   [`crate::services`] impls, every protocol structure
//!
//! Wire discipline shared by all length-prefixed fields: a signed 32-bit
//! length where `-1` denotes null, `0` empty and positive values a byte
//! or element count. Null and empty collapse on decode.

mod buffer;
mod encode;

pub use buffer::{Buffer, ReadBuffer, WriteBuffer};
pub use encode::{BinaryDecode, BinaryEncode};
