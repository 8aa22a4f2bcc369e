// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wait-free segmented object map for Taxon.
//!
//! `taxon-store` provides [`WaitFreeMap`], a key/value store keyed by dense
//! non-negative sequence whose values are opaque byte blobs produced by a
//! [`WaitFreeValue`] codec. Writes go through a compare-and-set loop that
//! merges instead of overwriting when two writers race on one slot.
//!
//! # Key Types
//!
//! - [`WaitFreeMap`]: the store; memory-only or backed by one file per segment.
//! - [`WaitFreeValue`]: codec + merge contract implemented by stored values.
//! - [`WriteSequenceAllocator`]: striped counters issuing per-slot tokens.
//! - [`StoreConfig`]: tunables, loadable through [`ConfigService`].
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod cache;
pub mod config;
mod error;
mod map;
mod segment;
mod value;
mod write_sequence;

pub use config::{
    ConfigError, ConfigService, ConfigStore, FsConfigStore, StoreConfig, DEFAULT_CACHE_CAPACITY,
    DEFAULT_SEGMENT_SIZE, DEFAULT_WRITE_SEQUENCE_STRIPES,
};
pub use error::{BoxedDecodeError, StoreError};
pub use map::{Iter, WaitFreeMap};
pub use value::{blob_write_sequence, decode_blob, encode_blob, WaitFreeValue, BLOB_HEADER_LEN};
pub use write_sequence::{WriteSequenceAllocator, NO_WRITE_SEQUENCE};
