//! # weir-core
//!
//! Shared kernel for the Weir burst-to-queue intake pipeline.
//!
//! This crate holds the pieces every other Weir crate depends on:
//!
//! - **Typed identifiers**: [`PoolId`], [`SlotId`], [`UserId`], [`MsgId`]
//! - **Kernel errors**: [`Error`] for identifier and input validation failures
//! - **Observability bootstrap**: [`observability::init_logging`]
//!
//! ## Design Principles
//!
//! - **No domain policy**: claim, queue, and drain semantics live in
//!   `weir-intake`; this crate only provides vocabulary
//! - **Strong typing**: slot ids and pool ids are distinct types, so mixing
//!   them up is a compile error

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;
pub mod observability;

pub use error::{Error, Result};
pub use id::{MsgId, PoolId, SlotId, UserId};
