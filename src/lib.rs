//! Driver for a 1 MiB SPI NOR flash chip with 256-byte pages and 64 KiB
//! sectors, built on [embedded-hal](https://github.com/rust-embedded/embedded-hal).
//!
//! [`SerialFlash`] drives the chip over a blocking `SpiDevice`,
//! [`AsyncSerialFlash`] over an async one. Both implement the operation
//! surface in [`FlashDevice`] / [`AsyncFlashDevice`]: sector and chip erase,
//! page and whole-chip programming, reads, dump, emptiness check and ID.
//!
//! The surface performs no input validation; only SPI transfer failures are
//! reported.
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

mod async_comms;
mod comms;
pub mod error;
pub mod geometry;
mod identification;
mod storage;
pub mod traits;

pub use async_comms::{AsyncSerialFlash, BUSY_POLL_MS, CHIP_ERASE_POLL_MS, INIT_POLL_MS};
pub use comms::{SerialFlash, Status};
pub use error::Error;
pub use identification::Identification;
pub use traits::{AsyncFlashDevice, FlashDevice};
