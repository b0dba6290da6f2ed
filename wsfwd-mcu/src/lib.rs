//! wsfwd MCU Library
//!
//! Traits the bridge core consumes from its host platform.
//!
//! This crate provides:
//! - Peripheral link and telemetry traits for the radio side
//! - Transport and clock traits for the controller side
//!
//! # Note
//! This crate has no dependencies. Implementations live with the platform
//! glue (see `wsfwd-bridge` for a desktop host using btleplug).

pub mod ble;
pub mod transport;

pub use ble::*;
pub use transport::*;
