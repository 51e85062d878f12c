//! # Lightning Module
//!
//! AS3935 lightning / RF event sensor.
//!
//! This module handles:
//! - Byte-exact SPI register protocol and the initialization sequence
//! - Interrupt decoding into noise, disturber and lightning events
//! - The single-slot pending-event mailbox shared with the poll loop
//! - The interrupt listener thread
//! - Publishing drained events to the fusion layer

pub mod registers;
pub mod event;
pub mod driver;
pub mod irq;
pub mod source;

pub use driver::{As3935, RegisterDump};
pub use event::{EventKind, LightningEvent};
pub use irq::{EdgeSource, IrqListener};
pub use registers::{AfeMode, DeviceConfig};
pub use source::LightningSource;
