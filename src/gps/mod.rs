//! # GPS Module
//!
//! Satellite position from the GPS receiver's NMEA stream.
//!
//! This module handles:
//! - Parsing RMC sentences (fix, coordinates, ground speed, course, UTC time)
//! - Reading a bounded batch of lines per poll with a serial read timeout

pub mod nmea;
pub mod receiver;

pub use nmea::{parse_rmc, PositionFix, RmcSentence, RmcStatus};
pub use receiver::{open_serial, GpsReceiver, LineSource, SerialLineSource, StreamLineSource};
