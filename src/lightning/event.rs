//! # Lightning Events
//!
//! Classified interrupt events and the single-slot mailbox that carries
//! them from the interrupt context to the poll loop.

use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError};

use super::registers::DISTANCE_MASK;

/// Interrupt source value for a noise-level interrupt
pub const IRQ_NOISE: u8 = 0x01;

/// Interrupt source value for a rejected disturber
pub const IRQ_DISTURBER: u8 = 0x04;

/// Interrupt source value for a lightning strike
pub const IRQ_LIGHTNING: u8 = 0x08;

/// Distance value the sensor reports when the storm is out of range
pub const DISTANCE_OUT_OF_RANGE: u8 = 0x3F;

/// What the sensor reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Noise level too high
    Noise,
    /// Man-made disturber detected and rejected
    Disturber,
    /// Lightning with an estimated distance in km (0-63, 63 = out of range)
    Lightning { distance_km: u8 },
    /// Any other interrupt source value
    Unknown,
}

impl EventKind {
    /// Classify a masked interrupt source value
    ///
    /// `distance` is only consulted for lightning and is masked to 6 bits.
    pub fn classify(source: u8, distance: impl FnOnce() -> u8) -> Self {
        match source {
            IRQ_LIGHTNING => EventKind::Lightning {
                distance_km: distance() & DISTANCE_MASK,
            },
            IRQ_NOISE => EventKind::Noise,
            IRQ_DISTURBER => EventKind::Disturber,
            _ => EventKind::Unknown,
        }
    }
}

/// One classified interrupt with its capture time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightningEvent {
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

impl LightningEvent {
    pub fn new(kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self { kind, timestamp }
    }

    /// True when the storm distance is reported as out of range
    pub fn is_out_of_range(&self) -> bool {
        matches!(self.kind, EventKind::Lightning { distance_km } if distance_km == DISTANCE_OUT_OF_RANGE)
    }
}

/// Single-slot, last-write-wins mailbox
///
/// Written by the interrupt context, drained by the poll loop. At most one
/// event is retained: an event stored before the previous one was taken
/// replaces it. Both operations hold the lock only for the swap itself, so
/// the producer never waits on the consumer's work.
#[derive(Debug, Default)]
pub struct EventSlot {
    pending: Mutex<Option<LightningEvent>>,
}

impl EventSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an event, returning the unconsumed one it replaced
    pub fn store(&self, event: LightningEvent) -> Option<LightningEvent> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.replace(event)
    }

    /// Take the pending event and leave the slot empty
    pub fn take(&self) -> Option<LightningEvent> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Whether an event is waiting
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
