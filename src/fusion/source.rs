//! Trait seam between the fusion manager and the four sensor sources.

use super::snapshot::Snapshot;

/// A sensor source polled once per fusion cycle
///
/// Implementations must return within a bounded time and never fail: I/O
/// errors and malformed input are handled (and logged) inside the source,
/// which then simply contributes fewer fields.
#[cfg_attr(test, mockall::automock)]
pub trait FieldSource: Send {
    /// Short name used in log messages
    fn name(&self) -> &'static str;

    /// Keys this source reports every cycle
    ///
    /// An owned key the source leaves absent is cleared in the merged
    /// snapshot rather than inherited from an earlier source.
    fn owned_fields(&self) -> &'static [&'static str];

    /// Field set this source contributes to the current cycle
    fn read_fields(&mut self) -> Snapshot;
}

/// Stand-in for a device that could not be opened
///
/// Owns no keys: a missing device leaves the merge untouched.
#[derive(Debug, Clone, Copy)]
pub struct Unavailable {
    name: &'static str,
}

impl Unavailable {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl FieldSource for Unavailable {
    fn name(&self) -> &'static str {
        self.name
    }

    fn owned_fields(&self) -> &'static [&'static str] {
        &[]
    }

    fn read_fields(&mut self) -> Snapshot {
        Snapshot::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_contributes_nothing() {
        let mut source = Unavailable::new("gps");
        assert_eq!(source.name(), "gps");
        assert!(source.owned_fields().is_empty());
        assert!(source.read_fields().is_empty());
    }
}
