//! Range-expansion interface.
//!
//! A logical rule with a range match expands into multiple physical slots.
//! The expansion function is table-specific and supplied by the caller; the
//! engine only needs the resulting slot counts.

use crate::error::{TcamError, TcamResult};
use crate::payload::RulePayload;

/// Result of expanding one logical rule into physical slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeExpansion {
    /// Total physical slots the rule occupies.
    pub slot_count: usize,
    /// Slots per indivisible unit of the expansion. Always divides
    /// `slot_count`.
    pub slots_per_unit: usize,
}

impl RangeExpansion {
    pub fn single() -> Self {
        Self {
            slot_count: 1,
            slots_per_unit: 1,
        }
    }
}

/// Computes how many physical slots a payload occupies.
pub trait RangeExpander {
    fn expand(&self, payload: &RulePayload) -> TcamResult<RangeExpansion>;
}

/// Expander for non-range tables: every rule occupies exactly one slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleSlotExpander;

impl RangeExpander for SingleSlotExpander {
    fn expand(&self, _payload: &RulePayload) -> TcamResult<RangeExpansion> {
        Ok(RangeExpansion::single())
    }
}

/// Fixed-width expander, used by tests and by tables whose range fields
/// always expand to the same number of slots.
#[derive(Debug, Clone, Copy)]
pub struct FixedWidthExpander {
    pub slot_count: usize,
}

impl FixedWidthExpander {
    pub fn new(slot_count: usize) -> Self {
        Self { slot_count }
    }
}

impl RangeExpander for FixedWidthExpander {
    fn expand(&self, _payload: &RulePayload) -> TcamResult<RangeExpansion> {
        if self.slot_count == 0 {
            return Err(TcamError::invalid("expansion to zero slots"));
        }
        Ok(RangeExpansion {
            slot_count: self.slot_count,
            slots_per_unit: self.slot_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_slot_expander() {
        let exp = SingleSlotExpander
            .expand(&RulePayload::default())
            .unwrap();
        assert_eq!(exp.slot_count, 1);
        assert_eq!(exp.slots_per_unit, 1);
    }

    #[test]
    fn test_fixed_width_expander() {
        let exp = FixedWidthExpander::new(3)
            .expand(&RulePayload::default())
            .unwrap();
        assert_eq!(exp.slot_count, 3);
        assert!(FixedWidthExpander::new(0)
            .expand(&RulePayload::default())
            .is_err());
    }
}
