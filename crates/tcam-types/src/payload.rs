//! Opaque rule payloads and action references.

use serde::{Deserialize, Serialize};

/// Match/action payload of one rule.
///
/// The placement engine never interprets the key, mask, or action bytes; it
/// only owns them on behalf of the rule and hands them to the hardware-apply
/// layer inside move records. The `partition` field is the one exception:
/// the table registry uses it to route the rule to the correct partition of
/// an exact-expansion (ATCAM) table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulePayload {
    /// Partition key extracted from the match key; 0 for single-partition
    /// tables.
    pub partition: u32,
    /// Encoded match key.
    pub key: Vec<u8>,
    /// Encoded ternary mask.
    pub mask: Vec<u8>,
    /// Encoded action parameters.
    pub action_data: Vec<u8>,
}

impl RulePayload {
    /// Payload with only a partition key, for single-field tests and
    /// non-range tables.
    pub fn for_partition(partition: u32) -> Self {
        Self {
            partition,
            ..Default::default()
        }
    }
}

/// Opaque references to action-side resources attached to a rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRef {
    pub action_index: u32,
    pub selector_index: u32,
    pub selector_len: u32,
}
