//! Versioned wire layout of the contract's inbound messages.
//!
//! Opcode values and field widths changed between contract revisions, so
//! the decoder takes them from here instead of constants.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Widest integer the contract runtime serializes (`int257`).
pub const MAX_FIELD_BITS: u32 = 257;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub bits: u32,
    #[serde(default)]
    pub signed: bool,
}

impl FieldSpec {
    pub const fn unsigned(bits: u32) -> Self {
        Self { bits, signed: false }
    }

    pub const fn signed(bits: u32) -> Self {
        Self { bits, signed: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteLayout {
    pub opcode: u64,
    pub poll_id: FieldSpec,
    pub option_index: FieldSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireSchema {
    pub version: u32,
    #[serde(default = "default_opcode_bits")]
    pub opcode_bits: u32,
    pub vote: VoteLayout,
}

impl WireSchema {
    /// First contract revision: `uint64` poll id, `uint32` option.
    pub fn v1() -> Self {
        Self {
            version: 1,
            opcode_bits: 32,
            vote: VoteLayout {
                opcode: 1_073_741_822,
                poll_id: FieldSpec::unsigned(64),
                option_index: FieldSpec::unsigned(32),
            },
        }
    }

    /// Current revision: both fields are `int257`.
    pub fn v2() -> Self {
        Self {
            version: 2,
            opcode_bits: 32,
            vote: VoteLayout {
                opcode: 1_011_836_453,
                poll_id: FieldSpec::signed(MAX_FIELD_BITS),
                option_index: FieldSpec::signed(MAX_FIELD_BITS),
            },
        }
    }

    pub fn by_version(version: u32) -> Result<Self> {
        match version {
            1 => Ok(Self::v1()),
            2 => Ok(Self::v2()),
            other => Err(Error::Config(format!("unknown wire schema version {}", other))),
        }
    }

    /// Bits a well-formed vote body occupies.
    pub fn min_vote_bits(&self) -> usize {
        (self.opcode_bits + self.vote.poll_id.bits + self.vote.option_index.bits) as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.opcode_bits == 0 || self.opcode_bits > 64 {
            return Err(Error::Config(format!(
                "opcode width must be within 1..=64 bits, got {}",
                self.opcode_bits
            )));
        }
        if self.opcode_bits < 64 && self.vote.opcode >> self.opcode_bits != 0 {
            return Err(Error::Config(format!(
                "vote opcode {} does not fit in {} bits",
                self.vote.opcode, self.opcode_bits
            )));
        }
        for (name, field) in [("poll_id", self.vote.poll_id), ("option_index", self.vote.option_index)] {
            if field.bits == 0 || field.bits > MAX_FIELD_BITS {
                return Err(Error::Config(format!(
                    "{} width must be within 1..={} bits, got {}",
                    name, MAX_FIELD_BITS, field.bits
                )));
            }
        }
        Ok(())
    }
}

impl Default for WireSchema {
    fn default() -> Self {
        Self::v2()
    }
}

fn default_opcode_bits() -> u32 {
    32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(WireSchema::v1().validate().is_ok());
        assert!(WireSchema::v2().validate().is_ok());
        assert_eq!(WireSchema::v1().min_vote_bits(), 128);
        assert_eq!(WireSchema::v2().min_vote_bits(), 546);
    }

    #[test]
    fn test_rejects_oversized_fields() {
        let mut schema = WireSchema::v1();
        schema.vote.poll_id = FieldSpec::unsigned(258);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_rejects_opcode_wider_than_tag() {
        let mut schema = WireSchema::v1();
        schema.opcode_bits = 16;
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_unknown_version() {
        assert!(WireSchema::by_version(7).is_err());
        assert_eq!(WireSchema::by_version(1).unwrap(), WireSchema::v1());
    }
}
