//! Classifies inbound message bodies against a [`WireSchema`].
//!
//! Bodies are read as big-endian bit strings: a fixed-width opcode first,
//! then the fields of the matching layout in declaration order. Fields may
//! be up to 257 bits wide but must carry a non-negative value that fits in
//! a `u64`; anything else is a decode error and the message is skipped.

use {
    thiserror::Error,
    vindexer_common::{config::FieldSpec, MessageBody, WireSchema},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("body truncated: needed {needed} bits, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("field {field} does not fit in 64 bits")]
    Overflow { field: &'static str },

    #[error("field {field} is negative")]
    Negative { field: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteMessage {
    pub poll_id: u64,
    pub option_index: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Vote(VoteMessage),
    /// No known opcode. `None` for an empty body (a plain transfer).
    Unknown { opcode: Option<u64> },
}

struct BitReader<'a> {
    data: &'a [u8],
    len: usize,
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(body: &'a MessageBody) -> Self {
        Self {
            data: &body.data,
            len: body.bit_len.min(body.data.len() * 8),
            pos: 0,
        }
    }

    fn ensure(&self, bits: usize) -> Result<(), DecodeError> {
        if self.len - self.pos < bits {
            return Err(DecodeError::Truncated {
                needed: self.pos + bits,
                available: self.len,
            });
        }
        Ok(())
    }

    fn bit(&mut self) -> bool {
        let byte = self.data[self.pos / 8];
        let set = (byte >> (7 - self.pos % 8)) & 1 == 1;
        self.pos += 1;
        set
    }

    /// Reads up to 64 bits as an unsigned integer.
    fn read_uint(&mut self, bits: u32) -> Result<u64, DecodeError> {
        self.ensure(bits as usize)?;
        let mut value = 0u64;
        for _ in 0..bits {
            value = (value << 1) | self.bit() as u64;
        }
        Ok(value)
    }

    fn read_field(&mut self, field: &'static str, width: FieldSpec) -> Result<u64, DecodeError> {
        self.ensure(width.bits as usize)?;
        let mut bits = width.bits;

        // Two's complement sign bit
        if width.signed {
            bits -= 1;
            if self.bit() {
                self.pos += bits as usize;
                return Err(DecodeError::Negative { field });
            }
        }

        if bits > 64 {
            let high = bits - 64;
            let mut overflow = false;
            for _ in 0..high {
                overflow |= self.bit();
            }
            if overflow {
                self.pos += 64;
                return Err(DecodeError::Overflow { field });
            }
            bits = 64;
        }

        self.read_uint(bits)
    }
}

/// Pure decoder over one schema revision.
#[derive(Debug, Clone)]
pub struct MessageDecoder {
    schema: WireSchema,
}

impl MessageDecoder {
    pub fn new(schema: WireSchema) -> Self {
        Self { schema }
    }

    pub fn decode(&self, body: &MessageBody) -> Result<Decoded, DecodeError> {
        if body.is_empty() {
            return Ok(Decoded::Unknown { opcode: None });
        }

        let mut reader = BitReader::new(body);
        let opcode = reader.read_uint(self.schema.opcode_bits)?;
        if opcode != self.schema.vote.opcode {
            return Ok(Decoded::Unknown {
                opcode: Some(opcode),
            });
        }

        let needed = self.schema.min_vote_bits();
        if reader.len < needed {
            return Err(DecodeError::Truncated {
                needed,
                available: reader.len,
            });
        }

        let layout = &self.schema.vote;
        let poll_id = reader.read_field("poll_id", layout.poll_id)?;
        let option_index = reader.read_field("option_index", layout.option_index)?;

        Ok(Decoded::Vote(VoteMessage {
            poll_id,
            option_index,
        }))
    }
}
