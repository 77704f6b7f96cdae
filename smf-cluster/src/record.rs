//! The cluster bus wire record: a length-delimited frame carrying a
//! symbolic opcode and a self-describing argument list, in the manner of
//! the teacher's `ClusterMessage` (header + payload) — except the payload
//! here is never a closed per-message-type enum, it is always the same
//! `(opcode, args)` shape, and the opcode alone selects how a handler reads
//! `args`. This matches the bus's actual wire model: one record shape,
//! dispatch by string.
use std::io::{self, Cursor, Read};

use smf_common::codec::{read_u32_be, Decode, Encode};
use smf_types::WireValue;

#[derive(Debug, Clone, PartialEq)]
pub struct CommandRecord {
    pub opcode: String,
    pub args: Vec<WireValue>,
}

impl CommandRecord {
    pub fn new(opcode: impl Into<String>, args: Vec<WireValue>) -> Self {
        CommandRecord {
            opcode: opcode.into(),
            args,
        }
    }

    pub fn arg(&self, index: usize) -> Option<&WireValue> {
        self.args.get(index)
    }
}

fn encode_body(record: &CommandRecord) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(record.opcode.len() as u32).to_be_bytes());
    body.extend_from_slice(record.opcode.as_bytes());
    body.extend_from_slice(&(record.args.len() as u32).to_be_bytes());
    for arg in &record.args {
        arg.encode(&mut body);
    }
    body
}

impl Encode for CommandRecord {
    fn encode(&self, out: &mut Vec<u8>) {
        let body = encode_body(self);
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&body);
    }
}

impl Decode for CommandRecord {
    fn decode<R: Read>(input: &mut R) -> io::Result<Self> {
        let len = read_u32_be(input)?;
        let mut body = vec![0u8; len as usize];
        input.read_exact(&mut body)?;
        let mut cursor = Cursor::new(body);

        let opcode_len = read_u32_be(&mut cursor)?;
        let mut opcode_bytes = vec![0u8; opcode_len as usize];
        cursor.read_exact(&mut opcode_bytes)?;
        let opcode = String::from_utf8(opcode_bytes)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "opcode is not valid utf-8"))?;

        let arg_count = read_u32_be(&mut cursor)?;
        let mut args = Vec::with_capacity(arg_count.min(64) as usize);
        for _ in 0..arg_count {
            args.push(WireValue::decode(&mut cursor)?);
        }

        Ok(CommandRecord { opcode, args })
    }
}
