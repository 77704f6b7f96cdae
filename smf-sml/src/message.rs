//! SML message structure (§4.3): `(trx-id, group-no, abort-on-error,
//! choice{code, body}, crc16)`. The message's own CRC16 covers everything
//! but itself, independent of the envelope's outer CRC16 — a single bit
//! error is caught at whichever layer first reads the corrupted byte.
use std::io;

use smf_common::codec::{Decode, Encode};
use smf_common::crc16::crc16;

use crate::body::MessageBody;
use crate::tlv::TlvValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortOnError {
    Continue,
    Abort,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub trx_id: String,
    pub group_no: u8,
    pub abort_on_error: AbortOnError,
    pub body: MessageBody,
}

impl Message {
    pub fn new(trx_id: impl Into<String>, group_no: u8, body: MessageBody) -> Self {
        Message {
            trx_id: trx_id.into(),
            group_no,
            abort_on_error: AbortOnError::Continue,
            body,
        }
    }

    fn to_tlv(&self) -> TlvValue {
        TlvValue::List(vec![
            TlvValue::OctetString(self.trx_id.as_bytes().to_vec()),
            TlvValue::UnsignedInt(self.group_no as u64),
            TlvValue::UnsignedInt(match self.abort_on_error {
                AbortOnError::Continue => 0,
                AbortOnError::Abort => 1,
            }),
            TlvValue::UnsignedInt(self.body.choice_code() as u64),
            self.body.to_tlv(),
        ])
    }

    /// Encodes the message and appends its own CRC-16 trailer, computed
    /// over the TLV-encoded `(trx-id, group-no, abort-on-error, choice)`
    /// bytes.
    pub fn encode_with_crc(&self) -> Vec<u8> {
        let mut out = self.to_tlv().encode_to_vec();
        let crc = crc16(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    pub fn decode_with_crc(input: &[u8]) -> io::Result<(Message, usize)> {
        let mut cursor = io::Cursor::new(input);
        let tlv = TlvValue::decode(&mut cursor).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "malformed sml message tlv")
        })?;
        let body_len = cursor.position() as usize;
        let crc_bytes = input
            .get(body_len..body_len + 2)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated sml message crc"))?;
        let expected = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
        let actual = crc16(&input[..body_len]);
        if actual != expected {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "sml message crc mismatch"));
        }
        let fields = tlv
            .as_list()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "sml message is not a list"))?;
        if fields.len() != 5 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "sml message has the wrong field count"));
        }
        let trx_id = String::from_utf8(
            fields[0]
                .as_octet_string()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad trx-id field"))?
                .to_vec(),
        )
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let group_no = fields[1]
            .as_unsigned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad group-no field"))? as u8;
        let abort_on_error = match fields[2].as_unsigned() {
            Some(0) => AbortOnError::Continue,
            Some(1) => AbortOnError::Abort,
            _ => return Err(io::Error::new(io::ErrorKind::InvalidData, "bad abort-on-error field")),
        };
        let choice_code = fields[3]
            .as_unsigned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad choice code field"))? as u16;
        let body = MessageBody::from_tlv(choice_code, &fields[4])?;
        Ok((
            Message {
                trx_id,
                group_no,
                abort_on_error,
                body,
            },
            body_len + 2,
        ))
    }
}
