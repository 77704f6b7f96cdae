//! A deliberately small WebSocket implementation (RFC 6455) — just enough
//! to carry the `{cmd, channel, rec}` JSON frames §6 describes over one
//! thread per connection, matching the document root's own plain-socket
//! style rather than pulling in an async server stack.
use std::io::{self, Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha1::{Digest, Sha1};

const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes the `Sec-WebSocket-Accept` value from a client's
/// `Sec-WebSocket-Key` header, per the handshake's fixed GUID concatenation.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    fn from_u8(b: u8) -> Option<Opcode> {
        match b {
            0x0 => Some(Opcode::Continuation),
            0x1 => Some(Opcode::Text),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WsFrame {
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

/// Reads one frame from a client, unmasking its payload. Clients are
/// required to mask every frame they send; a server never masks its own.
pub fn read_frame<R: Read>(input: &mut R) -> io::Result<WsFrame> {
    let mut header = [0u8; 2];
    input.read_exact(&mut header)?;
    let opcode = Opcode::from_u8(header[0] & 0x0F)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unknown websocket opcode"))?;
    let masked = header[1] & 0x80 != 0;
    let len_field = header[1] & 0x7F;

    let payload_len = match len_field {
        126 => {
            let mut ext = [0u8; 2];
            input.read_exact(&mut ext)?;
            u16::from_be_bytes(ext) as u64
        }
        127 => {
            let mut ext = [0u8; 8];
            input.read_exact(&mut ext)?;
            u64::from_be_bytes(ext)
        }
        n => n as u64,
    };

    let mask = if masked {
        let mut m = [0u8; 4];
        input.read_exact(&mut m)?;
        Some(m)
    } else {
        None
    };

    let mut payload = vec![0u8; payload_len as usize];
    input.read_exact(&mut payload)?;
    if let Some(mask) = mask {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= mask[i % 4];
        }
    }

    Ok(WsFrame { opcode, payload })
}

/// Writes one unmasked frame, as a server always sends.
pub fn write_frame<W: Write>(output: &mut W, opcode: Opcode, payload: &[u8]) -> io::Result<()> {
    let mut out = Vec::with_capacity(payload.len() + 10);
    out.push(0x80 | opcode.to_u8());
    let len = payload.len();
    if len < 126 {
        out.push(len as u8);
    } else if len <= u16::MAX as usize {
        out.push(126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }
    out.extend_from_slice(payload);
    output.write_all(&out)
}

pub fn write_text<W: Write>(output: &mut W, text: &str) -> io::Result<()> {
    write_frame(output, Opcode::Text, text.as_bytes())
}

pub fn write_close<W: Write>(output: &mut W) -> io::Result<()> {
    write_frame(output, Opcode::Close, &[])
}
