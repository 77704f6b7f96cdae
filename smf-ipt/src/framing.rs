//! IP-T record framing (§4.2): `(length:u32-le, seq:u8, cmd:u16-le, payload)`.
//! Two framing modes share this header layout: public frames are written as
//! plaintext, scrambled frames are the same bytes XORed against a
//! stateful keystream and prefixed with a dedicated escape sequence that
//! marks the record boundary.
use std::io::{self, Read};

use crate::scramble::ScrambleCursor;

/// Marks the start of a scrambled record. Distinct from the SML envelope's
/// own `1B 1B 1B 1B` escape — the two framings never appear on the same
/// wire — but the same repeated-byte convention, so a packet sniffer
/// recognizes both at a glance.
pub const ESCAPE_SEQUENCE: [u8; 4] = [0x1B, 0x1B, 0x1B, 0x1B];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub seq: u8,
    pub cmd: u16,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(seq: u8, cmd: u16, payload: Vec<u8>) -> Self {
        Frame { seq, cmd, payload }
    }

    fn header_and_payload(&self) -> Vec<u8> {
        let len = 1u32 + 2 + self.payload.len() as u32;
        let mut out = Vec::with_capacity(4 + len as usize);
        out.extend_from_slice(&len.to_le_bytes());
        out.push(self.seq);
        out.extend_from_slice(&self.cmd.to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    fn from_body(body: &[u8]) -> io::Result<Frame> {
        if body.len() < 3 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "ip-t frame body too short"));
        }
        let seq = body[0];
        let cmd = u16::from_le_bytes([body[1], body[2]]);
        let payload = body[3..].to_vec();
        Ok(Frame { seq, cmd, payload })
    }

    pub fn encode_public(&self) -> Vec<u8> {
        self.header_and_payload()
    }

    pub fn decode_public<R: Read>(input: &mut R) -> io::Result<Frame> {
        let len = read_len(input)?;
        let mut body = vec![0u8; len as usize];
        input.read_exact(&mut body)?;
        Frame::from_body(&body)
    }

    pub fn encode_scrambled(&self, cursor: &mut ScrambleCursor) -> Vec<u8> {
        let mut bytes = self.header_and_payload();
        cursor.apply(&mut bytes);
        let mut out = Vec::with_capacity(4 + bytes.len());
        out.extend_from_slice(&ESCAPE_SEQUENCE);
        out.extend_from_slice(&bytes);
        out
    }

    pub fn decode_scrambled<R: Read>(input: &mut R, cursor: &mut ScrambleCursor) -> io::Result<Frame> {
        let mut esc = [0u8; 4];
        input.read_exact(&mut esc)?;
        if esc != ESCAPE_SEQUENCE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "missing scrambled frame escape sequence",
            ));
        }
        let mut len_bytes = [0u8; 4];
        input.read_exact(&mut len_bytes)?;
        cursor.apply(&mut len_bytes);
        let len = u32::from_le_bytes(len_bytes);
        let mut body = vec![0u8; len as usize];
        input.read_exact(&mut body)?;
        cursor.apply(&mut body);
        Frame::from_body(&body)
    }
}

fn read_len<R: Read>(input: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scramble::ScrambleKey;
    use std::io::Cursor;

    #[test]
    fn public_frame_round_trips() {
        let frame = Frame::new(1, 0xC001, b"payload".to_vec());
        let bytes = frame.encode_public();
        let mut cursor = Cursor::new(bytes);
        assert_eq!(Frame::decode_public(&mut cursor).unwrap(), frame);
    }

    #[test]
    fn scrambled_frame_round_trips_with_any_key_and_size() {
        for seed in 0u32..50 {
            let mut key = [0u8; 32];
            for (i, b) in key.iter_mut().enumerate() {
                *b = ((seed as usize + i * 7) % 256) as u8;
            }
            let sk = ScrambleKey(key);
            let payload_len = 1 + (seed as usize * 83) % 4096;
            let payload: Vec<u8> = (0..payload_len).map(|i| (i % 256) as u8).collect();
            let frame = Frame::new((seed % 255) as u8 + 1, 0x9002, payload);

            let mut tx_cursor = ScrambleCursor::new(sk);
            let bytes = frame.encode_scrambled(&mut tx_cursor);

            let mut rx_cursor = ScrambleCursor::new(sk);
            let mut cursor = Cursor::new(bytes);
            let decoded = Frame::decode_scrambled(&mut cursor, &mut rx_cursor).unwrap();
            assert_eq!(decoded, frame);
        }
    }

    #[test]
    fn mixing_keys_across_sides_fails() {
        let frame = Frame::new(1, 0x9002, vec![1, 2, 3, 4]);
        let mut tx_cursor = ScrambleCursor::new(ScrambleKey([1u8; 32]));
        let bytes = frame.encode_scrambled(&mut tx_cursor);

        let mut rx_cursor = ScrambleCursor::new(ScrambleKey([2u8; 32]));
        let mut cursor = Cursor::new(bytes);
        let decoded = Frame::decode_scrambled(&mut cursor, &mut rx_cursor).unwrap();
        assert_ne!(decoded, frame);
    }

    #[test]
    fn cursor_continues_across_multiple_frames_on_the_same_session() {
        let sk = ScrambleKey([9u8; 32]);
        let frame_a = Frame::new(1, 0x9002, vec![1, 2, 3]);
        let frame_b = Frame::new(2, 0x9002, vec![4, 5, 6, 7]);

        let mut tx_cursor = ScrambleCursor::new(sk);
        let mut bytes = frame_a.encode_scrambled(&mut tx_cursor);
        bytes.extend(frame_b.encode_scrambled(&mut tx_cursor));

        let mut rx_cursor = ScrambleCursor::new(sk);
        let mut cursor = Cursor::new(bytes);
        assert_eq!(Frame::decode_scrambled(&mut cursor, &mut rx_cursor).unwrap(), frame_a);
        assert_eq!(Frame::decode_scrambled(&mut cursor, &mut rx_cursor).unwrap(), frame_b);
    }

    #[test]
    fn missing_escape_sequence_is_rejected() {
        let mut cursor = Cursor::new(vec![0u8, 1, 2, 3, 4, 5, 6, 7]);
        let mut rx_cursor = ScrambleCursor::new(ScrambleKey([1u8; 32]));
        assert!(Frame::decode_scrambled(&mut cursor, &mut rx_cursor).is_err());
    }
}
