//! SML envelope framing (§4.3): `1B 1B 1B 1B 01 01 01 01 … 1B 1B 1B 1B 1A
//! pad crc16`. The escape sequence brackets a run of TLV-encoded messages;
//! the trailer pads the run to a 4-byte boundary and protects everything
//! before it with a CRC-16/X-25.
use std::io;

use smf_common::crc16::crc16;

pub const START_SEQUENCE: [u8; 8] = [0x1B, 0x1B, 0x1B, 0x1B, 0x01, 0x01, 0x01, 0x01];
pub const END_MARK: [u8; 5] = [0x1B, 0x1B, 0x1B, 0x1B, 0x1A];

/// Wraps already-encoded message bytes in the start/end escape sequences,
/// pads to a 4-byte boundary and appends the CRC-16 trailer.
pub fn encode_envelope(body: &[u8]) -> Vec<u8> {
    let fixed_len = START_SEQUENCE.len() + END_MARK.len() + 1; // + pad-count byte
    let pad = (4 - (fixed_len + body.len()) % 4) % 4;

    let mut msg = Vec::with_capacity(fixed_len + body.len() + pad + 2);
    msg.extend_from_slice(&START_SEQUENCE);
    msg.extend_from_slice(body);
    msg.extend(std::iter::repeat(0u8).take(pad));
    msg.extend_from_slice(&END_MARK);
    msg.push(pad as u8);

    let crc = crc16(&msg);
    msg.extend_from_slice(&crc.to_le_bytes());
    msg
}

/// Unwraps an envelope, verifying the start sequence, end mark and CRC-16
/// trailer, and returns the message bytes with padding stripped.
pub fn decode_envelope(input: &[u8]) -> io::Result<Vec<u8>> {
    if input.len() < START_SEQUENCE.len() || input[..START_SEQUENCE.len()] != START_SEQUENCE {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "missing sml start sequence"));
    }
    let after_start = &input[START_SEQUENCE.len()..];
    let end_pos = find_subslice(after_start, &END_MARK)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing sml end mark"))?
        + START_SEQUENCE.len();

    let pad_count_pos = end_pos + END_MARK.len();
    let pad_count = *input
        .get(pad_count_pos)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated sml pad count"))? as usize;
    let crc_pos = pad_count_pos + 1;
    let crc_bytes = input
        .get(crc_pos..crc_pos + 2)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated sml crc"))?;
    let expected_crc = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
    let actual_crc = crc16(&input[..crc_pos]);
    if actual_crc != expected_crc {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "sml envelope crc mismatch"));
    }

    let body_and_pad = &input[START_SEQUENCE.len()..end_pos];
    let body_len = body_and_pad
        .len()
        .checked_sub(pad_count)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "sml pad count exceeds body length"))?;
    Ok(body_and_pad[..body_len].to_vec())
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_round_trips() {
        let envelope = encode_envelope(&[]);
        assert_eq!(decode_envelope(&envelope).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn arbitrary_body_round_trips_across_many_lengths() {
        for len in 0..40 {
            let body: Vec<u8> = (0..len).map(|i| (i * 3 + 1) as u8).collect();
            let envelope = encode_envelope(&body);
            assert_eq!((envelope.len() - 2) % 4, 0, "envelope must land on a 4-byte boundary before the crc trailer");
            assert_eq!(decode_envelope(&envelope).unwrap(), body);
        }
    }

    #[test]
    fn corrupted_byte_fails_crc_check() {
        let mut envelope = encode_envelope(b"payload-bytes");
        envelope[9] ^= 0xFF;
        assert!(decode_envelope(&envelope).is_err());
    }

    #[test]
    fn missing_start_sequence_is_rejected() {
        assert!(decode_envelope(&[0u8; 20]).is_err());
    }
}
