//! Push channel payloads (§4.2): a registered target accepts a fan-out of
//! `transfer.pushdata` frames carrying serialized SML, acknowledged by
//! `(channel, source)` plus a status byte.
use std::io;

fn write_str(out: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    out.push(bytes.len() as u8);
    out.extend_from_slice(bytes);
}

fn read_str(input: &[u8], pos: &mut usize) -> io::Result<String> {
    let len = *input
        .get(*pos)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated string length"))? as usize;
    *pos += 1;
    let bytes = input
        .get(*pos..*pos + len)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated string body"))?;
    *pos += len;
    String::from_utf8(bytes.to_vec()).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn read_u32(input: &[u8], pos: &mut usize) -> io::Result<u32> {
    let bytes: [u8; 4] = input
        .get(*pos..*pos + 4)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated u32"))?
        .try_into()
        .unwrap();
    *pos += 4;
    Ok(u32::from_le_bytes(bytes))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterPushTargetRequest {
    pub target_name: String,
    pub packet_size: u16,
    pub window_size: u16,
}

impl RegisterPushTargetRequest {
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_str(&mut out, &self.target_name);
        out.extend_from_slice(&self.packet_size.to_le_bytes());
        out.extend_from_slice(&self.window_size.to_le_bytes());
        out
    }

    pub fn from_payload(payload: &[u8]) -> io::Result<RegisterPushTargetRequest> {
        let mut pos = 0;
        let target_name = read_str(payload, &mut pos)?;
        let packet_size = u16::from_le_bytes(
            payload
                .get(pos..pos + 2)
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated packet size"))?
                .try_into()
                .unwrap(),
        );
        pos += 2;
        let window_size = u16::from_le_bytes(
            payload
                .get(pos..pos + 2)
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated window size"))?
                .try_into()
                .unwrap(),
        );
        Ok(RegisterPushTargetRequest {
            target_name,
            packet_size,
            window_size,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
}

impl Status {
    fn from_byte(b: u8) -> Status {
        if b == 0 {
            Status::Success
        } else {
            Status::Failure
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            Status::Success => 0,
            Status::Failure => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterPushTargetResponse {
    pub status: Status,
    pub channel: u32,
}

impl RegisterPushTargetResponse {
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.status.to_byte());
        out.extend_from_slice(&self.channel.to_le_bytes());
        out
    }

    pub fn from_payload(payload: &[u8]) -> io::Result<RegisterPushTargetResponse> {
        let mut pos = 0;
        let status = Status::from_byte(*payload
            .first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "empty response"))?);
        pos += 1;
        let channel = read_u32(payload, &mut pos)?;
        Ok(RegisterPushTargetResponse { status, channel })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenPushChannelRequest {
    pub target_name: String,
    pub device_id: Option<String>,
}

impl OpenPushChannelRequest {
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_str(&mut out, &self.target_name);
        match &self.device_id {
            Some(id) => {
                out.push(1);
                write_str(&mut out, id);
            }
            None => out.push(0),
        }
        out
    }

    pub fn from_payload(payload: &[u8]) -> io::Result<OpenPushChannelRequest> {
        let mut pos = 0;
        let target_name = read_str(payload, &mut pos)?;
        let has_device = *payload
            .get(pos)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated device flag"))?;
        pos += 1;
        let device_id = if has_device != 0 {
            Some(read_str(payload, &mut pos)?)
        } else {
            None
        };
        Ok(OpenPushChannelRequest {
            target_name,
            device_id,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenPushChannelResponse {
    pub channel: u32,
    pub source: u32,
    pub packet_size: u16,
    pub window_size: u16,
    pub status: Status,
}

impl OpenPushChannelResponse {
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.channel.to_le_bytes());
        out.extend_from_slice(&self.source.to_le_bytes());
        out.extend_from_slice(&self.packet_size.to_le_bytes());
        out.extend_from_slice(&self.window_size.to_le_bytes());
        out.push(self.status.to_byte());
        out
    }

    pub fn from_payload(payload: &[u8]) -> io::Result<OpenPushChannelResponse> {
        let mut pos = 0;
        let channel = read_u32(payload, &mut pos)?;
        let source = read_u32(payload, &mut pos)?;
        let packet_size = u16::from_le_bytes(
            payload
                .get(pos..pos + 2)
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated packet size"))?
                .try_into()
                .unwrap(),
        );
        pos += 2;
        let window_size = u16::from_le_bytes(
            payload
                .get(pos..pos + 2)
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated window size"))?
                .try_into()
                .unwrap(),
        );
        pos += 2;
        let status = Status::from_byte(*payload
            .get(pos)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated status"))?);
        Ok(OpenPushChannelResponse {
            channel,
            source,
            packet_size,
            window_size,
            status,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosePushChannelRequest {
    pub channel: u32,
}

impl ClosePushChannelRequest {
    pub fn to_payload(&self) -> Vec<u8> {
        self.channel.to_le_bytes().to_vec()
    }

    pub fn from_payload(payload: &[u8]) -> io::Result<ClosePushChannelRequest> {
        let mut pos = 0;
        Ok(ClosePushChannelRequest {
            channel: read_u32(payload, &mut pos)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPushData {
    pub channel: u32,
    pub source: u32,
    pub status: Status,
    pub block: u16,
    pub data: Vec<u8>,
}

impl TransferPushData {
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.channel.to_le_bytes());
        out.extend_from_slice(&self.source.to_le_bytes());
        out.push(self.status.to_byte());
        out.extend_from_slice(&self.block.to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    pub fn from_payload(payload: &[u8]) -> io::Result<TransferPushData> {
        let mut pos = 0;
        let channel = read_u32(payload, &mut pos)?;
        let source = read_u32(payload, &mut pos)?;
        let status = Status::from_byte(*payload
            .get(pos)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated status"))?);
        pos += 1;
        let block = u16::from_le_bytes(
            payload
                .get(pos..pos + 2)
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated block"))?
                .try_into()
                .unwrap(),
        );
        pos += 2;
        let data = payload[pos..].to_vec();
        Ok(TransferPushData {
            channel,
            source,
            status,
            block,
            data,
        })
    }

    /// The ack a responder sends back: same `(channel, source)`, its own
    /// status, no payload.
    pub fn ack(&self, status: Status) -> TransferPushAck {
        TransferPushAck {
            channel: self.channel,
            source: self.source,
            status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPushAck {
    pub channel: u32,
    pub source: u32,
    pub status: Status,
}

impl TransferPushAck {
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.channel.to_le_bytes());
        out.extend_from_slice(&self.source.to_le_bytes());
        out.push(self.status.to_byte());
        out
    }

    pub fn from_payload(payload: &[u8]) -> io::Result<TransferPushAck> {
        let mut pos = 0;
        let channel = read_u32(payload, &mut pos)?;
        let source = read_u32(payload, &mut pos)?;
        let status = Status::from_byte(*payload
            .get(pos)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated status"))?);
        Ok(TransferPushAck {
            channel,
            source,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_push_target_request_round_trips() {
        let req = RegisterPushTargetRequest {
            target_name: "data.sink.1".into(),
            packet_size: 0xFFFF,
            window_size: 1,
        };
        assert_eq!(
            RegisterPushTargetRequest::from_payload(&req.to_payload()).unwrap(),
            req
        );
    }

    #[test]
    fn register_push_target_response_round_trips() {
        let res = RegisterPushTargetResponse {
            status: Status::Success,
            channel: 1,
        };
        assert_eq!(
            RegisterPushTargetResponse::from_payload(&res.to_payload()).unwrap(),
            res
        );
    }

    #[test]
    fn open_push_channel_round_trips_with_and_without_device_id() {
        let with_id = OpenPushChannelRequest {
            target_name: "sink".into(),
            device_id: Some("dev-1".into()),
        };
        assert_eq!(
            OpenPushChannelRequest::from_payload(&with_id.to_payload()).unwrap(),
            with_id
        );
        let without_id = OpenPushChannelRequest {
            target_name: "sink".into(),
            device_id: None,
        };
        assert_eq!(
            OpenPushChannelRequest::from_payload(&without_id.to_payload()).unwrap(),
            without_id
        );
    }

    #[test]
    fn open_push_channel_response_round_trips() {
        let res = OpenPushChannelResponse {
            channel: 7,
            source: 99,
            packet_size: 512,
            window_size: 4,
            status: Status::Success,
        };
        assert_eq!(
            OpenPushChannelResponse::from_payload(&res.to_payload()).unwrap(),
            res
        );
    }

    #[test]
    fn transfer_pushdata_round_trips_and_acks_same_channel_source() {
        let msg = TransferPushData {
            channel: 1,
            source: 2,
            status: Status::Success,
            block: 0,
            data: vec![1, 2, 3, 4, 5],
        };
        let decoded = TransferPushData::from_payload(&msg.to_payload()).unwrap();
        assert_eq!(decoded, msg);

        let ack = msg.ack(Status::Success);
        assert_eq!(ack.channel, msg.channel);
        assert_eq!(ack.source, msg.source);
        let decoded_ack = TransferPushAck::from_payload(&ack.to_payload()).unwrap();
        assert_eq!(decoded_ack, ack);
    }
}
