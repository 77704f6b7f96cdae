//! Push scheduling (§4.5): one task per `_PushOps` row. At boot the task
//! sleeps `delay`, then on every `interval` tick opens a push channel to
//! `target`, SML-encodes the most recent profile bucket, sends it as one or
//! more `transfer.pushdata` frames, and closes the channel. A failed open
//! retries with exponential back-off capped at `interval`, mirroring the
//! IP-T redundancy list's back-off shape (`smf_ipt::reconnect::Reconnector`)
//! but deterministic rather than randomized, since a push target is a
//! single fixed address rather than a list to cycle through.
use std::io::{self, Write};
use std::net::TcpStream;
use std::time::Duration;

use smf_ipt::command::Command;
use smf_ipt::framing::Frame;
use smf_ipt::login::{LoginRequest, LoginResponse};
use smf_ipt::push::{
    ClosePushChannelRequest, OpenPushChannelRequest, OpenPushChannelResponse, Status,
    TransferPushAck, TransferPushData,
};
use smf_sml::envelope::encode_envelope;
use smf_sml::{Message, MessageBody, TransactionIdGenerator};
use smf_sml::body::{GetProfileListResponse, ProfileEntry};
use smf_store::{Columns, Table};
use smf_types::{Obis, ServerId, SmlValue, WireValue};

use crate::profile::{Bucket, Profile};

pub const TABLE_NAME: &str = "_PushOps";

#[derive(Debug, Clone, PartialEq)]
pub struct PushOp {
    pub server_id: ServerId,
    pub push_id: u16,
    pub profile: Profile,
    pub interval: Duration,
    pub delay: Duration,
    pub target: String,
}

pub fn key(server_id: &ServerId, push_id: u16) -> Vec<WireValue> {
    vec![WireValue::Buffer(server_id.as_bytes().to_vec()), WireValue::U64(push_id as u64)]
}

fn profile_from_tag(tag: &str) -> Option<Profile> {
    Profile::ALL.into_iter().find(|p| p.table_name() == tag)
}

pub fn to_columns(op: &PushOp) -> Columns {
    let mut body = Columns::new();
    body.insert("profile".to_string(), WireValue::Str(op.profile.table_name().to_string()));
    body.insert("interval-ms".to_string(), WireValue::U64(op.interval.as_millis() as u64));
    body.insert("delay-ms".to_string(), WireValue::U64(op.delay.as_millis() as u64));
    body.insert("target".to_string(), WireValue::Str(op.target.clone()));
    body
}

pub fn from_row(server_id: ServerId, push_id: u16, body: &Columns) -> Option<PushOp> {
    let profile = match body.get("profile") {
        Some(WireValue::Str(tag)) => profile_from_tag(tag)?,
        _ => return None,
    };
    let interval = match body.get("interval-ms") {
        Some(WireValue::U64(ms)) => Duration::from_millis(*ms),
        _ => return None,
    };
    let delay = match body.get("delay-ms") {
        Some(WireValue::U64(ms)) => Duration::from_millis(*ms),
        _ => Duration::ZERO,
    };
    let target = match body.get("target") {
        Some(WireValue::Str(s)) => s.clone(),
        _ => return None,
    };
    Some(PushOp {
        server_id,
        push_id,
        profile,
        interval,
        delay,
        target,
    })
}

pub fn boot(table: &Table, op: &PushOp, source: &str) {
    table.merge(key(&op.server_id, op.push_id), to_columns(op), 1, source);
}

/// Exponential back-off for a single push op's open-channel retries,
/// doubling from the op's poll interval and capped at it — a busy target
/// is retried increasingly gently but never slower than the op's own
/// cadence would have retried anyway.
#[derive(Debug, Clone)]
pub struct PushBackoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl PushBackoff {
    pub fn new(interval: Duration) -> Self {
        PushBackoff {
            base: Duration::from_secs(1).min(interval),
            cap: interval,
            attempt: 0,
        }
    }

    /// Delay before the next retry, doubling each time this is called and
    /// never exceeding the op's interval.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 1u32 << self.attempt.min(20);
        self.attempt += 1;
        (self.base * factor).min(self.cap)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Turns a written bucket back into a push-ready SML `get-profile-list`
/// response, keeping only the mirrored codes the bucket actually carries a
/// column for.
pub fn profile_list_response(
    server_id: &ServerId,
    parameter_tree_path: Obis,
    codes: &[Obis],
    bucket: &Bucket,
    val_time: u32,
    reg_period: u32,
) -> GetProfileListResponse {
    let period_list = codes
        .iter()
        .filter_map(|code| {
            let column = bucket.body.get(&code.format())?;
            let (raw, scaler, unit) = match column {
                WireValue::Tuple(t) if t.len() == 3 => (
                    match &t[0] {
                        WireValue::I64(v) => *v,
                        _ => return None,
                    },
                    match &t[1] {
                        WireValue::I64(v) => *v as i8,
                        _ => return None,
                    },
                    match &t[2] {
                        WireValue::U64(v) => *v as u8,
                        _ => return None,
                    },
                ),
                _ => return None,
            };
            Some(ProfileEntry {
                obj_name: *code,
                status: None,
                val_time,
                unit,
                scaler,
                value: SmlValue::I64(raw),
            })
        })
        .collect();
    GetProfileListResponse {
        server_id: server_id.as_bytes().to_vec(),
        act_time: val_time,
        reg_period,
        parameter_tree_path,
        val_time,
        status: Some(0),
        period_list,
    }
}

/// Encodes a profile response as an SML message wrapped in its envelope —
/// exactly the bytes a `transfer.pushdata` sequence carries.
pub fn encode_for_push(trx: &TransactionIdGenerator, response: GetProfileListResponse) -> Vec<u8> {
    let message = Message::new(trx.next(), 0, MessageBody::GetProfileListRes(response));
    encode_envelope(&message.encode_with_crc())
}

/// Splits encoded SML bytes into as many `transfer.pushdata` frames as
/// `packet_size` requires, numbered from zero.
pub fn frames_for(channel: u32, source: u32, packet_size: u16, payload: &[u8]) -> Vec<TransferPushData> {
    if payload.is_empty() {
        return vec![TransferPushData {
            channel,
            source,
            status: Status::Success,
            block: 0,
            data: Vec::new(),
        }];
    }
    let chunk_len = packet_size.max(1) as usize;
    payload
        .chunks(chunk_len)
        .enumerate()
        .map(|(i, chunk)| TransferPushData {
            channel,
            source,
            status: Status::Success,
            block: i as u16,
            data: chunk.to_vec(),
        })
        .collect()
}

fn request_response(stream: &mut TcpStream, seq: u8, cmd: Command, payload: Vec<u8>) -> io::Result<Frame> {
    let frame = Frame::new(seq, cmd.code(), payload);
    stream.write_all(&frame.encode_public())?;
    Frame::decode_public(stream)
}

/// Real I/O shell for one push cycle: public login, open the channel named
/// by `op.target`, send the most recent bucket as one or more
/// `transfer.pushdata` frames, wait for its ack, close the channel. Mirrors
/// `readout::run_cycle`'s split — all the payload shaping above is pure and
/// unit-tested without a socket; this function is the thin part that
/// actually dials out. Each cycle dials its own connection rather than
/// riding a long-lived IP-T session: a push op's target is independent of
/// whatever session a concurrent device dialogue is using.
pub fn run_push_cycle(
    addr: &str,
    account: &str,
    pwd: &str,
    op: &PushOp,
    bucket: &Bucket,
    codes: &[Obis],
    trx: &TransactionIdGenerator,
) -> io::Result<()> {
    let mut stream = TcpStream::connect(addr)?;
    stream.set_nodelay(true).ok();

    let login = LoginRequest {
        account: account.to_string(),
        pwd: pwd.to_string(),
    };
    let reply = request_response(&mut stream, 1, Command::LoginPublicReq, login.to_payload())?;
    let response = LoginResponse::from_payload(&reply.payload)?;
    if !response.code.is_success() {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("ip-t login rejected: {:?}", response.code),
        ));
    }

    let open_req = OpenPushChannelRequest {
        target_name: op.target.clone(),
        device_id: None,
    };
    let reply = request_response(&mut stream, 2, Command::OpenPushChannelReq, open_req.to_payload())?;
    let open_res = OpenPushChannelResponse::from_payload(&reply.payload)?;
    if open_res.status != Status::Success {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("push target '{}' refused open", op.target),
        ));
    }

    let response = profile_list_response(
        &op.server_id,
        codes.first().copied().unwrap_or(smf_types::obis::dictionary::ACTIVE_ENERGY_TOTAL),
        codes,
        bucket,
        bucket.bucket_key as u32,
        op.profile.step_seconds() as u32,
    );
    let payload = encode_for_push(trx, response);
    let frames = frames_for(open_res.channel, open_res.source, open_res.packet_size, &payload);

    let mut seq: u8 = 3;
    for frame in frames {
        let reply = request_response(&mut stream, seq, Command::TransferPushDataReq, frame.to_payload())?;
        let ack = TransferPushAck::from_payload(&reply.payload)?;
        if ack.status != Status::Success {
            return Err(io::Error::new(io::ErrorKind::Other, "transfer.pushdata was not acked"));
        }
        seq = seq.wrapping_add(1).max(1);
    }

    let close_req = ClosePushChannelRequest { channel: open_res.channel };
    request_response(&mut stream, seq, Command::ClosePushChannelReq, close_req.to_payload())?;
    Ok(())
}
