//! The gateway's device-facing IP-T accept loop (§4.2, §4.3): one thread
//! per accepted device connection, driving the full gatekeeper →
//! authorized → connected/watchdog session through `smf_sml::proxy`'s
//! state machine over a real socket. Push-target registration and
//! transparent-connection bookkeeping are reported to the configured
//! cluster master (if any) via a `ClusterClient`, the same way the master
//! itself reports `_Cluster` rows on login (`smf_cluster::master`).
use std::io::{self, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use smf_cluster::ClusterClient;
use smf_common::logger::Logger;
use smf_ipt::command::Command;
use smf_ipt::connection::{CloseConnectionRequest, OpenConnectionRequest, OpenConnectionResponse};
use smf_ipt::framing::{Frame, ESCAPE_SEQUENCE};
use smf_ipt::login::{LoginRequest, LoginResponse, ResponseCode};
use smf_ipt::push::{RegisterPushTargetRequest, RegisterPushTargetResponse, Status};
use smf_ipt::scramble::{ScrambleCursor, ScrambleKey};
use smf_sml::proxy::{transition, ConnectionKind, Effect, ProxyEvent, ProxyState};
use smf_store::{Columns, Row};
use smf_types::WireValue;

const GATEKEEPER_TIMEOUT: Duration = Duration::from_secs(30);
const WATCHDOG_PERIOD_MINUTES: u16 = 1;

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub struct IptListener {
    pub account: String,
    pub pwd: String,
    pub logger: Logger,
    pub cluster: Option<Arc<ClusterClient>>,
}

impl IptListener {
    pub fn new(account: String, pwd: String, logger: Logger, cluster: Option<Arc<ClusterClient>>) -> Self {
        IptListener { account, pwd, logger, cluster }
    }

    /// Blocks, accepting device connections and spawning one thread per
    /// session — sockets are owned by exactly one task, never shared.
    pub fn run(self, listener: TcpListener) {
        for incoming in listener.incoming() {
            match incoming {
                Ok(stream) => {
                    let account = self.account.clone();
                    let pwd = self.pwd.clone();
                    let logger = self.logger.clone();
                    let cluster = self.cluster.clone();
                    std::thread::spawn(move || handle_session(stream, &account, &pwd, &logger, cluster.as_ref()));
                }
                Err(e) => self.logger.warn("ipt-listener", &format!("accept error: {e}")),
            }
        }
    }
}

fn read_frame(stream: &mut TcpStream, scrambled: bool, cursor: &mut ScrambleCursor) -> io::Result<Frame> {
    if scrambled {
        Frame::decode_scrambled(stream, cursor)
    } else {
        Frame::decode_public(stream)
    }
}

fn write_frame(stream: &mut TcpStream, scrambled: bool, cursor: &mut ScrambleCursor, frame: &Frame) -> io::Result<()> {
    let bytes = if scrambled {
        frame.encode_scrambled(cursor)
    } else {
        frame.encode_public()
    };
    stream.write_all(&bytes)
}

fn session_row(account: &str, owner_tag: &str) -> Row {
    let mut body = Columns::new();
    body.insert("local-peer".to_string(), WireValue::Str(owner_tag.to_string()));
    body.insert("login-time".to_string(), WireValue::TimePoint(now_unix()));
    Row::new(vec![WireValue::Str(account.to_string())], body, 1, owner_tag.to_string())
}

fn target_row(target_name: &str, account: &str, owner_tag: &str) -> Row {
    let mut body = Columns::new();
    body.insert("owner-tag".to_string(), WireValue::Str(owner_tag.to_string()));
    body.insert("account".to_string(), WireValue::Str(account.to_string()));
    Row::new(vec![WireValue::Str(target_name.to_string())], body, 1, owner_tag.to_string())
}

fn connection_row(account: &str, number: u32, owner_tag: &str) -> Row {
    let mut body = Columns::new();
    body.insert("local-peer".to_string(), WireValue::Str(owner_tag.to_string()));
    body.insert("remote-peer".to_string(), WireValue::Str(format!("{account}#{number}")));
    Row::new(
        vec![WireValue::Str(account.to_string()), WireValue::U64(number as u64)],
        body,
        1,
        owner_tag.to_string(),
    )
}

fn report_insert(cluster: Option<&Arc<ClusterClient>>, logger: &Logger, table: &str, row: &Row) {
    if let Some(cluster) = cluster {
        if let Err(e) = cluster.report_insert(table, row) {
            logger.warn("ipt-listener", &format!("failed to report {table} row to cluster: {e}"));
        }
    }
}

fn report_remove(cluster: Option<&Arc<ClusterClient>>, logger: &Logger, table: &str, row: &Row) {
    if let Some(cluster) = cluster {
        if let Err(e) = cluster.report_remove(table, row) {
            logger.warn("ipt-listener", &format!("failed to report {table} removal to cluster: {e}"));
        }
    }
}

/// Applies the effects `transition` returned that this shell can act on
/// without a frame already in hand (`LogWarning`, `Close`); the effects
/// that do carry a frame (`SendLoginResponse`, `SendCloseResponse`, …) are
/// written by the caller directly, since only it has the seq/cursor needed
/// to frame them.
fn log_effects(effects: &[Effect], logger: &Logger, account: &str) {
    for effect in effects {
        if let Effect::LogWarning(msg) = effect {
            logger.warn("ipt-listener", &format!("'{account}': {msg}"));
        }
    }
}

fn handle_session(mut stream: TcpStream, account: &str, pwd: &str, logger: &Logger, cluster: Option<&Arc<ClusterClient>>) {
    stream.set_read_timeout(Some(GATEKEEPER_TIMEOUT)).ok();

    let mut peek = [0u8; 4];
    let scrambled = matches!(stream.peek(&mut peek), Ok(4) if peek == ESCAPE_SEQUENCE);
    let mut rx_cursor = ScrambleCursor::new(ScrambleKey::default_key());
    let mut tx_cursor = ScrambleCursor::new(ScrambleKey::default_key());

    let first = match read_frame(&mut stream, scrambled, &mut rx_cursor) {
        Ok(f) => f,
        Err(e) => {
            logger.warn("ipt-listener", &format!("gatekeeper timeout or bad frame: {e}"));
            return;
        }
    };

    let expected = if scrambled { Command::LoginScrambledReq } else { Command::LoginPublicReq };
    if Command::from_code(first.cmd) != expected {
        logger.warn("ipt-listener", "first frame was not a login request; closing");
        return;
    }

    let login = match LoginRequest::from_payload(&first.payload) {
        Ok(l) => l,
        Err(e) => {
            logger.warn("ipt-listener", &format!("malformed login request: {e}"));
            return;
        }
    };

    let accepted = login.account == account && login.pwd == pwd;
    let (mut state, effects) = transition(
        ProxyState::Idle,
        if accepted { ProxyEvent::LoginOk } else { ProxyEvent::LoginFailed },
    );
    log_effects(&effects, logger, &login.account);

    let new_sk = if scrambled && accepted { Some(ScrambleKey::random()) } else { None };
    let response = LoginResponse {
        code: if accepted { ResponseCode::Success } else { ResponseCode::UnknownAccount },
        watchdog_period: WATCHDOG_PERIOD_MINUTES,
        redirect: None,
        new_sk,
    };
    let reply_cmd = if scrambled { Command::LoginScrambledRes } else { Command::LoginPublicRes };
    let reply = Frame::new(first.seq, reply_cmd.code(), response.to_payload());
    if write_frame(&mut stream, scrambled, &mut tx_cursor, &reply).is_err() {
        return;
    }

    // Both directions install the fresh key only after the final byte of
    // the response above is written — never mid-frame.
    if let Some(sk) = new_sk {
        tx_cursor.rekey(sk);
        rx_cursor.rekey(sk);
    }

    if !accepted {
        logger.warn("ipt-listener", &format!("rejected login from account '{}'", login.account));
        return;
    }
    logger.info(
        "ipt-listener",
        &format!("device '{}' authorized{}", login.account, if scrambled { " (scrambled)" } else { "" }),
    );

    let owner_tag = cluster.map(|c| c.tag.to_string()).unwrap_or_else(|| "local".to_string());
    report_insert(cluster, logger, "_Session", &session_row(&login.account, &owner_tag));

    stream
        .set_read_timeout(Some(Duration::from_secs(WATCHDOG_PERIOD_MINUTES as u64 * 60 * 3)))
        .ok();

    let mut last_seen = Instant::now();
    let mut next_channel: u32 = 1;
    let mut open_connection: Option<u32> = None;

    loop {
        let frame = match read_frame(&mut stream, scrambled, &mut rx_cursor) {
            Ok(f) => f,
            Err(e) => {
                logger.warn(
                    "ipt-listener",
                    &format!("session for '{}' ended after {:?}: {e}", login.account, last_seen.elapsed()),
                );
                break;
            }
        };
        last_seen = Instant::now();

        match Command::from_code(frame.cmd) {
            Command::WatchdogReq => {
                let ack = Frame::new(frame.seq, Command::WatchdogRes.code(), Vec::new());
                if write_frame(&mut stream, scrambled, &mut tx_cursor, &ack).is_err() {
                    break;
                }
            }
            Command::RegisterPushTargetReq => {
                let req = match RegisterPushTargetRequest::from_payload(&frame.payload) {
                    Ok(r) => r,
                    Err(e) => {
                        logger.warn("ipt-listener", &format!("malformed register-push-target request: {e}"));
                        continue;
                    }
                };
                let channel = next_channel;
                next_channel += 1;
                let res = RegisterPushTargetResponse { status: Status::Success, channel };
                let reply = Frame::new(frame.seq, Command::RegisterPushTargetRes.code(), res.to_payload());
                if write_frame(&mut stream, scrambled, &mut tx_cursor, &reply).is_err() {
                    break;
                }
                report_insert(cluster, logger, "_Target", &target_row(&req.target_name, &login.account, &owner_tag));
            }
            Command::OpenConnectionReq => {
                let req = match OpenConnectionRequest::from_payload(&frame.payload) {
                    Ok(r) => r,
                    Err(e) => {
                        logger.warn("ipt-listener", &format!("malformed open-connection request: {e}"));
                        continue;
                    }
                };
                let (next_state, effects) = transition(state, ProxyEvent::OpenConnectionRequested);
                state = next_state;
                log_effects(&effects, logger, &login.account);
                // No remote routing table exists yet; every request resolves
                // locally and immediately.
                let (next_state, effects) = transition(
                    state,
                    ProxyEvent::OpenConnectionResolved { success: true, kind: ConnectionKind::Local },
                );
                state = next_state;
                log_effects(&effects, logger, &login.account);

                let res = OpenConnectionResponse { success: true };
                let reply = Frame::new(frame.seq, Command::OpenConnectionRes.code(), res.to_payload());
                if write_frame(&mut stream, scrambled, &mut tx_cursor, &reply).is_err() {
                    break;
                }
                open_connection = Some(req.number);
                report_insert(cluster, logger, "_Connection", &connection_row(&login.account, req.number, &owner_tag));
            }
            Command::CloseConnectionReq => {
                let _ = CloseConnectionRequest::from_payload(&frame.payload);
                let (next_state, effects) = transition(state, ProxyEvent::CloseConnectionRequested);
                state = next_state;
                log_effects(&effects, logger, &login.account);
                let (next_state, effects) = transition(state, ProxyEvent::CloseConnectionResolved);
                state = next_state;
                log_effects(&effects, logger, &login.account);

                let ack = Frame::new(frame.seq, Command::CloseConnectionRes.code(), Vec::new());
                if write_frame(&mut stream, scrambled, &mut tx_cursor, &ack).is_err() {
                    break;
                }
                if let Some(number) = open_connection.take() {
                    report_remove(cluster, logger, "_Connection", &connection_row(&login.account, number, &owner_tag));
                }
            }
            other => {
                logger.warn("ipt-listener", &format!("unhandled command {other} from '{}'", login.account));
            }
        }
    }

    if let Some(number) = open_connection {
        report_remove(cluster, logger, "_Connection", &connection_row(&login.account, number, &owner_tag));
    }
    report_remove(cluster, logger, "_Session", &session_row(&login.account, &owner_tag));
}
