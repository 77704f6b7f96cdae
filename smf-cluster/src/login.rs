//! Login request/response framing for the cluster bus handshake, and the
//! pure decision function a master uses to accept or reject a login — kept
//! free of any socket so it is unit-testable without a TCP loopback.
use smf_types::{Uuid, WireValue};

use crate::record::CommandRecord;

pub const PROTOCOL_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct LoginRequest {
    pub version: u16,
    pub account: String,
    pub pwd: String,
    pub tag: Uuid,
    pub class: String,
    pub tz_offset: i32,
    pub timestamp: u64,
    pub autologin: bool,
    pub group: String,
    pub remote_ep: std::net::SocketAddr,
    pub platform: String,
    pub pid: u32,
}

impl LoginRequest {
    pub fn to_record(&self) -> CommandRecord {
        CommandRecord::new(
            crate::opcode::LOGIN_REQ,
            vec![
                WireValue::U64(self.version as u64),
                WireValue::Str(self.account.clone()),
                WireValue::Str(self.pwd.clone()),
                WireValue::Uuid(self.tag),
                WireValue::Str(self.class.clone()),
                WireValue::I64(self.tz_offset as i64),
                WireValue::TimePoint(self.timestamp),
                WireValue::Bool(self.autologin),
                WireValue::Str(self.group.clone()),
                WireValue::Endpoint(self.remote_ep),
                WireValue::Str(self.platform.clone()),
                WireValue::U64(self.pid as u64),
            ],
        )
    }

    pub fn from_record(record: &CommandRecord) -> Option<LoginRequest> {
        Some(LoginRequest {
            version: *record.arg(0)?.as_i64()? as u16,
            account: record.arg(1)?.as_str()?.to_string(),
            pwd: record.arg(2)?.as_str()?.to_string(),
            tag: match record.arg(3)? {
                WireValue::Uuid(u) => *u,
                _ => return None,
            },
            class: record.arg(4)?.as_str()?.to_string(),
            tz_offset: record.arg(5)?.as_i64()? as i32,
            timestamp: match record.arg(6)? {
                WireValue::TimePoint(t) => *t,
                _ => return None,
            },
            autologin: match record.arg(7)? {
                WireValue::Bool(b) => *b,
                _ => return None,
            },
            group: record.arg(8)?.as_str()?.to_string(),
            remote_ep: match record.arg(9)? {
                WireValue::Endpoint(e) => *e,
                _ => return None,
            },
            platform: record.arg(10)?.as_str()?.to_string(),
            pid: record.arg(11)?.as_i64()? as u32,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    VersionMismatch,
    BadCredentials,
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginResponse {
    pub outcome: LoginOutcome,
    pub ident: Uuid,
    pub version: u16,
    pub client_ts: u64,
    pub server_ts: u64,
}

impl LoginResponse {
    pub fn to_record(&self) -> CommandRecord {
        CommandRecord::new(
            crate::opcode::LOGIN_RES,
            vec![
                WireValue::Bool(self.outcome.is_success()),
                WireValue::Uuid(self.ident),
                WireValue::U64(self.version as u64),
                WireValue::TimePoint(self.client_ts),
                WireValue::TimePoint(self.server_ts),
            ],
        )
    }

    /// The wire form only carries a success flag, so a `VersionMismatch`
    /// rejection decodes back as `BadCredentials` — a client only needs to
    /// know whether to retry, not why it was refused.
    pub fn from_record(record: &CommandRecord) -> Option<LoginResponse> {
        let success = match record.arg(0)? {
            WireValue::Bool(b) => *b,
            _ => return None,
        };
        let ident = match record.arg(1)? {
            WireValue::Uuid(u) => *u,
            _ => return None,
        };
        let version = *record.arg(2)?.as_i64()? as u16;
        let client_ts = match record.arg(3)? {
            WireValue::TimePoint(t) => *t,
            _ => return None,
        };
        let server_ts = match record.arg(4)? {
            WireValue::TimePoint(t) => *t,
            _ => return None,
        };
        Some(LoginResponse {
            outcome: if success { LoginOutcome::Success } else { LoginOutcome::BadCredentials },
            ident,
            version,
            client_ts,
            server_ts,
        })
    }
}

/// Checks version and credentials the way the bus login handler does: a
/// version mismatch is reported distinctly from a credential mismatch
/// (both still yield a failure response, but a supervisor can log which).
/// Successful login is the caller's signal to insert the `_Cluster` row.
pub fn evaluate_login(
    request: &LoginRequest,
    expected_account: &str,
    expected_pwd: &str,
) -> LoginOutcome {
    if request.version != PROTOCOL_VERSION {
        return LoginOutcome::VersionMismatch;
    }
    if request.account != expected_account || request.pwd != expected_pwd {
        return LoginOutcome::BadCredentials;
    }
    LoginOutcome::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> LoginRequest {
        LoginRequest {
            version: PROTOCOL_VERSION,
            account: "root".into(),
            pwd: "root".into(),
            tag: Uuid::new_random(),
            class: "gateway".into(),
            tz_offset: -180,
            timestamp: 1_700_000_000,
            autologin: true,
            group: "default".into(),
            remote_ep: "10.0.0.5:7000".parse().unwrap(),
            platform: "linux".into(),
            pid: 4242,
        }
    }

    #[test]
    fn login_request_round_trips_through_a_record() {
        let req = sample_request();
        let record = req.to_record();
        let parsed = LoginRequest::from_record(&record).unwrap();
        assert_eq!(parsed, req);
    }

    #[test]
    fn login_response_round_trips_through_a_record() {
        let response = LoginResponse {
            outcome: LoginOutcome::Success,
            ident: Uuid::new_random(),
            version: PROTOCOL_VERSION,
            client_ts: 1_700_000_000,
            server_ts: 1_700_000_005,
        };
        let record = response.to_record();
        let parsed = LoginResponse::from_record(&record).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn correct_credentials_succeed() {
        let req = sample_request();
        assert_eq!(evaluate_login(&req, "root", "root"), LoginOutcome::Success);
    }

    #[test]
    fn wrong_password_fails_with_bad_credentials() {
        let req = sample_request();
        assert_eq!(
            evaluate_login(&req, "root", "other"),
            LoginOutcome::BadCredentials
        );
    }

    #[test]
    fn mismatched_version_is_reported_distinctly() {
        let mut req = sample_request();
        req.version = PROTOCOL_VERSION + 1;
        assert_eq!(
            evaluate_login(&req, "root", "root"),
            LoginOutcome::VersionMismatch
        );
    }
}
