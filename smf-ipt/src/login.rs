//! IP-T login request/response payloads (§4.2). Unlike the cluster bus,
//! IP-T payloads are flat proprietary binary, not a self-describing value
//! lattice, so encode/decode here work directly on byte buffers rather than
//! going through `smf_types::WireValue`.
use std::io;

use crate::scramble::ScrambleKey;

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

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub account: String,
    pub pwd: String,
}

impl LoginRequest {
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_str(&mut out, &self.account);
        write_str(&mut out, &self.pwd);
        out
    }

    pub fn from_payload(payload: &[u8]) -> io::Result<LoginRequest> {
        let mut pos = 0;
        let account = read_str(payload, &mut pos)?;
        let pwd = read_str(payload, &mut pos)?;
        Ok(LoginRequest { account, pwd })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    UnknownAccount,
    AccountLocked,
    Busy,
    Malfunction,
}

impl ResponseCode {
    fn from_byte(b: u8) -> io::Result<ResponseCode> {
        match b {
            0 => Ok(ResponseCode::Success),
            1 => Ok(ResponseCode::UnknownAccount),
            2 => Ok(ResponseCode::AccountLocked),
            3 => Ok(ResponseCode::Busy),
            4 => Ok(ResponseCode::Malfunction),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown ip-t response code {other}"),
            )),
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            ResponseCode::Success => 0,
            ResponseCode::UnknownAccount => 1,
            ResponseCode::AccountLocked => 2,
            ResponseCode::Busy => 3,
            ResponseCode::Malfunction => 4,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, ResponseCode::Success)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub host: String,
    pub port: u16,
}

/// `watchdog_period` is in minutes; 0 disables the watchdog. `new_sk` is
/// only present on the scrambled variant, and both sides install it
/// immediately after the final byte of this response is read/written —
/// never before, never mid-frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginResponse {
    pub code: ResponseCode,
    pub watchdog_period: u16,
    pub redirect: Option<Redirect>,
    pub new_sk: Option<ScrambleKey>,
}

impl LoginResponse {
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.code.to_byte());
        out.extend_from_slice(&self.watchdog_period.to_le_bytes());
        match &self.redirect {
            Some(r) => {
                out.push(1);
                write_str(&mut out, &r.host);
                out.extend_from_slice(&r.port.to_le_bytes());
            }
            None => out.push(0),
        }
        match &self.new_sk {
            Some(sk) => {
                out.push(1);
                out.extend_from_slice(&sk.0);
            }
            None => out.push(0),
        }
        out
    }

    pub fn from_payload(payload: &[u8]) -> io::Result<LoginResponse> {
        let mut pos = 0;
        let code = ResponseCode::from_byte(*payload
            .first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "empty login response"))?)?;
        pos += 1;
        let watchdog_period = u16::from_le_bytes(
            payload
                .get(pos..pos + 2)
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated watchdog period"))?
                .try_into()
                .unwrap(),
        );
        pos += 2;
        let has_redirect = *payload
            .get(pos)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated redirect flag"))?;
        pos += 1;
        let redirect = if has_redirect != 0 {
            let host = read_str(payload, &mut pos)?;
            let port = u16::from_le_bytes(
                payload
                    .get(pos..pos + 2)
                    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated redirect port"))?
                    .try_into()
                    .unwrap(),
            );
            pos += 2;
            Some(Redirect { host, port })
        } else {
            None
        };
        let has_sk = *payload
            .get(pos)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated sk flag"))?;
        pos += 1;
        let new_sk = if has_sk != 0 {
            let bytes: [u8; 32] = payload
                .get(pos..pos + 32)
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "truncated sk"))?
                .try_into()
                .unwrap();
            Some(ScrambleKey::from_bytes(bytes))
        } else {
            None
        };
        Ok(LoginResponse {
            code,
            watchdog_period,
            redirect,
            new_sk,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_round_trips() {
        let req = LoginRequest {
            account: "root".into(),
            pwd: "root".into(),
        };
        assert_eq!(LoginRequest::from_payload(&req.to_payload()).unwrap(), req);
    }

    #[test]
    fn public_login_response_round_trips_without_sk() {
        let res = LoginResponse {
            code: ResponseCode::Success,
            watchdog_period: 30,
            redirect: None,
            new_sk: None,
        };
        let decoded = LoginResponse::from_payload(&res.to_payload()).unwrap();
        assert_eq!(decoded, res);
        assert!(decoded.new_sk.is_none());
    }

    #[test]
    fn scrambled_login_response_carries_new_sk() {
        let res = LoginResponse {
            code: ResponseCode::Success,
            watchdog_period: 15,
            redirect: None,
            new_sk: Some(ScrambleKey::from_bytes([9u8; 32])),
        };
        let decoded = LoginResponse::from_payload(&res.to_payload()).unwrap();
        assert_eq!(decoded.new_sk, Some(ScrambleKey::from_bytes([9u8; 32])));
    }

    #[test]
    fn redirect_round_trips() {
        let res = LoginResponse {
            code: ResponseCode::Busy,
            watchdog_period: 0,
            redirect: Some(Redirect {
                host: "10.0.0.9".into(),
                port: 7000,
            }),
            new_sk: None,
        };
        let decoded = LoginResponse::from_payload(&res.to_payload()).unwrap();
        assert_eq!(decoded.redirect, res.redirect);
    }

    #[test]
    fn unknown_response_code_is_rejected() {
        let bytes = vec![99u8, 0, 0, 0, 0];
        assert!(LoginResponse::from_payload(&bytes).is_err());
    }
}
