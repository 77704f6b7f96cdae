//! The operational log (§4.5): an append-only `op.log` table recording the
//! handful of events an operator cares to audit later — a status word
//! changing, a login, a login loss, a power return. Rows are produced by
//! small constructors rather than a generic table listener, since the
//! interesting events here originate from different subsystems (the device
//! inventory, the IP-T session, the watchdog) and none of them share a
//! single "before/after" row to diff.
use std::sync::atomic::{AtomicU64, Ordering};

use smf_store::{Columns, Table};
use smf_types::{Obis, ServerId, WireValue};

pub const TABLE_NAME: &str = "op.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCode {
    StatusChange,
    Login,
    LoginLoss,
    PowerReturn,
}

impl EventCode {
    fn tag(self) -> &'static str {
        match self {
            EventCode::StatusChange => "status-change",
            EventCode::Login => "login",
            EventCode::LoginLoss => "login-loss",
            EventCode::PowerReturn => "power-return",
        }
    }

    fn from_tag(tag: &str) -> Option<EventCode> {
        match tag {
            "status-change" => Some(EventCode::StatusChange),
            "login" => Some(EventCode::Login),
            "login-loss" => Some(EventCode::LoginLoss),
            "power-return" => Some(EventCode::PowerReturn),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpLogEntry {
    pub status_word: u64,
    pub event_code: EventCode,
    pub peer_obis: Option<Obis>,
    pub server_id: ServerId,
    pub target: Option<String>,
    pub push_nr: Option<u16>,
    pub description: String,
}

impl OpLogEntry {
    pub fn status_change(server_id: ServerId, status_word: u64, description: impl Into<String>) -> Self {
        OpLogEntry {
            status_word,
            event_code: EventCode::StatusChange,
            peer_obis: None,
            server_id,
            target: None,
            push_nr: None,
            description: description.into(),
        }
    }

    pub fn login(server_id: ServerId, peer_obis: Option<Obis>, description: impl Into<String>) -> Self {
        OpLogEntry {
            status_word: 0,
            event_code: EventCode::Login,
            peer_obis,
            server_id,
            target: None,
            push_nr: None,
            description: description.into(),
        }
    }

    pub fn login_loss(server_id: ServerId, description: impl Into<String>) -> Self {
        OpLogEntry {
            status_word: 0,
            event_code: EventCode::LoginLoss,
            peer_obis: None,
            server_id,
            target: None,
            push_nr: None,
            description: description.into(),
        }
    }

    pub fn power_return(server_id: ServerId, description: impl Into<String>) -> Self {
        OpLogEntry {
            status_word: 0,
            event_code: EventCode::PowerReturn,
            peer_obis: None,
            server_id,
            target: None,
            push_nr: None,
            description: description.into(),
        }
    }

    /// Tags the entry as having been produced by a specific push op, for
    /// push-failure log lines.
    pub fn for_push(mut self, target: impl Into<String>, push_nr: u16) -> Self {
        self.target = Some(target.into());
        self.push_nr = Some(push_nr);
        self
    }
}

fn to_columns(entry: &OpLogEntry) -> Columns {
    let mut body = Columns::new();
    body.insert("status-word".to_string(), WireValue::U64(entry.status_word));
    body.insert("event-code".to_string(), WireValue::Str(entry.event_code.tag().to_string()));
    if let Some(obis) = entry.peer_obis {
        body.insert("peer-obis".to_string(), WireValue::Buffer(obis.as_bytes().to_vec()));
    }
    body.insert(
        "server-id".to_string(),
        WireValue::Buffer(entry.server_id.as_bytes().to_vec()),
    );
    if let Some(target) = &entry.target {
        body.insert("target".to_string(), WireValue::Str(target.clone()));
    }
    if let Some(push_nr) = entry.push_nr {
        body.insert("push-nr".to_string(), WireValue::U64(push_nr as u64));
    }
    body.insert("description".to_string(), WireValue::Str(entry.description.clone()));
    body
}

pub fn from_columns(body: &Columns) -> Option<OpLogEntry> {
    let status_word = match body.get("status-word") {
        Some(WireValue::U64(n)) => *n,
        _ => 0,
    };
    let event_code = match body.get("event-code") {
        Some(WireValue::Str(tag)) => EventCode::from_tag(tag)?,
        _ => return None,
    };
    let peer_obis = match body.get("peer-obis") {
        Some(WireValue::Buffer(b)) if b.len() == 6 => Some(Obis::from_bytes(b.as_slice().try_into().ok()?)),
        _ => None,
    };
    let server_id = match body.get("server-id") {
        Some(WireValue::Buffer(b)) => ServerId::new(b.clone()).ok()?,
        _ => return None,
    };
    let target = match body.get("target") {
        Some(WireValue::Str(s)) => Some(s.clone()),
        _ => None,
    };
    let push_nr = match body.get("push-nr") {
        Some(WireValue::U64(n)) => Some(*n as u16),
        _ => None,
    };
    let description = match body.get("description") {
        Some(WireValue::Str(s)) => s.clone(),
        _ => String::new(),
    };
    Some(OpLogEntry {
        status_word,
        event_code,
        peer_obis,
        server_id,
        target,
        push_nr,
        description,
    })
}

/// Assigns append-only row keys — the log has no natural key of its own,
/// just arrival order.
#[derive(Debug, Default)]
pub struct OpLogKeyGen(AtomicU64);

impl OpLogKeyGen {
    pub fn new() -> Self {
        OpLogKeyGen(AtomicU64::new(1))
    }

    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

pub fn record(table: &Table, keys: &OpLogKeyGen, entry: OpLogEntry, source: &str) {
    let key = vec![WireValue::U64(keys.next())];
    let _ = table.insert(key, to_columns(&entry), 1, source);
}
