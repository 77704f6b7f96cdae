//! The closed set of cluster-bus opcodes, as a redesign away from the
//! original's dynamic by-string handler registration: the wire opcode is
//! still a string (for interop with anything inspecting the stream), but
//! every opcode this crate emits or accepts is named here once, and
//! `Opcode::parse` turns an unrecognized string into a distinct variant
//! rather than routing it through the same lookup table as everything
//! else.
use std::fmt;

pub const LOGIN_REQ: &str = "bus.req.login";
pub const LOGIN_RES: &str = "bus.res.login";
pub const WATCHDOG_REQ: &str = "bus.req.watchdog";
pub const WATCHDOG_RES: &str = "bus.res.watchdog";
pub const SUBSCRIBE_REQ: &str = "bus.req.subscribe";
pub const SUBSCRIBE_RES: &str = "bus.res.subscribe";
pub const UNSUBSCRIBE_REQ: &str = "bus.req.unsubscribe";
pub const INSERT_REQ: &str = "db.req.insert";
pub const INSERT_RES: &str = "db.res.insert";
pub const MODIFY_ATTR_REQ: &str = "db.req.modify.by.attr";
pub const MODIFY_PARAM_REQ: &str = "db.req.modify.by.param";
pub const REMOVE_REQ: &str = "db.req.remove";
pub const CLEAR_REQ: &str = "db.clear";
pub const FORWARD_CLOSE_CONNECTION: &str = "client.req.close.connection.forward";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    LoginReq,
    LoginRes,
    WatchdogReq,
    WatchdogRes,
    SubscribeReq,
    SubscribeRes,
    UnsubscribeReq,
    InsertReq,
    InsertRes,
    ModifyByAttrReq,
    ModifyByParamReq,
    RemoveReq,
    ClearReq,
    ForwardCloseConnection,
    Unknown(String),
}

impl Opcode {
    pub fn parse(s: &str) -> Opcode {
        match s {
            LOGIN_REQ => Opcode::LoginReq,
            LOGIN_RES => Opcode::LoginRes,
            WATCHDOG_REQ => Opcode::WatchdogReq,
            WATCHDOG_RES => Opcode::WatchdogRes,
            SUBSCRIBE_REQ => Opcode::SubscribeReq,
            SUBSCRIBE_RES => Opcode::SubscribeRes,
            UNSUBSCRIBE_REQ => Opcode::UnsubscribeReq,
            INSERT_REQ => Opcode::InsertReq,
            INSERT_RES => Opcode::InsertRes,
            MODIFY_ATTR_REQ => Opcode::ModifyByAttrReq,
            MODIFY_PARAM_REQ => Opcode::ModifyByParamReq,
            REMOVE_REQ => Opcode::RemoveReq,
            CLEAR_REQ => Opcode::ClearReq,
            FORWARD_CLOSE_CONNECTION => Opcode::ForwardCloseConnection,
            other => Opcode::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Opcode::LoginReq => LOGIN_REQ,
            Opcode::LoginRes => LOGIN_RES,
            Opcode::WatchdogReq => WATCHDOG_REQ,
            Opcode::WatchdogRes => WATCHDOG_RES,
            Opcode::SubscribeReq => SUBSCRIBE_REQ,
            Opcode::SubscribeRes => SUBSCRIBE_RES,
            Opcode::UnsubscribeReq => UNSUBSCRIBE_REQ,
            Opcode::InsertReq => INSERT_REQ,
            Opcode::InsertRes => INSERT_RES,
            Opcode::ModifyByAttrReq => MODIFY_ATTR_REQ,
            Opcode::ModifyByParamReq => MODIFY_PARAM_REQ,
            Opcode::RemoveReq => REMOVE_REQ,
            Opcode::ClearReq => CLEAR_REQ,
            Opcode::ForwardCloseConnection => FORWARD_CLOSE_CONNECTION,
            Opcode::Unknown(s) => s,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
