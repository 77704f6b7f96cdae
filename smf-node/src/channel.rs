//! The WebSocket wire format (§6): every frame exchanged with a dashboard
//! client is a JSON object `{cmd, channel, rec}`. `channel` names the table
//! the frame concerns; `rec` carries whatever row or argument list the
//! command needs. Translating a `WireValue`/`Row` to and from `serde_json`
//! is done by hand here rather than deriving `Serialize` on the wire
//! lattice itself, since the binary cluster-bus encoding and this JSON
//! rendering serve different audiences and tend to drift independently.
use std::collections::BTreeMap;

use serde_json::{Map, Value as Json};
use smf_store::{ChangeEvent, Row};
use smf_types::WireValue;

pub fn wire_to_json(value: &WireValue) -> Json {
    match value {
        WireValue::Nil => Json::Null,
        WireValue::Bool(b) => Json::Bool(*b),
        WireValue::I64(n) => Json::Number((*n).into()),
        WireValue::U64(n) => Json::Number((*n).into()),
        WireValue::F64(f) => serde_json::Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
        WireValue::Str(s) => Json::String(s.clone()),
        WireValue::Buffer(b) => Json::String(hex::encode(b)),
        WireValue::Uuid(u) => Json::String(u.to_string()),
        WireValue::TimePoint(t) => Json::Number((*t).into()),
        WireValue::Duration(d) => Json::Number((*d).into()),
        WireValue::Endpoint(addr) => Json::String(addr.to_string()),
        WireValue::Version(maj, min, patch) => Json::String(format!("{maj}.{min}.{patch}")),
        WireValue::Mac48(m) => Json::String(
            m.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(":"),
        ),
        WireValue::Mac64(m) => Json::String(
            m.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(":"),
        ),
        WireValue::Tuple(items) | WireValue::Vector(items) => {
            Json::Array(items.iter().map(wire_to_json).collect())
        }
        WireValue::ParamMap(map) => {
            let mut obj = Map::new();
            for (k, v) in map {
                obj.insert(k.clone(), wire_to_json(v));
            }
            Json::Object(obj)
        }
    }
}

pub fn row_to_json(row: &Row) -> Json {
    let mut obj = Map::new();
    obj.insert(
        "key".to_string(),
        Json::Array(row.key.iter().map(wire_to_json).collect()),
    );
    let mut body = Map::new();
    for (k, v) in &row.body {
        body.insert(k.clone(), wire_to_json(v));
    }
    obj.insert("body".to_string(), Json::Object(body));
    obj.insert("generation".to_string(), Json::Number(row.generation.into()));
    obj.insert("origin".to_string(), Json::String(row.origin.clone()));
    Json::Object(obj)
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeltaCmd {
    Insert,
    Modify,
    Delete,
    Clear,
}

impl DeltaCmd {
    fn tag(&self) -> &'static str {
        match self {
            DeltaCmd::Insert => "insert",
            DeltaCmd::Modify => "modify",
            DeltaCmd::Delete => "delete",
            DeltaCmd::Clear => "clear",
        }
    }
}

/// Builds the frame a table's change listener forwards to every subscriber.
pub fn delta_frame(channel: &str, event: &ChangeEvent) -> Json {
    let (cmd, rec) = match event {
        ChangeEvent::Insert(row) => (DeltaCmd::Insert, row_to_json(row)),
        ChangeEvent::Modify(row) => (DeltaCmd::Modify, row_to_json(row)),
        ChangeEvent::Erase(row) => (DeltaCmd::Delete, row_to_json(row)),
        ChangeEvent::Clear => (DeltaCmd::Clear, Json::Null),
    };
    let mut obj = Map::new();
    obj.insert("cmd".to_string(), Json::String(cmd.tag().to_string()));
    obj.insert("channel".to_string(), Json::String(channel.to_string()));
    obj.insert("rec".to_string(), rec);
    Json::Object(obj)
}

/// The closed set of commands a dashboard client may send upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCmd {
    Subscribe,
    Insert,
    Modify,
    Delete,
    Clear,
    Update,
    Stop,
    Reboot,
    QuerySrvVisible,
    QuerySrvActive,
    QueryFirmware,
}

impl ClientCmd {
    pub fn from_tag(tag: &str) -> Option<ClientCmd> {
        match tag {
            "subscribe" => Some(ClientCmd::Subscribe),
            "insert" => Some(ClientCmd::Insert),
            "modify" => Some(ClientCmd::Modify),
            "delete" => Some(ClientCmd::Delete),
            "clear" => Some(ClientCmd::Clear),
            "update" => Some(ClientCmd::Update),
            "stop" => Some(ClientCmd::Stop),
            "reboot" => Some(ClientCmd::Reboot),
            "query:srv:visible" => Some(ClientCmd::QuerySrvVisible),
            "query:srv:active" => Some(ClientCmd::QuerySrvActive),
            "query:firmware" => Some(ClientCmd::QueryFirmware),
            _ => None,
        }
    }
}

/// The inverse of `wire_to_json`'s scalar cases — enough to turn a client's
/// `rec` object back into table columns. Buffers, UUIDs and the other
/// binary-flavored variants aren't reconstructable from JSON alone, so a
/// dashboard client can only write the scalar types it can also read back.
pub fn json_to_wire(value: &Json) -> WireValue {
    match value {
        Json::Null => WireValue::Nil,
        Json::Bool(b) => WireValue::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                WireValue::I64(i)
            } else if let Some(u) = n.as_u64() {
                WireValue::U64(u)
            } else {
                WireValue::F64(n.as_f64().unwrap_or(0.0))
            }
        }
        Json::String(s) => WireValue::Str(s.clone()),
        Json::Array(items) => WireValue::Vector(items.iter().map(json_to_wire).collect()),
        Json::Object(map) => {
            let mut out = BTreeMap::new();
            for (k, v) in map {
                out.insert(k.clone(), json_to_wire(v));
            }
            WireValue::ParamMap(out)
        }
    }
}

/// Splits a client write request's `rec` object into its `key` array and its
/// `body` object, the shape `row_to_json` produces and a write request is
/// expected to mirror back.
pub fn rec_to_key_and_body(rec: &Json) -> Option<(Vec<WireValue>, smf_store::Columns)> {
    let key = rec.get("key")?.as_array()?.iter().map(json_to_wire).collect();
    let body_obj = rec.get("body")?.as_object()?;
    let mut body = smf_store::Columns::new();
    for (k, v) in body_obj {
        body.insert(k.clone(), json_to_wire(v));
    }
    Some((key, body))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientFrame {
    pub cmd: ClientCmd,
    pub channel: String,
    pub rec: Json,
}

pub fn parse_client_frame(text: &str) -> Option<ClientFrame> {
    let parsed: BTreeMap<String, Json> = serde_json::from_str(text).ok()?;
    let cmd = ClientCmd::from_tag(parsed.get("cmd")?.as_str()?)?;
    let channel = parsed.get("channel")?.as_str()?.to_string();
    let rec = parsed.get("rec").cloned().unwrap_or(Json::Null);
    Some(ClientFrame { cmd, channel, rec })
}

#[cfg(test)]
mod tests {
    use super::*;
    use smf_store::Columns;
    use smf_types::WireValue;

    #[test]
    fn insert_event_renders_as_an_insert_frame() {
        let mut body = Columns::new();
        body.insert("name".to_string(), WireValue::Str("m1".to_string()));
        let row = Row {
            key: vec![WireValue::U64(1)],
            body,
            generation: 1,
            origin: "master".to_string(),
        };
        let frame = delta_frame("TDevice", &ChangeEvent::Insert(row));
        assert_eq!(frame["cmd"], "insert");
        assert_eq!(frame["channel"], "TDevice");
        assert_eq!(frame["rec"]["body"]["name"], "m1");
    }

    #[test]
    fn clear_event_carries_no_record() {
        let frame = delta_frame("TDevice", &ChangeEvent::Clear);
        assert_eq!(frame["cmd"], "clear");
        assert!(frame["rec"].is_null());
    }

    #[test]
    fn parses_a_subscribe_request() {
        let frame = parse_client_frame(r#"{"cmd":"subscribe","channel":"TDevice","rec":null}"#).unwrap();
        assert_eq!(frame.cmd, ClientCmd::Subscribe);
        assert_eq!(frame.channel, "TDevice");
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(parse_client_frame(r#"{"cmd":"bogus","channel":"TDevice"}"#).is_none());
    }

    #[test]
    fn buffer_values_render_as_hex() {
        let json = wire_to_json(&WireValue::Buffer(vec![0xDE, 0xAD]));
        assert_eq!(json, Json::String("dead".to_string()));
    }

    #[test]
    fn rec_to_key_and_body_round_trips_a_write_request() {
        let rec: Json = serde_json::from_str(r#"{"key":[1],"body":{"name":"m1","enabled":true}}"#).unwrap();
        let (key, body) = rec_to_key_and_body(&rec).unwrap();
        assert_eq!(key, vec![WireValue::U64(1)]);
        assert_eq!(body.get("name"), Some(&WireValue::Str("m1".to_string())));
        assert_eq!(body.get("enabled"), Some(&WireValue::Bool(true)));
    }

    #[test]
    fn rec_without_a_body_object_is_rejected() {
        let rec: Json = serde_json::from_str(r#"{"key":[1]}"#).unwrap();
        assert!(rec_to_key_and_body(&rec).is_none());
    }
}
