//! The cluster bus's client role (§4.1): dials a configured master and logs
//! in, the same handshake `Master::handle_session` runs from the other
//! side. A gateway node uses one of these to report its own `_Session`,
//! `_Target`, and `_Connection` rows into the master it belongs to.
use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use smf_common::codec::{Decode, Encode};
use smf_store::Row;
use smf_types::Uuid;

use crate::login::{LoginOutcome, LoginRequest, LoginResponse, PROTOCOL_VERSION};
use crate::mutation::{insert_request, remove_request};
use crate::record::CommandRecord;

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub struct ClusterClient {
    pub tag: Uuid,
    stream: Mutex<TcpStream>,
}

impl ClusterClient {
    /// Dials `addr` and runs the login handshake. Fails if the socket can't
    /// be reached, the handshake response is malformed, or the master
    /// rejects the credentials.
    pub fn connect(addr: SocketAddr, account: &str, pwd: &str, class: &str, group: &str) -> io::Result<ClusterClient> {
        let mut stream = TcpStream::connect(addr)?;
        let tag = Uuid::new_random();
        let remote_ep = stream.local_addr()?;
        let request = LoginRequest {
            version: PROTOCOL_VERSION,
            account: account.to_string(),
            pwd: pwd.to_string(),
            tag,
            class: class.to_string(),
            tz_offset: 0,
            timestamp: now_unix(),
            autologin: true,
            group: group.to_string(),
            remote_ep,
            platform: std::env::consts::OS.to_string(),
            pid: std::process::id(),
        };
        let mut out = Vec::new();
        request.to_record().encode(&mut out);
        stream.write_all(&out)?;

        let record = CommandRecord::decode(&mut stream)?;
        let response = LoginResponse::from_record(&record)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed login response"))?;
        if response.outcome != LoginOutcome::Success {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "cluster login rejected"));
        }

        Ok(ClusterClient {
            tag,
            stream: Mutex::new(stream),
        })
    }

    fn send(&self, record: &CommandRecord) -> io::Result<()> {
        let mut out = Vec::new();
        record.encode(&mut out);
        self.stream.lock().unwrap().write_all(&out)
    }

    /// Reports a row this node owns into the master's matching table,
    /// fire-and-forget — the way `Master::run_watchdog` sends its ping
    /// without reading an ack back inline.
    pub fn report_insert(&self, table: &str, row: &Row) -> io::Result<()> {
        self.send(&insert_request(table, row))
    }

    pub fn report_remove(&self, table: &str, row: &Row) -> io::Result<()> {
        self.send(&remove_request(table, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::Master;
    use smf_common::logger::Logger;
    use smf_store::Columns;
    use smf_types::WireValue;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn connects_and_reports_rows_into_the_master_registry() {
        let master = Master::new("root", "root", Duration::from_secs(30), Logger::null());
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let master_clone = master.clone();
        thread::spawn(move || master_clone.serve(listener));

        let client = ClusterClient::connect(addr, "root", "root", "gateway", "default").unwrap();

        let mut body = Columns::new();
        body.insert("owner-tag".to_string(), WireValue::Str(client.tag.to_string()));
        let row = Row::new(vec![WireValue::Str("sink-1".into())], body, 1, client.tag.to_string());
        client.report_insert("_Target", &row).unwrap();

        thread::sleep(Duration::from_millis(50));
        let targets = master.registry.table("_Target").unwrap();
        assert!(targets.lookup(&row.key).is_some());

        client.report_remove("_Target", &row).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(targets.lookup(&row.key).is_none());
    }

    #[test]
    fn connect_fails_with_wrong_credentials() {
        let master = Master::new("root", "root", Duration::from_secs(30), Logger::null());
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || master.serve(listener));

        let result = ClusterClient::connect(addr, "root", "wrong", "gateway", "default");
        assert!(result.is_err());
    }
}
