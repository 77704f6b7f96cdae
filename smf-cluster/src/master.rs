//! The master role: accepts cluster-bus connections, runs the login
//! handshake, and dispatches every subsequent record by opcode (§4.1). One
//! OS thread per session reads its socket in a loop; nothing here blocks a
//! different session's thread, matching §5's "sockets are owned by exactly
//! one task" rule.
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{sleep, spawn};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use smf_common::codec::{Decode, Encode};
use smf_common::error::CommonError;
use smf_common::logger::Logger;
use smf_store::{Columns, Registry};
use smf_types::WireValue;

use crate::login::{evaluate_login, LoginOutcome, LoginRequest, LoginResponse};
use crate::mutation::{
    insert_response, parse_clear_request, parse_insert_request, parse_modify_request,
    parse_remove_request,
};
use crate::opcode::{self, Opcode};
use crate::record::CommandRecord;
use crate::session::{SessionHandle, SessionRegistry};
use crate::subscribe::{subscribe_request_from_record, Subscription};
use crate::teardown::teardown_session;
use crate::watchdog::{watchdog_request, WatchdogMonitor};

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub struct Master {
    pub registry: Registry,
    pub sessions: SessionRegistry,
    pub account: String,
    pub pwd: String,
    pub watchdog_period: Duration,
    pub logger: Logger,
    next_sysmsg_id: AtomicU64,
}

impl Master {
    pub fn new(account: impl Into<String>, pwd: impl Into<String>, watchdog_period: Duration, logger: Logger) -> Arc<Master> {
        let mut registry = Registry::new();
        for table in [
            "TDevice", "TGateway", "TMeter", "_Session", "_Target", "_Connection", "_Cluster",
            "_Config", "_SysMsg",
        ] {
            registry.declare(table);
        }
        Arc::new(Master {
            registry,
            sessions: SessionRegistry::new(),
            account: account.into(),
            pwd: pwd.into(),
            watchdog_period,
            logger,
            next_sysmsg_id: AtomicU64::new(1),
        })
    }

    /// Blocks, accepting connections and spawning one thread per session.
    pub fn serve(self: &Arc<Self>, listener: TcpListener) {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let master = self.clone();
                    spawn(move || {
                        if let Err(e) = master.handle_session(stream) {
                            master.logger.warn("master", &format!("session ended: {e}"));
                        }
                    });
                }
                Err(e) => {
                    self.logger.warn("master", &format!("accept failed: {e}"));
                }
            }
        }
    }

    fn handle_session(self: Arc<Self>, mut stream: TcpStream) -> Result<(), CommonError> {
        let login_record = CommandRecord::decode(&mut stream)?;
        if Opcode::parse(&login_record.opcode) != Opcode::LoginReq {
            return Err(CommonError::protocol("first record was not a login request"));
        }
        let request = LoginRequest::from_record(&login_record)
            .ok_or_else(|| CommonError::protocol("malformed login request"))?;
        let outcome = evaluate_login(&request, &self.account, &self.pwd);
        let tag = request.tag.to_string();
        let response = LoginResponse {
            outcome,
            ident: request.tag,
            version: request.version,
            client_ts: request.timestamp,
            server_ts: now_unix(),
        };
        let mut out = Vec::new();
        response.to_record().encode(&mut out);
        stream.write_all(&out)?;

        if outcome != LoginOutcome::Success {
            return Ok(());
        }

        let handle = SessionHandle::new(tag.clone(), stream);
        self.sessions.insert(handle.clone());

        let mut cluster_body = Columns::new();
        cluster_body.insert("class".to_string(), WireValue::Str(request.class.clone()));
        cluster_body.insert("loginTime".to_string(), WireValue::TimePoint(now_unix()));
        cluster_body.insert("version".to_string(), WireValue::U64(request.version as u64));
        cluster_body.insert("ping".to_string(), WireValue::U64(0));
        if let Some(cluster) = self.registry.table("_Cluster") {
            cluster
                .merge(vec![WireValue::Str(tag.clone())], cluster_body, 1, &tag);
        }

        let monitor = Arc::new(Mutex::new(WatchdogMonitor::new(self.watchdog_period)));
        let watchdog_handle = {
            let master = self.clone();
            let tag = tag.clone();
            let monitor = monitor.clone();
            spawn(move || master.run_watchdog(&tag, monitor))
        };

        let mut subscriptions: Vec<Subscription> = Vec::new();
        let read_stream = handle.try_clone_stream()?;
        self.read_loop(&tag, read_stream, &handle, &monitor, &mut subscriptions);

        self.sessions.remove(&tag);
        let _ = watchdog_handle; // the watchdog thread exits once the session is gone from `sessions`

        let remote_peers: Vec<String> = self
            .registry
            .table("_Connection")
            .map(|connections| {
                connections
                    .find_all(|row| row.column("local-peer") == Some(&WireValue::Str(tag.clone())))
                    .into_iter()
                    .filter_map(|row| match row.column("remote-peer") {
                        Some(WireValue::Str(peer)) => Some(peer.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let sysmsg_id = self.next_sysmsg_id.fetch_add(1, Ordering::SeqCst);
        let sessions = &self.sessions;
        let opcode = opcode::FORWARD_CLOSE_CONNECTION;
        let tag_for_forward = tag.clone();
        teardown_session(
            &self.registry,
            &tag,
            subscriptions,
            &remote_peers,
            |peer| {
                if let Some(handle) = sessions.get(peer) {
                    let record = CommandRecord::new(opcode, vec![WireValue::Str(tag_for_forward.clone())]);
                    let _ = handle.send(&record);
                }
            },
            sysmsg_id,
        );
        Ok(())
    }

    fn run_watchdog(self: &Arc<Self>, tag: &str, monitor: Arc<Mutex<WatchdogMonitor>>) {
        loop {
            sleep(self.watchdog_period);
            let Some(handle) = self.sessions.get(tag) else {
                return;
            };
            let should_close = monitor.lock().unwrap().on_tick();
            if should_close {
                self.logger.warn("master", &format!("{tag}: watchdog timeout, closing"));
                self.sessions.remove(tag);
                return;
            }
            if handle.send(&watchdog_request()).is_err() {
                return;
            }
        }
    }

    fn read_loop(
        self: &Arc<Self>,
        tag: &str,
        mut stream: TcpStream,
        handle: &Arc<SessionHandle>,
        monitor: &Arc<Mutex<WatchdogMonitor>>,
        subscriptions: &mut Vec<Subscription>,
    ) {
        loop {
            let record = match CommandRecord::decode(&mut stream) {
                Ok(r) => r,
                Err(_) => return,
            };
            if let Err(e) = self.dispatch(tag, &record, handle, monitor, subscriptions) {
                self.logger.warn("master", &format!("{tag}: {e}"));
            }
        }
    }

    fn dispatch(
        self: &Arc<Self>,
        tag: &str,
        record: &CommandRecord,
        handle: &Arc<SessionHandle>,
        monitor: &Arc<Mutex<WatchdogMonitor>>,
        subscriptions: &mut Vec<Subscription>,
    ) -> Result<(), CommonError> {
        match Opcode::parse(&record.opcode) {
            Opcode::WatchdogRes => {
                monitor.lock().unwrap().on_reply();
                if let Some(rtt) = monitor.lock().unwrap().last_rtt() {
                    if let Some(cluster) = self.registry.table("_Cluster") {
                        let _ = cluster.modify(
                            &[WireValue::Str(tag.to_string())],
                            "ping",
                            WireValue::U64(rtt.as_millis() as u64),
                            "master",
                        );
                    }
                }
                Ok(())
            }
            Opcode::SubscribeReq => {
                let (table_name, session_tag, _task_id) = subscribe_request_from_record(record)
                    .ok_or_else(|| CommonError::protocol("malformed subscribe request"))?;
                let table = self
                    .registry
                    .table(&table_name)
                    .ok_or_else(|| CommonError::semantic(format!("unknown table {table_name}")))?;
                let handle = handle.clone();
                let sub = Subscription::attach(table, &session_tag, move |record| {
                    let _ = handle.send(&record);
                });
                subscriptions.push(sub);
                Ok(())
            }
            Opcode::InsertReq => {
                let req = parse_insert_request(record)
                    .ok_or_else(|| CommonError::protocol("malformed insert request"))?;
                let table = self
                    .registry
                    .table(&req.table)
                    .ok_or_else(|| CommonError::semantic(format!("unknown table {}", req.table)))?;
                table
                    .insert(req.key.clone(), req.body, req.gen, &req.source)
                    .map_err(|e| CommonError::semantic(e.to_string()))?;
                let row = table.lookup(&req.key).expect("just inserted");
                handle
                    .send(&insert_response(&req.table, &row))
                    .map_err(CommonError::from)
            }
            Opcode::ModifyByAttrReq => {
                let req = parse_modify_request(record)
                    .ok_or_else(|| CommonError::protocol("malformed modify request"))?;
                let table = self
                    .registry
                    .table(&req.table)
                    .ok_or_else(|| CommonError::semantic(format!("unknown table {}", req.table)))?;
                table
                    .modify(&req.key, &req.column, req.value, &req.source)
                    .map_err(|e| CommonError::semantic(e.to_string()))?;
                Ok(())
            }
            Opcode::RemoveReq => {
                let req = parse_remove_request(record)
                    .ok_or_else(|| CommonError::protocol("malformed remove request"))?;
                let table = self
                    .registry
                    .table(&req.table)
                    .ok_or_else(|| CommonError::semantic(format!("unknown table {}", req.table)))?;
                table
                    .erase(&req.key, &req.source)
                    .map_err(|e| CommonError::semantic(e.to_string()))?;
                Ok(())
            }
            Opcode::ClearReq => {
                let table_name = parse_clear_request(record)
                    .ok_or_else(|| CommonError::protocol("malformed clear request"))?;
                let table = self
                    .registry
                    .table(&table_name)
                    .ok_or_else(|| CommonError::semantic(format!("unknown table {table_name}")))?;
                table.clear(tag);
                Ok(())
            }
            Opcode::Unknown(op) => Err(CommonError::protocol(format!("unrecognized opcode {op}"))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::login::PROTOCOL_VERSION;
    use smf_types::Uuid;
    use std::thread;

    fn make_master() -> Arc<Master> {
        Master::new("root", "root", Duration::from_secs(30), Logger::null())
    }

    fn sample_login(tag: Uuid) -> LoginRequest {
        LoginRequest {
            version: PROTOCOL_VERSION,
            account: "root".into(),
            pwd: "root".into(),
            tag,
            class: "gateway".into(),
            tz_offset: 0,
            timestamp: now_unix(),
            autologin: true,
            group: "default".into(),
            remote_ep: "127.0.0.1:6000".parse().unwrap(),
            platform: "linux".into(),
            pid: 1,
        }
    }

    #[test]
    fn login_then_insert_is_visible_in_the_registry() {
        let master = make_master();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let master_clone = master.clone();
        thread::spawn(move || master_clone.serve(listener));

        let mut client = TcpStream::connect(addr).unwrap();
        let tag = Uuid::new_random();
        let login = sample_login(tag);
        let mut out = Vec::new();
        login.to_record().encode(&mut out);
        client.write_all(&out).unwrap();

        let response = CommandRecord::decode(&mut client).unwrap();
        assert_eq!(response.opcode, opcode::LOGIN_RES);
        assert_eq!(response.arg(0), Some(&WireValue::Bool(true)));

        let insert = crate::mutation::insert_request(
            "TDevice",
            &smf_store::Row::new(vec![WireValue::Str("U1".into())], Columns::new(), 1, tag.to_string()),
        );
        let mut out = Vec::new();
        insert.encode(&mut out);
        client.write_all(&out).unwrap();

        let ack = CommandRecord::decode(&mut client).unwrap();
        assert_eq!(ack.opcode, opcode::INSERT_RES);

        thread::sleep(Duration::from_millis(50));
        let table = master.registry.table("TDevice").unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn bad_credentials_closes_the_socket_without_inserting_cluster_row() {
        let master = make_master();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let master_clone = master.clone();
        thread::spawn(move || master_clone.serve(listener));

        let mut client = TcpStream::connect(addr).unwrap();
        let mut login = sample_login(Uuid::new_random());
        login.pwd = "wrong".into();
        let mut out = Vec::new();
        login.to_record().encode(&mut out);
        client.write_all(&out).unwrap();

        let response = CommandRecord::decode(&mut client).unwrap();
        assert_eq!(response.arg(0), Some(&WireValue::Bool(false)));

        thread::sleep(Duration::from_millis(50));
        assert!(master.registry.table("_Cluster").unwrap().is_empty());
    }

    /// When a node with an open `_Connection` row drops its session, its
    /// remote peer must receive a forwarded close so it doesn't hold a
    /// half-open connection forever.
    #[test]
    fn teardown_forwards_close_to_the_connection_peer() {
        let master = make_master();
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let master_clone = master.clone();
        thread::spawn(move || master_clone.serve(listener));

        let tag_a = Uuid::new_random();
        let tag_b = Uuid::new_random();

        let mut client_a = TcpStream::connect(addr).unwrap();
        client_a
            .write_all(&{
                let mut out = Vec::new();
                sample_login(tag_a).to_record().encode(&mut out);
                out
            })
            .unwrap();
        CommandRecord::decode(&mut client_a).unwrap();

        let mut client_b = TcpStream::connect(addr).unwrap();
        client_b
            .write_all(&{
                let mut out = Vec::new();
                sample_login(tag_b).to_record().encode(&mut out);
                out
            })
            .unwrap();
        CommandRecord::decode(&mut client_b).unwrap();

        thread::sleep(Duration::from_millis(50));
        let mut body = Columns::new();
        body.insert("local-peer".to_string(), WireValue::Str(tag_a.to_string()));
        body.insert("remote-peer".to_string(), WireValue::Str(tag_b.to_string()));
        master
            .registry
            .table("_Connection")
            .unwrap()
            .insert(vec![WireValue::Str(tag_a.to_string())], body, 1, &tag_a.to_string())
            .unwrap();

        drop(client_a);
        let forwarded = CommandRecord::decode(&mut client_b).unwrap();
        assert_eq!(forwarded.opcode, opcode::FORWARD_CLOSE_CONNECTION);
        assert_eq!(forwarded.arg(0), Some(&WireValue::Str(tag_a.to_string())));
    }
}
