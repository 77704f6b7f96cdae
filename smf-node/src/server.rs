//! The external interface's accept loop (§6): one `TcpListener`, one thread
//! per accepted connection, routed to either the static file server or a
//! WebSocket session depending on the request's `Upgrade` header — the same
//! shape the teacher's own client-facing listener uses
//! (`redis_node::node::Node::iniciar_recepcion_clientes`), generalized from
//! a single RESP protocol to HTTP-or-WebSocket.
use std::collections::HashMap;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use smf_common::logger::Logger;
use smf_store::{ChangeEvent, ListenerId, Registry};

use crate::channel::{self, ClientCmd};
use crate::http::{self, HttpRequest};
use crate::ws::{self, Opcode};

pub struct DashboardServer {
    pub registry: Arc<Registry>,
    pub doc_root: PathBuf,
    pub logger: Logger,
}

impl DashboardServer {
    pub fn new(registry: Arc<Registry>, doc_root: PathBuf, logger: Logger) -> Self {
        DashboardServer { registry, doc_root, logger }
    }

    /// Blocks accepting connections until the listener is closed (by
    /// dropping it from another thread, the same pattern the main loop's
    /// shutdown wiring relies on).
    pub fn run(self: Arc<Self>, listener: TcpListener) {
        for incoming in listener.incoming() {
            match incoming {
                Ok(stream) => {
                    let server = Arc::clone(&self);
                    std::thread::spawn(move || server.handle_connection(stream));
                }
                Err(e) => {
                    self.logger.warn("dashboard", &format!("accept error: {e}"));
                }
            }
        }
    }

    fn handle_connection(&self, mut stream: TcpStream) {
        let request = match http::parse_request(&mut stream) {
            Ok(r) => r,
            Err(e) => {
                self.logger.warn("dashboard", &format!("malformed request: {e}"));
                return;
            }
        };

        if request.is_websocket_upgrade() {
            if let Err(e) = self.handle_websocket(stream, &request) {
                self.logger.warn("dashboard", &format!("websocket session ended: {e}"));
            }
        } else if let Err(e) = http::serve_static(&mut stream, &self.doc_root, &request) {
            self.logger.warn("dashboard", &format!("static file error: {e}"));
        }
    }

    fn handle_websocket(&self, mut stream: TcpStream, request: &HttpRequest) -> std::io::Result<()> {
        let key = request
            .header("sec-websocket-key")
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "missing websocket key"))?;
        let accept = ws::accept_key(key);
        write!(
            stream,
            "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {accept}\r\n\r\n"
        )?;

        let writer = Arc::new(Mutex::new(stream.try_clone()?));
        let mut subscriptions: HashMap<String, ListenerId> = HashMap::new();

        loop {
            let frame = match ws::read_frame(&mut stream) {
                Ok(f) => f,
                Err(_) => break,
            };
            match frame.opcode {
                Opcode::Close => {
                    let _ = ws::write_close(&mut *writer.lock().unwrap());
                    break;
                }
                Opcode::Ping => {
                    let _ = ws::write_frame(&mut *writer.lock().unwrap(), Opcode::Pong, &frame.payload);
                }
                Opcode::Text => {
                    let text = String::from_utf8_lossy(&frame.payload).into_owned();
                    self.dispatch_client_frame(&text, &writer, &mut subscriptions);
                }
                _ => {}
            }
        }

        for (channel, id) in subscriptions {
            if let Some(table) = self.registry.table(&channel) {
                table.remove_listener(id);
            }
        }
        Ok(())
    }

    fn dispatch_client_frame(
        &self,
        text: &str,
        writer: &Arc<Mutex<TcpStream>>,
        subscriptions: &mut HashMap<String, ListenerId>,
    ) {
        let Some(frame) = channel::parse_client_frame(text) else {
            self.logger.warn("dashboard", &format!("unrecognized client frame: {text}"));
            return;
        };

        let Some(table) = self.registry.table(&frame.channel) else {
            self.logger.warn("dashboard", &format!("unknown channel: {}", frame.channel));
            return;
        };

        match frame.cmd {
            ClientCmd::Subscribe => {
                let channel_name = frame.channel.clone();
                let writer = Arc::clone(writer);
                let id = table.add_listener(Box::new(move |event: &ChangeEvent, _source: &str| {
                    let payload = channel::delta_frame(&channel_name, event);
                    if let Ok(text) = serde_json::to_string(&payload) {
                        let mut guard = writer.lock().unwrap();
                        let _ = ws::write_text(&mut *guard, &text);
                    }
                }));
                subscriptions.insert(frame.channel.clone(), id);
            }
            ClientCmd::Insert => {
                if let Some((key, body)) = channel::rec_to_key_and_body(&frame.rec) {
                    let _ = table.insert(key, body, 1, "dashboard");
                }
            }
            ClientCmd::Update => {
                if let Some((key, body)) = channel::rec_to_key_and_body(&frame.rec) {
                    table.merge(key, body, 1, "dashboard");
                }
            }
            ClientCmd::Modify => {
                if let Some((key, body)) = channel::rec_to_key_and_body(&frame.rec) {
                    for (column, value) in body {
                        let _ = table.modify(&key, &column, value, "dashboard");
                    }
                }
            }
            ClientCmd::Delete => {
                if let Some(key) = frame.rec.get("key").and_then(|k| k.as_array()) {
                    let key: Vec<_> = key.iter().map(channel::json_to_wire).collect();
                    let _ = table.erase(&key, "dashboard");
                }
            }
            ClientCmd::Clear => {
                table.clear("dashboard");
            }
            ClientCmd::Stop | ClientCmd::Reboot => {
                self.logger.info(
                    "dashboard",
                    &format!("operator requested {:?} on {}", frame.cmd, frame.channel),
                );
            }
            ClientCmd::QuerySrvVisible | ClientCmd::QuerySrvActive | ClientCmd::QueryFirmware => {
                let rows: Vec<_> = table.find_all(|_| true).iter().map(channel::row_to_json).collect();
                let response = serde_json::json!({
                    "cmd": "query-result",
                    "channel": frame.channel,
                    "rec": rows,
                });
                if let Ok(text) = serde_json::to_string(&response) {
                    let mut guard = writer.lock().unwrap();
                    let _ = ws::write_text(&mut *guard, &text);
                }
            }
        }
    }
}
