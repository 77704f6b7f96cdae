//! A live cluster-bus session's writable half: every subsystem that needs
//! to push a record to a connected node (subscription deltas, watchdog
//! requests, forwarded connection closes) goes through this handle rather
//! than touching the socket directly, so writes from different threads
//! (the reader loop, the watchdog timer, a forwarded cluster message) never
//! interleave mid-frame.
use std::collections::HashMap;
use std::io;
use std::net::TcpStream;
use std::sync::{Arc, Mutex};

use smf_common::codec::Encode;

use crate::record::CommandRecord;

pub struct SessionHandle {
    pub tag: String,
    stream: Mutex<TcpStream>,
}

impl SessionHandle {
    pub fn new(tag: impl Into<String>, stream: TcpStream) -> Arc<SessionHandle> {
        Arc::new(SessionHandle {
            tag: tag.into(),
            stream: Mutex::new(stream),
        })
    }

    pub fn send(&self, record: &CommandRecord) -> io::Result<()> {
        let mut stream = self.stream.lock().unwrap();
        let mut out = Vec::new();
        record.encode(&mut out);
        io::Write::write_all(&mut *stream, &out)
    }

    pub fn try_clone_stream(&self) -> io::Result<TcpStream> {
        self.stream.lock().unwrap().try_clone()
    }
}

/// The master's `tag → session` directory. Used both to route a forwarded
/// record to the right peer and to drive teardown when a socket drops.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry::default()
    }

    pub fn insert(&self, handle: Arc<SessionHandle>) {
        self.sessions.lock().unwrap().insert(handle.tag.clone(), handle);
    }

    pub fn remove(&self, tag: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.lock().unwrap().remove(tag)
    }

    pub fn get(&self, tag: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.lock().unwrap().get(tag).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tags(&self) -> Vec<String> {
        self.sessions.lock().unwrap().keys().cloned().collect()
    }
}
