//! Two independent clients against one real `Master` socket: one inserts
//! through the bus protocol, the other has subscribed to the same table and
//! must see the insert arrive as a live mutation record, over the wire,
//! without touching the registry directly.
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use smf_cluster::login::PROTOCOL_VERSION;
use smf_cluster::{opcode, CommandRecord, LoginRequest, Master};
use smf_common::codec::{Decode, Encode};
use smf_common::logger::Logger;
use smf_store::{Columns, Row};
use smf_types::{Uuid, WireValue};

fn login(tag: Uuid, class: &str) -> LoginRequest {
    LoginRequest {
        version: PROTOCOL_VERSION,
        account: "root".into(),
        pwd: "root".into(),
        tag,
        class: class.into(),
        tz_offset: 0,
        timestamp: 0,
        autologin: true,
        group: "default".into(),
        remote_ep: "127.0.0.1:6000".parse().unwrap(),
        platform: "linux".into(),
        pid: 1,
    }
}

fn do_login(stream: &mut TcpStream, tag: Uuid, class: &str) {
    let mut out = Vec::new();
    login(tag, class).to_record().encode(&mut out);
    stream.write_all(&out).unwrap();
    let response = CommandRecord::decode(stream).unwrap();
    assert_eq!(response.opcode, opcode::LOGIN_RES);
    assert_eq!(response.arg(0), Some(&WireValue::Bool(true)));
}

#[test]
fn a_subscriber_sees_another_sessions_insert() {
    let master = Master::new("root", "root", Duration::from_secs(30), Logger::null());
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let master_for_serve = master.clone();
    thread::spawn(move || master_for_serve.serve(listener));

    let mut subscriber = TcpStream::connect(addr).unwrap();
    do_login(&mut subscriber, Uuid::new_random(), "dashboard");
    let mut subscribe_out = Vec::new();
    smf_cluster::subscribe::subscribe_request("TDevice", "watcher", None).encode(&mut subscribe_out);
    subscriber.write_all(&subscribe_out).unwrap();
    // The subscribe request is read and attached by the subscriber's own
    // session thread asynchronously; give it a moment before the other
    // session's insert would need it already attached.
    thread::sleep(Duration::from_millis(50));

    let mut writer = TcpStream::connect(addr).unwrap();
    do_login(&mut writer, Uuid::new_random(), "gateway");

    let row = Row::new(vec![WireValue::Str("U1".into())], Columns::new(), 1, "nodeB".to_string());
    let mut insert_out = Vec::new();
    smf_cluster::mutation::insert_request("TDevice", &row).encode(&mut insert_out);
    writer.write_all(&insert_out).unwrap();

    let ack = CommandRecord::decode(&mut writer).unwrap();
    assert_eq!(ack.opcode, opcode::INSERT_RES);

    let forwarded = CommandRecord::decode(&mut subscriber).unwrap();
    assert_eq!(forwarded.opcode, opcode::INSERT_REQ);
    assert_eq!(forwarded.arg(0), Some(&WireValue::Str("TDevice".to_string())));

    assert_eq!(master.registry.table("TDevice").unwrap().len(), 1);
}
