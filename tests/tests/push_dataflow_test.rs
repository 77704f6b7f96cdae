//! Drives `smf_gateway::push::run_push_cycle` against a hand-rolled fake
//! push sink speaking raw IP-T frames, and decodes the SML payload it
//! receives back into a `GetProfileListResponse` — the full gateway-to-sink
//! push path, not just the pure payload-shaping helpers it is built from.
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use smf_gateway::profile::{Bucket, Profile};
use smf_gateway::push::{self, PushOp};
use smf_ipt::command::Command;
use smf_ipt::framing::Frame;
use smf_ipt::login::{LoginRequest, LoginResponse, ResponseCode};
use smf_ipt::push::{OpenPushChannelRequest, OpenPushChannelResponse, Status, TransferPushData};
use smf_sml::envelope::decode_envelope;
use smf_sml::message::Message;
use smf_sml::MessageBody;
use smf_sml::TransactionIdGenerator;
use smf_store::Columns;
use smf_types::obis::dictionary;
use smf_types::{ServerId, WireValue};

fn sink(listener: TcpListener) {
    let (mut stream, _) = listener.accept().unwrap();

    let login_frame = Frame::decode_public(&mut stream).unwrap();
    assert_eq!(Command::from_code(login_frame.cmd), Command::LoginPublicReq);
    let login = LoginRequest::from_payload(&login_frame.payload).unwrap();
    assert_eq!(login.account, "gateway");
    let login_res = LoginResponse {
        code: ResponseCode::Success,
        watchdog_period: 1,
        redirect: None,
        new_sk: None,
    };
    let reply = Frame::new(login_frame.seq, Command::LoginPublicRes.code(), login_res.to_payload());
    stream.write_all(&reply.encode_public()).unwrap();

    let open_frame = Frame::decode_public(&mut stream).unwrap();
    assert_eq!(Command::from_code(open_frame.cmd), Command::OpenPushChannelReq);
    let open_req = OpenPushChannelRequest::from_payload(&open_frame.payload).unwrap();
    assert_eq!(open_req.target_name, "data.sink.1");
    let open_res = OpenPushChannelResponse {
        channel: 7,
        source: 1,
        packet_size: 4096,
        window_size: 1,
        status: Status::Success,
    };
    let reply = Frame::new(open_frame.seq, Command::OpenPushChannelRes.code(), open_res.to_payload());
    stream.write_all(&reply.encode_public()).unwrap();

    let transfer_frame = Frame::decode_public(&mut stream).unwrap();
    assert_eq!(Command::from_code(transfer_frame.cmd), Command::TransferPushDataReq);
    let transfer = TransferPushData::from_payload(&transfer_frame.payload).unwrap();
    let ack = transfer.ack(Status::Success);
    let reply = Frame::new(transfer_frame.seq, Command::TransferPushDataRes.code(), ack.to_payload());
    stream.write_all(&reply.encode_public()).unwrap();

    let sml_body = decode_envelope(&transfer.data).unwrap();
    let (message, _) = Message::decode_with_crc(&sml_body).unwrap();
    let MessageBody::GetProfileListRes(response) = message.body else {
        panic!("expected a get-profile-list response");
    };
    assert_eq!(response.period_list.len(), 1);
    assert_eq!(response.period_list[0].obj_name, dictionary::ACTIVE_ENERGY_TOTAL);

    let close_frame = Frame::decode_public(&mut stream).unwrap();
    assert_eq!(Command::from_code(close_frame.cmd), Command::ClosePushChannelReq);
    let reply = Frame::new(close_frame.seq, Command::ClosePushChannelRes.code(), Vec::new());
    stream.write_all(&reply.encode_public()).unwrap();
}

#[test]
fn run_push_cycle_delivers_a_decodable_profile_bucket() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = thread::spawn(move || sink(listener));

    let server_id = ServerId::new(vec![0x05, 1, 2, 3, 4, 5, 6]).unwrap();
    let op = PushOp {
        server_id: server_id.clone(),
        push_id: 1,
        profile: Profile::SixtyMin,
        interval: Duration::from_secs(3600),
        delay: Duration::ZERO,
        target: "data.sink.1".to_string(),
    };

    let mut body = Columns::new();
    body.insert(
        dictionary::ACTIVE_ENERGY_TOTAL.format(),
        WireValue::Tuple(vec![WireValue::I64(1234), WireValue::I64(-1), WireValue::U64(30)]),
    );
    let bucket = Bucket {
        server_id,
        bucket_key: 1,
        body,
    };

    let trx = TransactionIdGenerator::new();
    push::run_push_cycle(
        &addr.to_string(),
        "gateway",
        "gateway",
        &op,
        &bucket,
        &[dictionary::ACTIVE_ENERGY_TOTAL],
        &trx,
    )
    .unwrap();

    server.join().unwrap();
}
