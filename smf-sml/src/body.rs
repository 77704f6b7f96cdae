//! The SML message bodies (§4.3) recognized by this proxy. Optional fields
//! follow the wire convention of encoding absence as `EndOfMessage` rather
//! than omitting the list slot, so a body's field count is fixed and a
//! reader never has to guess which optional fields were skipped.
use std::io;

use smf_types::{Obis, SmlValue};

use crate::tlv::TlvValue;

pub const OPEN_REQ: u16 = 1;
pub const OPEN_RES: u16 = 2;
pub const CLOSE_REQ: u16 = 3;
pub const CLOSE_RES: u16 = 4;
pub const GET_PROFILE_LIST_REQ: u16 = 5;
pub const GET_PROFILE_LIST_RES: u16 = 6;
pub const GET_PROC_PARAMETER_REQ: u16 = 7;
pub const GET_PROC_PARAMETER_RES: u16 = 8;
pub const SET_PROC_PARAMETER_REQ: u16 = 9;
pub const GET_LIST_REQ: u16 = 10;
pub const GET_LIST_RES: u16 = 11;
pub const ATTENTION_RES: u16 = 12;

fn opt_octet(v: &Option<Vec<u8>>) -> TlvValue {
    match v {
        Some(bytes) => TlvValue::OctetString(bytes.clone()),
        None => TlvValue::EndOfMessage,
    }
}

fn read_opt_octet(v: &TlvValue) -> Option<Vec<u8>> {
    match v {
        TlvValue::EndOfMessage => None,
        other => other.as_octet_string().map(|b| b.to_vec()),
    }
}

fn opt_u64(v: &Option<u64>) -> TlvValue {
    match v {
        Some(n) => TlvValue::UnsignedInt(*n),
        None => TlvValue::EndOfMessage,
    }
}

fn read_opt_u64(v: &TlvValue) -> Option<u64> {
    match v {
        TlvValue::EndOfMessage => None,
        other => other.as_unsigned(),
    }
}

fn obis_tlv(code: Obis) -> TlvValue {
    TlvValue::OctetString(code.as_bytes().to_vec())
}

fn read_obis(v: &TlvValue) -> io::Result<Obis> {
    let bytes = v
        .as_octet_string()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "expected an obis octet string"))?;
    let arr: [u8; 6] = bytes
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "obis code must be 6 bytes"))?;
    Ok(Obis::from_bytes(arr))
}

fn field(list: &[TlvValue], i: usize) -> io::Result<&TlvValue> {
    list.get(i)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, format!("sml body missing field {i}")))
}

fn expect_list(v: &TlvValue, expected_len: usize, what: &str) -> io::Result<&[TlvValue]> {
    let items = v
        .as_list()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, format!("{what} is not a list")))?;
    if items.len() != expected_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{what} has {} fields, expected {expected_len}", items.len()),
        ));
    }
    Ok(items)
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub codepage: Option<Vec<u8>>,
    pub client_id: Vec<u8>,
    pub req_file_id: Vec<u8>,
    pub server_id: Option<Vec<u8>>,
    pub username: Option<Vec<u8>>,
    pub password: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenResponse {
    pub codepage: Option<Vec<u8>>,
    pub client_id: Option<Vec<u8>>,
    pub req_file_id: Vec<u8>,
    pub server_id: Vec<u8>,
    pub ref_time: Option<u32>,
    pub sml_version: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseRequest {
    pub global_signature: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseResponse {
    pub global_signature: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetProfileListRequest {
    pub server_id: Vec<u8>,
    pub username: Option<Vec<u8>>,
    pub password: Option<Vec<u8>>,
    pub with_raw_data: bool,
    pub begin_time: Option<u32>,
    pub end_time: Option<u32>,
    pub parameter_tree_path: Obis,
    pub object_list: Vec<Obis>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileEntry {
    pub obj_name: Obis,
    pub status: Option<u64>,
    pub val_time: u32,
    pub unit: u8,
    pub scaler: i8,
    pub value: SmlValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetProfileListResponse {
    pub server_id: Vec<u8>,
    pub act_time: u32,
    pub reg_period: u32,
    pub parameter_tree_path: Obis,
    pub val_time: u32,
    pub status: Option<u64>,
    pub period_list: Vec<ProfileEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetProcParameterRequest {
    pub server_id: Vec<u8>,
    pub username: Option<Vec<u8>>,
    pub password: Option<Vec<u8>>,
    pub parameter_tree_path: Obis,
}

/// A node of the OBIS parameter tree the proxy walks to service
/// `get-proc-parameter` dialogues (§4.3): a name, an optional leaf value,
/// and child nodes for unrecognized subtrees preserved verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTree {
    pub name: Obis,
    pub value: Option<SmlValue>,
    pub children: Vec<ParamTree>,
}

impl ParamTree {
    pub fn leaf(name: Obis, value: SmlValue) -> Self {
        ParamTree {
            name,
            value: Some(value),
            children: Vec::new(),
        }
    }

    pub fn node(name: Obis, children: Vec<ParamTree>) -> Self {
        ParamTree {
            name,
            value: None,
            children,
        }
    }

    fn to_tlv(&self) -> TlvValue {
        TlvValue::List(vec![
            obis_tlv(self.name),
            match &self.value {
                Some(v) => TlvValue::from_sml(v),
                None => TlvValue::EndOfMessage,
            },
            TlvValue::List(self.children.iter().map(ParamTree::to_tlv).collect()),
        ])
    }

    fn from_tlv(v: &TlvValue) -> io::Result<ParamTree> {
        let fields = expect_list(v, 3, "param tree node")?;
        let name = read_obis(field(fields, 0)?)?;
        let value = match field(fields, 1)? {
            TlvValue::EndOfMessage => None,
            other => Some(other.to_sml()?),
        };
        let children_list = field(fields, 2)?
            .as_list()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "param tree children is not a list"))?;
        let mut children = Vec::with_capacity(children_list.len());
        for child in children_list {
            children.push(ParamTree::from_tlv(child)?);
        }
        Ok(ParamTree { name, value, children })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetProcParameterResponse {
    pub server_id: Vec<u8>,
    pub parameter_tree_path: Obis,
    pub tree: ParamTree,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetProcParameterRequest {
    pub server_id: Vec<u8>,
    pub username: Option<Vec<u8>>,
    pub password: Option<Vec<u8>>,
    pub parameter_tree_path: Obis,
    pub tree: ParamTree,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetListRequest {
    pub client_id: Option<Vec<u8>>,
    pub server_id: Vec<u8>,
    pub username: Option<Vec<u8>>,
    pub password: Option<Vec<u8>>,
    pub list_name: Obis,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListEntry {
    pub obj_name: Obis,
    pub status: Option<u64>,
    pub val_time: u32,
    pub unit: u8,
    pub scaler: i8,
    pub value: SmlValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetListResponse {
    pub client_id: Option<Vec<u8>>,
    pub server_id: Vec<u8>,
    pub list_name: Obis,
    pub act_sensor_time: Option<u32>,
    pub val_list: Vec<ListEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttentionResponse {
    pub server_id: Vec<u8>,
    pub attention_no: Obis,
    pub attention_msg: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    OpenReq(OpenRequest),
    OpenRes(OpenResponse),
    CloseReq(CloseRequest),
    CloseRes(CloseResponse),
    GetProfileListReq(GetProfileListRequest),
    GetProfileListRes(GetProfileListResponse),
    GetProcParameterReq(GetProcParameterRequest),
    GetProcParameterRes(GetProcParameterResponse),
    SetProcParameterReq(SetProcParameterRequest),
    GetListReq(GetListRequest),
    GetListRes(GetListResponse),
    AttentionRes(AttentionResponse),
}

fn entry_to_tlv(obj_name: Obis, status: &Option<u64>, val_time: u32, unit: u8, scaler: i8, value: &SmlValue) -> TlvValue {
    TlvValue::List(vec![
        obis_tlv(obj_name),
        opt_u64(status),
        TlvValue::UnsignedInt(val_time as u64),
        TlvValue::UnsignedInt(unit as u64),
        TlvValue::SignedInt(scaler as i64),
        TlvValue::from_sml(value),
    ])
}

fn entry_from_tlv(v: &TlvValue) -> io::Result<(Obis, Option<u64>, u32, u8, i8, SmlValue)> {
    let fields = expect_list(v, 6, "sml value entry")?;
    let obj_name = read_obis(field(fields, 0)?)?;
    let status = read_opt_u64(field(fields, 1)?);
    let val_time = field(fields, 2)?
        .as_unsigned()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad val-time"))? as u32;
    let unit = field(fields, 3)?
        .as_unsigned()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad unit"))? as u8;
    let scaler = field(fields, 4)?
        .as_signed()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad scaler"))? as i8;
    let value = field(fields, 5)?.to_sml()?;
    Ok((obj_name, status, val_time, unit, scaler, value))
}

impl MessageBody {
    pub fn choice_code(&self) -> u16 {
        match self {
            MessageBody::OpenReq(_) => OPEN_REQ,
            MessageBody::OpenRes(_) => OPEN_RES,
            MessageBody::CloseReq(_) => CLOSE_REQ,
            MessageBody::CloseRes(_) => CLOSE_RES,
            MessageBody::GetProfileListReq(_) => GET_PROFILE_LIST_REQ,
            MessageBody::GetProfileListRes(_) => GET_PROFILE_LIST_RES,
            MessageBody::GetProcParameterReq(_) => GET_PROC_PARAMETER_REQ,
            MessageBody::GetProcParameterRes(_) => GET_PROC_PARAMETER_RES,
            MessageBody::SetProcParameterReq(_) => SET_PROC_PARAMETER_REQ,
            MessageBody::GetListReq(_) => GET_LIST_REQ,
            MessageBody::GetListRes(_) => GET_LIST_RES,
            MessageBody::AttentionRes(_) => ATTENTION_RES,
        }
    }

    pub fn to_tlv(&self) -> TlvValue {
        match self {
            MessageBody::OpenReq(r) => TlvValue::List(vec![
                opt_octet(&r.codepage),
                TlvValue::OctetString(r.client_id.clone()),
                TlvValue::OctetString(r.req_file_id.clone()),
                opt_octet(&r.server_id),
                opt_octet(&r.username),
                opt_octet(&r.password),
            ]),
            MessageBody::OpenRes(r) => TlvValue::List(vec![
                opt_octet(&r.codepage),
                opt_octet(&r.client_id),
                TlvValue::OctetString(r.req_file_id.clone()),
                TlvValue::OctetString(r.server_id.clone()),
                match r.ref_time {
                    Some(t) => TlvValue::UnsignedInt(t as u64),
                    None => TlvValue::EndOfMessage,
                },
                match r.sml_version {
                    Some(v) => TlvValue::UnsignedInt(v as u64),
                    None => TlvValue::EndOfMessage,
                },
            ]),
            MessageBody::CloseReq(r) => TlvValue::List(vec![opt_octet(&r.global_signature)]),
            MessageBody::CloseRes(r) => TlvValue::List(vec![opt_octet(&r.global_signature)]),
            MessageBody::GetProfileListReq(r) => TlvValue::List(vec![
                TlvValue::OctetString(r.server_id.clone()),
                opt_octet(&r.username),
                opt_octet(&r.password),
                TlvValue::Boolean(r.with_raw_data),
                match r.begin_time {
                    Some(t) => TlvValue::UnsignedInt(t as u64),
                    None => TlvValue::EndOfMessage,
                },
                match r.end_time {
                    Some(t) => TlvValue::UnsignedInt(t as u64),
                    None => TlvValue::EndOfMessage,
                },
                obis_tlv(r.parameter_tree_path),
                TlvValue::List(r.object_list.iter().map(|o| obis_tlv(*o)).collect()),
            ]),
            MessageBody::GetProfileListRes(r) => TlvValue::List(vec![
                TlvValue::OctetString(r.server_id.clone()),
                TlvValue::UnsignedInt(r.act_time as u64),
                TlvValue::UnsignedInt(r.reg_period as u64),
                obis_tlv(r.parameter_tree_path),
                TlvValue::UnsignedInt(r.val_time as u64),
                opt_u64(&r.status),
                TlvValue::List(
                    r.period_list
                        .iter()
                        .map(|e| entry_to_tlv(e.obj_name, &e.status, e.val_time, e.unit, e.scaler, &e.value))
                        .collect(),
                ),
            ]),
            MessageBody::GetProcParameterReq(r) => TlvValue::List(vec![
                TlvValue::OctetString(r.server_id.clone()),
                opt_octet(&r.username),
                opt_octet(&r.password),
                obis_tlv(r.parameter_tree_path),
            ]),
            MessageBody::GetProcParameterRes(r) => TlvValue::List(vec![
                TlvValue::OctetString(r.server_id.clone()),
                obis_tlv(r.parameter_tree_path),
                r.tree.to_tlv(),
            ]),
            MessageBody::SetProcParameterReq(r) => TlvValue::List(vec![
                TlvValue::OctetString(r.server_id.clone()),
                opt_octet(&r.username),
                opt_octet(&r.password),
                obis_tlv(r.parameter_tree_path),
                r.tree.to_tlv(),
            ]),
            MessageBody::GetListReq(r) => TlvValue::List(vec![
                opt_octet(&r.client_id),
                TlvValue::OctetString(r.server_id.clone()),
                opt_octet(&r.username),
                opt_octet(&r.password),
                obis_tlv(r.list_name),
            ]),
            MessageBody::GetListRes(r) => TlvValue::List(vec![
                opt_octet(&r.client_id),
                TlvValue::OctetString(r.server_id.clone()),
                obis_tlv(r.list_name),
                match r.act_sensor_time {
                    Some(t) => TlvValue::UnsignedInt(t as u64),
                    None => TlvValue::EndOfMessage,
                },
                TlvValue::List(
                    r.val_list
                        .iter()
                        .map(|e| entry_to_tlv(e.obj_name, &e.status, e.val_time, e.unit, e.scaler, &e.value))
                        .collect(),
                ),
            ]),
            MessageBody::AttentionRes(r) => TlvValue::List(vec![
                TlvValue::OctetString(r.server_id.clone()),
                obis_tlv(r.attention_no),
                match &r.attention_msg {
                    Some(msg) => TlvValue::OctetString(msg.as_bytes().to_vec()),
                    None => TlvValue::EndOfMessage,
                },
            ]),
        }
    }

    pub fn from_tlv(choice_code: u16, v: &TlvValue) -> io::Result<MessageBody> {
        match choice_code {
            OPEN_REQ => {
                let f = expect_list(v, 6, "open-req")?;
                Ok(MessageBody::OpenReq(OpenRequest {
                    codepage: read_opt_octet(field(f, 0)?),
                    client_id: field(f, 1)?
                        .as_octet_string()
                        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad client-id"))?
                        .to_vec(),
                    req_file_id: field(f, 2)?
                        .as_octet_string()
                        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad req-file-id"))?
                        .to_vec(),
                    server_id: read_opt_octet(field(f, 3)?),
                    username: read_opt_octet(field(f, 4)?),
                    password: read_opt_octet(field(f, 5)?),
                }))
            }
            OPEN_RES => {
                let f = expect_list(v, 6, "open-res")?;
                Ok(MessageBody::OpenRes(OpenResponse {
                    codepage: read_opt_octet(field(f, 0)?),
                    client_id: read_opt_octet(field(f, 1)?),
                    req_file_id: field(f, 2)?
                        .as_octet_string()
                        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad req-file-id"))?
                        .to_vec(),
                    server_id: field(f, 3)?
                        .as_octet_string()
                        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad server-id"))?
                        .to_vec(),
                    ref_time: read_opt_u64(field(f, 4)?).map(|t| t as u32),
                    sml_version: read_opt_u64(field(f, 5)?).map(|v| v as u8),
                }))
            }
            CLOSE_REQ => {
                let f = expect_list(v, 1, "close-req")?;
                Ok(MessageBody::CloseReq(CloseRequest {
                    global_signature: read_opt_octet(field(f, 0)?),
                }))
            }
            CLOSE_RES => {
                let f = expect_list(v, 1, "close-res")?;
                Ok(MessageBody::CloseRes(CloseResponse {
                    global_signature: read_opt_octet(field(f, 0)?),
                }))
            }
            GET_PROFILE_LIST_REQ => {
                let f = expect_list(v, 8, "get-profile-list-req")?;
                let object_list = field(f, 7)?
                    .as_list()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad object-list"))?
                    .iter()
                    .map(read_obis)
                    .collect::<io::Result<Vec<_>>>()?;
                Ok(MessageBody::GetProfileListReq(GetProfileListRequest {
                    server_id: field(f, 0)?
                        .as_octet_string()
                        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad server-id"))?
                        .to_vec(),
                    username: read_opt_octet(field(f, 1)?),
                    password: read_opt_octet(field(f, 2)?),
                    with_raw_data: matches!(field(f, 3)?, TlvValue::Boolean(true)),
                    begin_time: read_opt_u64(field(f, 4)?).map(|t| t as u32),
                    end_time: read_opt_u64(field(f, 5)?).map(|t| t as u32),
                    parameter_tree_path: read_obis(field(f, 6)?)?,
                    object_list,
                }))
            }
            GET_PROFILE_LIST_RES => {
                let f = expect_list(v, 7, "get-profile-list-res")?;
                let period_list = field(f, 6)?
                    .as_list()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad period-list"))?
                    .iter()
                    .map(|e| {
                        let (obj_name, status, val_time, unit, scaler, value) = entry_from_tlv(e)?;
                        Ok(ProfileEntry {
                            obj_name,
                            status,
                            val_time,
                            unit,
                            scaler,
                            value,
                        })
                    })
                    .collect::<io::Result<Vec<_>>>()?;
                Ok(MessageBody::GetProfileListRes(GetProfileListResponse {
                    server_id: field(f, 0)?
                        .as_octet_string()
                        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad server-id"))?
                        .to_vec(),
                    act_time: field(f, 1)?.as_unsigned().unwrap_or(0) as u32,
                    reg_period: field(f, 2)?.as_unsigned().unwrap_or(0) as u32,
                    parameter_tree_path: read_obis(field(f, 3)?)?,
                    val_time: field(f, 4)?.as_unsigned().unwrap_or(0) as u32,
                    status: read_opt_u64(field(f, 5)?),
                    period_list,
                }))
            }
            GET_PROC_PARAMETER_REQ => {
                let f = expect_list(v, 4, "get-proc-parameter-req")?;
                Ok(MessageBody::GetProcParameterReq(GetProcParameterRequest {
                    server_id: field(f, 0)?
                        .as_octet_string()
                        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad server-id"))?
                        .to_vec(),
                    username: read_opt_octet(field(f, 1)?),
                    password: read_opt_octet(field(f, 2)?),
                    parameter_tree_path: read_obis(field(f, 3)?)?,
                }))
            }
            GET_PROC_PARAMETER_RES => {
                let f = expect_list(v, 3, "get-proc-parameter-res")?;
                Ok(MessageBody::GetProcParameterRes(GetProcParameterResponse {
                    server_id: field(f, 0)?
                        .as_octet_string()
                        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad server-id"))?
                        .to_vec(),
                    parameter_tree_path: read_obis(field(f, 1)?)?,
                    tree: ParamTree::from_tlv(field(f, 2)?)?,
                }))
            }
            SET_PROC_PARAMETER_REQ => {
                let f = expect_list(v, 5, "set-proc-parameter-req")?;
                Ok(MessageBody::SetProcParameterReq(SetProcParameterRequest {
                    server_id: field(f, 0)?
                        .as_octet_string()
                        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad server-id"))?
                        .to_vec(),
                    username: read_opt_octet(field(f, 1)?),
                    password: read_opt_octet(field(f, 2)?),
                    parameter_tree_path: read_obis(field(f, 3)?)?,
                    tree: ParamTree::from_tlv(field(f, 4)?)?,
                }))
            }
            GET_LIST_REQ => {
                let f = expect_list(v, 5, "get-list-req")?;
                Ok(MessageBody::GetListReq(GetListRequest {
                    client_id: read_opt_octet(field(f, 0)?),
                    server_id: field(f, 1)?
                        .as_octet_string()
                        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad server-id"))?
                        .to_vec(),
                    username: read_opt_octet(field(f, 2)?),
                    password: read_opt_octet(field(f, 3)?),
                    list_name: read_obis(field(f, 4)?)?,
                }))
            }
            GET_LIST_RES => {
                let f = expect_list(v, 5, "get-list-res")?;
                let val_list = field(f, 4)?
                    .as_list()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad val-list"))?
                    .iter()
                    .map(|e| {
                        let (obj_name, status, val_time, unit, scaler, value) = entry_from_tlv(e)?;
                        Ok(ListEntry {
                            obj_name,
                            status,
                            val_time,
                            unit,
                            scaler,
                            value,
                        })
                    })
                    .collect::<io::Result<Vec<_>>>()?;
                Ok(MessageBody::GetListRes(GetListResponse {
                    client_id: read_opt_octet(field(f, 0)?),
                    server_id: field(f, 1)?
                        .as_octet_string()
                        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad server-id"))?
                        .to_vec(),
                    list_name: read_obis(field(f, 2)?)?,
                    act_sensor_time: read_opt_u64(field(f, 3)?).map(|t| t as u32),
                    val_list,
                }))
            }
            ATTENTION_RES => {
                let f = expect_list(v, 3, "attention-res")?;
                let attention_msg = match field(f, 2)? {
                    TlvValue::EndOfMessage => None,
                    other => Some(
                        String::from_utf8(
                            other
                                .as_octet_string()
                                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad attention-msg"))?
                                .to_vec(),
                        )
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
                    ),
                };
                Ok(MessageBody::AttentionRes(AttentionResponse {
                    server_id: field(f, 0)?
                        .as_octet_string()
                        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad server-id"))?
                        .to_vec(),
                    attention_no: read_obis(field(f, 1)?)?,
                    attention_msg,
                }))
            }
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unrecognized sml message body choice code {other}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smf_types::obis::dictionary;

    #[test]
    fn open_req_round_trips_with_all_optionals_present() {
        let body = MessageBody::OpenReq(OpenRequest {
            codepage: Some(b"ISO 8859-1".to_vec()),
            client_id: b"gw-1".to_vec(),
            req_file_id: b"f-1".to_vec(),
            server_id: Some(vec![5, 1, 2, 3, 4, 5, 6]),
            username: Some(b"root".to_vec()),
            password: Some(b"root".to_vec()),
        });
        let tlv = body.to_tlv();
        let decoded = MessageBody::from_tlv(OPEN_REQ, &tlv).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn open_req_round_trips_with_all_optionals_absent() {
        let body = MessageBody::OpenReq(OpenRequest {
            codepage: None,
            client_id: b"gw-1".to_vec(),
            req_file_id: b"f-1".to_vec(),
            server_id: None,
            username: None,
            password: None,
        });
        let tlv = body.to_tlv();
        let decoded = MessageBody::from_tlv(OPEN_REQ, &tlv).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn get_proc_parameter_response_preserves_unknown_subtree_children() {
        let tree = ParamTree::node(
            dictionary::ACTIVE_DEVICES,
            vec![
                ParamTree::leaf(dictionary::SERVER_ID, SmlValue::OctetString(vec![1, 2, 3])),
                ParamTree::node(Obis::new(9, 9, 9, 9, 9, 9), vec![ParamTree::leaf(
                    Obis::new(1, 1, 1, 1, 1, 1),
                    SmlValue::U64(7),
                )]),
            ],
        );
        let body = MessageBody::GetProcParameterRes(GetProcParameterResponse {
            server_id: vec![5, 1, 2, 3, 4, 5, 6],
            parameter_tree_path: dictionary::ACTIVE_DEVICES,
            tree: tree.clone(),
        });
        let decoded = MessageBody::from_tlv(GET_PROC_PARAMETER_RES, &body.to_tlv()).unwrap();
        match decoded {
            MessageBody::GetProcParameterRes(res) => assert_eq!(res.tree, tree),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn get_profile_list_round_trips_with_entries() {
        let body = MessageBody::GetProfileListRes(GetProfileListResponse {
            server_id: vec![5, 1, 2, 3, 4, 5, 6],
            act_time: 1000,
            reg_period: 900,
            parameter_tree_path: dictionary::ACTIVE_ENERGY_TOTAL,
            val_time: 1000,
            status: Some(0),
            period_list: vec![ProfileEntry {
                obj_name: dictionary::ACTIVE_ENERGY_TOTAL,
                status: None,
                val_time: 1000,
                unit: 30,
                scaler: -1,
                value: SmlValue::I64(12345),
            }],
        });
        let decoded = MessageBody::from_tlv(GET_PROFILE_LIST_RES, &body.to_tlv()).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn get_list_entry_round_trips_a_timestamped_value() {
        use smf_types::TimeValue;

        let body = MessageBody::GetListRes(GetListResponse {
            client_id: None,
            server_id: vec![5, 1, 2, 3, 4, 5, 6],
            list_name: dictionary::ACTIVE_ENERGY_TOTAL,
            act_sensor_time: Some(1 << 31),
            val_list: vec![ListEntry {
                obj_name: dictionary::ACTIVE_ENERGY_TOTAL,
                status: None,
                val_time: 1 << 31,
                unit: 30,
                scaler: 0,
                value: SmlValue::Time(TimeValue::Timestamp(1 << 31)),
            }],
        });
        let decoded = MessageBody::from_tlv(GET_LIST_RES, &body.to_tlv()).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn attention_response_round_trips_with_and_without_message() {
        let with_msg = MessageBody::AttentionRes(AttentionResponse {
            server_id: vec![5, 1, 2, 3, 4, 5, 6],
            attention_no: Obis::new(1, 1, 1, 1, 1, 1),
            attention_msg: Some("busy".into()),
        });
        assert_eq!(MessageBody::from_tlv(ATTENTION_RES, &with_msg.to_tlv()).unwrap(), with_msg);

        let without_msg = MessageBody::AttentionRes(AttentionResponse {
            server_id: vec![5, 1, 2, 3, 4, 5, 6],
            attention_no: Obis::new(1, 1, 1, 1, 1, 1),
            attention_msg: None,
        });
        assert_eq!(
            MessageBody::from_tlv(ATTENTION_RES, &without_msg.to_tlv()).unwrap(),
            without_msg
        );
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        let malformed = TlvValue::List(vec![TlvValue::EndOfMessage]);
        assert!(MessageBody::from_tlv(OPEN_REQ, &malformed).is_err());
    }
}
