//! Data collectors (§4.5): `_DataCollector[key=(server-id, collector-id)]`
//! selects a profile and a set of OBIS codes (named via `_DataMirror`) to
//! capture out of every readout seen for that server-id. Aggregation itself
//! lives in `readout`; this module only owns the collector's configuration
//! shape and its persisted representation.
use smf_store::{Columns, Table};
use smf_types::{Obis, ServerId, WireValue};

use crate::profile::Profile;

pub const COLLECTOR_TABLE: &str = "_DataCollector";
pub const MIRROR_TABLE: &str = "_DataMirror";

#[derive(Debug, Clone, PartialEq)]
pub struct DataCollector {
    pub server_id: ServerId,
    pub collector_id: u16,
    pub profile: Profile,
    pub active: bool,
}

pub fn collector_key(server_id: &ServerId, collector_id: u16) -> Vec<WireValue> {
    vec![
        WireValue::Buffer(server_id.as_bytes().to_vec()),
        WireValue::U64(collector_id as u64),
    ]
}

fn profile_tag(profile: Profile) -> &'static str {
    profile.table_name()
}

fn profile_from_tag(tag: &str) -> Option<Profile> {
    Profile::ALL.into_iter().find(|p| p.table_name() == tag)
}

pub fn collector_to_columns(c: &DataCollector) -> Columns {
    let mut body = Columns::new();
    body.insert("profile".to_string(), WireValue::Str(profile_tag(c.profile).to_string()));
    body.insert("active".to_string(), WireValue::Bool(c.active));
    body
}

pub fn collector_from_row(server_id: ServerId, collector_id: u16, body: &Columns) -> Option<DataCollector> {
    let profile = match body.get("profile") {
        Some(WireValue::Str(tag)) => profile_from_tag(tag)?,
        _ => return None,
    };
    let active = matches!(body.get("active"), Some(WireValue::Bool(true)));
    Some(DataCollector {
        server_id,
        collector_id,
        profile,
        active,
    })
}

/// One `_DataMirror` row: the OBIS codes a collector captures. The original
/// spreads this across several rows per collector; we keep one row per
/// collector carrying the whole code list, which round-trips the same set
/// without the extra key component.
pub fn mirror_to_columns(codes: &[Obis]) -> Columns {
    let mut body = Columns::new();
    body.insert(
        "codes".to_string(),
        WireValue::Vector(codes.iter().map(|o| WireValue::Buffer(o.as_bytes().to_vec())).collect()),
    );
    body
}

pub fn mirror_from_row(body: &Columns) -> Vec<Obis> {
    match body.get("codes") {
        Some(WireValue::Vector(items)) => items
            .iter()
            .filter_map(|v| match v {
                WireValue::Buffer(b) if b.len() == 6 => {
                    let arr: [u8; 6] = b.as_slice().try_into().ok()?;
                    Some(Obis::from_bytes(arr))
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Declares a collector and its mirrored OBIS codes in one call, the way an
/// operator's configuration interface would provision a new collector.
pub fn declare(
    collectors: &Table,
    mirrors: &Table,
    collector: &DataCollector,
    codes: &[Obis],
    source: &str,
) {
    let key = collector_key(&collector.server_id, collector.collector_id);
    collectors.merge(key.clone(), collector_to_columns(collector), 1, source);
    mirrors.merge(key, mirror_to_columns(codes), 1, source);
}

#[cfg(test)]
mod tests {
    use super::*;
    use smf_types::obis::dictionary;

    fn sid() -> ServerId {
        ServerId::new(vec![0x01, 1, 2, 3, 4, 5, 6]).unwrap()
    }

    #[test]
    fn collector_round_trips_through_its_columns() {
        let c = DataCollector {
            server_id: sid(),
            collector_id: 1,
            profile: Profile::SixtyMin,
            active: true,
        };
        let body = collector_to_columns(&c);
        let decoded = collector_from_row(sid(), 1, &body).unwrap();
        assert_eq!(decoded, c);
    }

    #[test]
    fn mirror_codes_round_trip() {
        let codes = vec![dictionary::ACTIVE_ENERGY_TOTAL, dictionary::VOLTAGE_L1];
        let body = mirror_to_columns(&codes);
        assert_eq!(mirror_from_row(&body), codes);
    }

    #[test]
    fn declare_writes_both_tables_under_the_same_key() {
        let collectors = Table::new(COLLECTOR_TABLE);
        let mirrors = Table::new(MIRROR_TABLE);
        let c = DataCollector {
            server_id: sid(),
            collector_id: 3,
            profile: Profile::OneMin,
            active: true,
        };
        let codes = vec![dictionary::ACTIVE_ENERGY_TOTAL];
        declare(&collectors, &mirrors, &c, &codes, "operator");

        let key = collector_key(&sid(), 3);
        assert!(collectors.lookup(&key).is_some());
        assert_eq!(mirror_from_row(&mirrors.lookup(&key).unwrap().body), codes);
    }
}
