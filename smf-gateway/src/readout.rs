//! The readout loop (§4.5): every `readout-interval` seconds, snapshot the
//! `_Readout`/`_ReadoutData` cache, dispatch each readout to every active
//! collector for its server-id, write one bucket row per profile, then
//! erase the consumed cache rows. Aggregation itself (`compute_buckets`) is
//! kept free of any table or lock so it can be exercised without a
//! `Registry` at all; `run_cycle` is the thin I/O shell around it.
use std::collections::HashMap;

use smf_store::Registry;
use smf_types::{Obis, ScaledValue, ServerId, WireValue};

use crate::collector::DataCollector;
use crate::profile::{Bucket, BucketRing, Profile};

pub const READOUT_TABLE: &str = "_Readout";
pub const READOUT_DATA_TABLE: &str = "_ReadoutData";

#[derive(Debug, Clone, PartialEq)]
pub struct Readout {
    pub server_id: ServerId,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadoutDatum {
    pub server_id: ServerId,
    pub timestamp: u64,
    pub obis: Obis,
    pub value: ScaledValue,
}

fn obis_column_name(code: Obis) -> String {
    code.format()
}

/// Builds one bucket per `(collector, readout)` pair where the collector is
/// active and matches the readout's server-id. A bucket's body carries one
/// column per mirrored OBIS code found in the readout's data, named by the
/// code's canonical rendering; codes the mirror lists but the readout
/// didn't produce this cycle are simply absent, not zero-filled.
pub fn compute_buckets(
    readouts: &[Readout],
    data: &[ReadoutDatum],
    collectors: &[DataCollector],
    mirror_codes: &HashMap<(ServerId, u16), Vec<Obis>>,
) -> Vec<(Profile, Bucket)> {
    let mut out = Vec::new();
    for readout in readouts {
        let matching_data: Vec<&ReadoutDatum> = data
            .iter()
            .filter(|d| d.server_id == readout.server_id && d.timestamp == readout.timestamp)
            .collect();
        for collector in collectors {
            if !collector.active || collector.server_id != readout.server_id {
                continue;
            }
            let codes = mirror_codes
                .get(&(collector.server_id.clone(), collector.collector_id))
                .cloned()
                .unwrap_or_default();
            let mut body = smf_store::Columns::new();
            for code in &codes {
                if let Some(datum) = matching_data.iter().find(|d| d.obis == *code) {
                    body.insert(
                        obis_column_name(*code),
                        WireValue::Tuple(vec![
                            WireValue::I64(datum.value.raw),
                            WireValue::I64(datum.value.scaler as i64),
                            WireValue::U64(datum.value.unit as u64),
                        ]),
                    );
                }
            }
            let bucket = Bucket {
                server_id: readout.server_id.clone(),
                bucket_key: collector.profile.bucket_of(readout.timestamp),
                body,
            };
            out.push((collector.profile, bucket));
        }
    }
    out
}

fn bucket_row_key(server_id: &ServerId, bucket_key: u64) -> Vec<WireValue> {
    vec![WireValue::Buffer(server_id.as_bytes().to_vec()), WireValue::U64(bucket_key)]
}

/// Runs one readout cycle against the registry: snapshots the cache tables,
/// writes a bucket per matched collector into its profile table, pushes it
/// onto that server/profile's retry ring, then erases the cache rows the
/// cycle consumed.
pub fn run_cycle(
    registry: &Registry,
    collectors: &[DataCollector],
    mirror_codes: &HashMap<(ServerId, u16), Vec<Obis>>,
    history: &mut HashMap<(ServerId, Profile), BucketRing>,
    source: &str,
) -> usize {
    let snapshot = registry.access(&[READOUT_TABLE, READOUT_DATA_TABLE], |guards| {
        let readouts: Vec<Readout> = guards[0]
            .rows()
            .filter_map(|row| {
                let server_id = match row.key.first() {
                    Some(WireValue::Buffer(b)) => ServerId::new(b.clone()).ok()?,
                    _ => return None,
                };
                let timestamp = match row.body.get("timestamp") {
                    Some(WireValue::U64(t)) => *t,
                    _ => return None,
                };
                Some(Readout { server_id, timestamp })
            })
            .collect();
        let data: Vec<ReadoutDatum> = guards[1]
            .rows()
            .filter_map(|row| {
                let server_id = match row.key.first() {
                    Some(WireValue::Buffer(b)) => ServerId::new(b.clone()).ok()?,
                    _ => return None,
                };
                let timestamp = match row.body.get("timestamp") {
                    Some(WireValue::U64(t)) => *t,
                    _ => return None,
                };
                let obis = match row.body.get("obis") {
                    Some(WireValue::Buffer(b)) if b.len() == 6 => {
                        Obis::from_bytes(b.as_slice().try_into().ok()?)
                    }
                    _ => return None,
                };
                let (raw, scaler, unit) = match row.body.get("value") {
                    Some(WireValue::Tuple(t)) if t.len() == 3 => (
                        t[0].clone(),
                        t[1].clone(),
                        t[2].clone(),
                    ),
                    _ => return None,
                };
                let raw = match raw {
                    WireValue::I64(v) => v,
                    _ => return None,
                };
                let scaler = match scaler {
                    WireValue::I64(v) => v as i8,
                    _ => return None,
                };
                let unit = match unit {
                    WireValue::U64(v) => v as u8,
                    _ => return None,
                };
                Some(ReadoutDatum {
                    server_id,
                    timestamp,
                    obis,
                    value: ScaledValue::new(raw, scaler, unit),
                })
            })
            .collect();
        (readouts, data)
    });

    let Some((readouts, data)) = snapshot else {
        return 0;
    };
    if readouts.is_empty() {
        return 0;
    }

    let buckets = compute_buckets(&readouts, &data, collectors, mirror_codes);
    for (profile, bucket) in &buckets {
        if let Some(table) = registry.table(profile.table_name()) {
            let key = bucket_row_key(&bucket.server_id, bucket.bucket_key);
            table.merge(key, bucket.body.clone(), 1, source);
        }
        history
            .entry((bucket.server_id.clone(), *profile))
            .or_insert_with(BucketRing::new)
            .push(bucket.clone());
    }

    registry.access(&[READOUT_TABLE, READOUT_DATA_TABLE], |guards| {
        let readout_keys: Vec<Vec<WireValue>> = guards[0].rows().map(|r| r.key.clone()).collect();
        for k in readout_keys {
            guards[0].remove_raw(&k);
        }
        let data_keys: Vec<Vec<WireValue>> = guards[1].rows().map(|r| r.key.clone()).collect();
        for k in data_keys {
            guards[1].remove_raw(&k);
        }
    });

    buckets.len()
}
