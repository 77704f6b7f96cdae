//! Session teardown: the ordered cleanup sequence a master runs when a
//! session's socket drops (§4.1 "Failure"). The original source
//! (`nodes/master/src/cluster.cpp`) runs these steps in a fixed order —
//! subscriptions first, `_Target` rows next, `_Session` rows next, a
//! forwarded close to any remote connection party, the `_Cluster` row last
//! before a `_SysMsg` entry — and callers rely on that order (e.g. a
//! `_Connection` row must never survive past its `_Session` row). Each step
//! is independently testable against a bare `Registry` with no socket.
use smf_store::{Columns, Registry};
use smf_types::WireValue;

use crate::subscribe::Subscription;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownStep {
    ClosedSubscriptions(usize),
    RemovedTargets(usize),
    RemovedSessions(usize),
    ForwardedCloseConnection(usize),
    RemovedConnections(usize),
    ErasedCluster,
    EmittedSysMsg,
}

fn str_key(tag: &str) -> Vec<WireValue> {
    vec![WireValue::Str(tag.to_string())]
}

/// Runs the full teardown sequence for `peer_tag` and returns the steps
/// taken, in order, so a caller (or a test) can assert on the sequence
/// rather than just the end state.
pub fn teardown_session(
    registry: &Registry,
    peer_tag: &str,
    subscriptions: Vec<Subscription>,
    remote_connection_peers: &[String],
    mut forward_close: impl FnMut(&str),
    sysmsg_id: u64,
) -> Vec<TeardownStep> {
    let mut steps = Vec::with_capacity(6);

    let n_subs = subscriptions.len();
    for sub in subscriptions {
        sub.detach();
    }
    steps.push(TeardownStep::ClosedSubscriptions(n_subs));

    let removed_targets = registry
        .table("_Target")
        .map(|targets| {
            let owned = targets.find_all(|row| {
                row.column("owner-tag") == Some(&WireValue::Str(peer_tag.to_string()))
            });
            for row in &owned {
                let _ = targets.erase(&row.key, "master");
            }
            owned.len()
        })
        .unwrap_or(0);
    steps.push(TeardownStep::RemovedTargets(removed_targets));

    let removed_sessions = registry
        .table("_Session")
        .map(|sessions| {
            let owned = sessions.find_all(|row| {
                row.column("local-peer") == Some(&WireValue::Str(peer_tag.to_string()))
            });
            for row in &owned {
                let _ = sessions.erase(&row.key, "master");
            }
            owned.len()
        })
        .unwrap_or(0);
    steps.push(TeardownStep::RemovedSessions(removed_sessions));

    for peer in remote_connection_peers {
        forward_close(peer);
    }
    steps.push(TeardownStep::ForwardedCloseConnection(
        remote_connection_peers.len(),
    ));

    let removed_connections = registry
        .table("_Connection")
        .map(|connections| {
            let owned = connections.find_all(|row| {
                row.column("local-peer") == Some(&WireValue::Str(peer_tag.to_string()))
            });
            for row in &owned {
                let _ = connections.erase(&row.key, "master");
            }
            owned.len()
        })
        .unwrap_or(0);
    steps.push(TeardownStep::RemovedConnections(removed_connections));

    if let Some(cluster) = registry.table("_Cluster") {
        let _ = cluster.erase(&str_key(peer_tag), "master");
    }
    steps.push(TeardownStep::ErasedCluster);

    if let Some(sysmsg) = registry.table("_SysMsg") {
        let mut body = Columns::new();
        body.insert("ts".to_string(), WireValue::TimePoint(0));
        body.insert("severity".to_string(), WireValue::Str("info".into()));
        body.insert(
            "msg".to_string(),
            WireValue::Str(format!("session {peer_tag} closed")),
        );
        let _ = sysmsg.insert(vec![WireValue::U64(sysmsg_id)], body, 1, "master");
    }
    steps.push(TeardownStep::EmittedSysMsg);

    steps
}
