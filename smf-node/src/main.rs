//! Process entry point: loads a node's configuration, boots it into
//! exactly one role (§6, `role.rs`), and blocks until a shutdown signal
//! arrives. This is glue, not a core subsystem — the protocol engines and
//! the store do the work; main only wires owned instances together and
//! decides the process's exit code (§6).
mod channel;
mod config;
mod http;
mod ipt_listener;
mod role;
mod server;
mod ws;

use std::collections::HashMap;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use smf_common::logger::Logger;
use smf_gateway::{collector, inventory, oplog, push, readout};
use smf_gateway::profile::{BucketRing, Profile};
use smf_store::Registry;
use smf_types::{Obis, ServerId, WireValue};

use config::NodeConfig;
use role::NodeRole;

fn main() {
    let path = std::env::args().nth(1).unwrap_or_else(|| "smf.conf".to_string());
    let config = match NodeConfig::from_file(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("smf-node: configuration error in '{path}': {e}");
            std::process::exit(1);
        }
    };

    std::fs::create_dir_all(&config.log_dir).ok();
    let log_path = PathBuf::from(&config.log_dir).join(format!("{}.log", config.tag));
    let logger = Logger::new(log_path.to_string_lossy().as_ref());
    logger.info("main", &format!("node '{}' starting in {} role", config.tag, config.role));

    let exit_code = match config.role {
        NodeRole::Master => run_master(&config, logger),
        NodeRole::Gateway => run_gateway(&config, logger),
        NodeRole::Dashboard => run_dashboard(&config, logger),
    };
    std::process::exit(exit_code);
}

fn install_shutdown_handler(logger: Logger, tag: String) {
    let _ = ctrlc::set_handler(move || {
        logger.info("main", &format!("node '{tag}' received shutdown signal"));
        std::process::exit(0);
    });
}

fn run_master(config: &NodeConfig, logger: Logger) -> i32 {
    let account = config.server.account.clone().unwrap_or_else(|| "root".to_string());
    let pwd = config.server.pwd.clone().unwrap_or_else(|| "root".to_string());
    let master = smf_cluster::Master::new(account, pwd, Duration::from_secs(30), logger.clone());

    let addr = match config.listen_addr() {
        Ok(a) => a,
        Err(e) => {
            logger.error("main", &format!("cannot parse listen address: {e}"));
            return 1;
        }
    };
    let listener = match TcpListener::bind(addr) {
        Ok(l) => l,
        Err(e) => {
            logger.error("main", &format!("cannot bind cluster listener on {addr}: {e}"));
            return 1;
        }
    };
    logger.info("main", &format!("master listening on {addr}"));
    install_shutdown_handler(logger, config.tag.clone());
    master.serve(listener);
    0
}

fn run_dashboard(config: &NodeConfig, logger: Logger) -> i32 {
    let mut registry = Registry::new();
    for table in [
        "TDevice", "TGateway", "TMeter", "_Session", "_Target", "_Connection", "_Cluster",
        "_Config", "_SysMsg", readout::READOUT_TABLE, readout::READOUT_DATA_TABLE,
        inventory::TABLE_NAME, collector::COLLECTOR_TABLE, collector::MIRROR_TABLE,
        push::TABLE_NAME, oplog::TABLE_NAME,
    ] {
        registry.declare(table);
    }
    for profile in Profile::ALL {
        registry.declare(profile.table_name());
    }
    let registry = Arc::new(registry);

    let doc_root = PathBuf::from(config.doc_root.clone().unwrap_or_else(|| "./www".to_string()));
    let addr = match config.listen_addr() {
        Ok(a) => a,
        Err(e) => {
            logger.error("main", &format!("cannot parse listen address: {e}"));
            return 1;
        }
    };
    let listener = match TcpListener::bind(addr) {
        Ok(l) => l,
        Err(e) => {
            logger.error("main", &format!("cannot bind dashboard listener on {addr}: {e}"));
            return 1;
        }
    };
    logger.info("main", &format!("dashboard listening on {addr}"));
    install_shutdown_handler(logger.clone(), config.tag.clone());

    let dashboard = Arc::new(server::DashboardServer::new(registry, doc_root, logger));
    dashboard.run(listener);
    0
}

fn run_gateway(config: &NodeConfig, logger: Logger) -> i32 {
    let mut registry = Registry::new();
    for table in [
        readout::READOUT_TABLE,
        readout::READOUT_DATA_TABLE,
        inventory::TABLE_NAME,
        collector::COLLECTOR_TABLE,
        collector::MIRROR_TABLE,
        push::TABLE_NAME,
        oplog::TABLE_NAME,
    ] {
        registry.declare(table);
    }
    for profile in Profile::ALL {
        registry.declare(profile.table_name());
    }
    let registry = Arc::new(registry);

    let readout_interval = Duration::from_secs(config.mbus.readout_interval.max(1));
    {
        let registry = Arc::clone(&registry);
        let logger = logger.clone();
        thread::spawn(move || readout_loop(registry, readout_interval, logger));
    }

    let account = config.server.account.clone().unwrap_or_else(|| "gateway".to_string());
    let pwd = config.server.pwd.clone().unwrap_or_else(|| "gateway".to_string());
    spawn_push_tasks(&registry, config, &logger);

    let addr = match config.listen_addr() {
        Ok(a) => a,
        Err(e) => {
            logger.error("main", &format!("cannot parse listen address: {e}"));
            return 1;
        }
    };
    let listener = match TcpListener::bind(addr) {
        Ok(l) => l,
        Err(e) => {
            logger.error("main", &format!("cannot bind ip-t listener on {addr}: {e}"));
            return 1;
        }
    };
    logger.info("main", &format!("gateway accepting device connections on {addr}"));
    install_shutdown_handler(logger.clone(), config.tag.clone());

    let cluster = connect_to_cluster(config, &logger);
    let ipt = ipt_listener::IptListener::new(account, pwd, logger, cluster);
    ipt.run(listener);
    0
}

/// Dials this node's configured cluster master, if any, so push-target and
/// connection activity can be reported into `_Session`/`_Target`/`_Connection`.
/// A dial failure is logged but not fatal — the gateway still serves devices,
/// it simply has nothing to report into.
fn connect_to_cluster(config: &NodeConfig, logger: &Logger) -> Option<Arc<smf_cluster::ClusterClient>> {
    let peer = config.cluster.first()?;
    let addr: std::net::SocketAddr = format!("{}:{}", peer.host, peer.service).parse().ok()?;
    match smf_cluster::ClusterClient::connect(addr, &peer.account, &peer.pwd, "gateway", &peer.group) {
        Ok(client) => {
            logger.info("main", &format!("joined cluster at {addr} as '{}'", client.tag));
            Some(Arc::new(client))
        }
        Err(e) => {
            logger.warn("main", &format!("cannot join cluster at {addr}: {e}"));
            None
        }
    }
}

fn readout_loop(registry: Arc<Registry>, interval: Duration, logger: Logger) {
    let mut history: HashMap<(ServerId, Profile), BucketRing> = HashMap::new();
    loop {
        thread::sleep(interval);

        let collectors: Vec<_> = registry
            .table(collector::COLLECTOR_TABLE)
            .map(|t| {
                t.find_all(|_| true)
                    .into_iter()
                    .filter_map(|row| {
                        let server_id = server_id_from_key(&row.key)?;
                        collector::collector_from_row(server_id, collector_id_from_key(&row.key)?, &row.body)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mirrors: HashMap<(ServerId, u16), Vec<Obis>> = registry
            .table(collector::MIRROR_TABLE)
            .map(|t| {
                t.find_all(|_| true)
                    .into_iter()
                    .filter_map(|row| {
                        let server_id = server_id_from_key(&row.key)?;
                        let collector_id = collector_id_from_key(&row.key)?;
                        Some(((server_id, collector_id), collector::mirror_from_row(&row.body)))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let written = readout::run_cycle(&registry, &collectors, &mirrors, &mut history, "gateway");
        if written > 0 {
            logger.debug("readout", "cycle wrote buckets", written);
        }
    }
}

fn server_id_from_key(key: &[WireValue]) -> Option<ServerId> {
    match key.first() {
        Some(WireValue::Buffer(b)) => ServerId::new(b.clone()).ok(),
        _ => None,
    }
}

fn collector_id_from_key(key: &[WireValue]) -> Option<u16> {
    match key.get(1) {
        Some(WireValue::U64(n)) => Some(*n as u16),
        _ => None,
    }
}

/// Starts one thread per configured `_PushOps` row, matching §4.5's "a push
/// task is started per row" boot behavior. The target address dialed is
/// the node's own upstream IP-T peer (`ipt[]`, first entry); `op.target`
/// names the push target registered *there*.
fn spawn_push_tasks(registry: &Arc<Registry>, config: &NodeConfig, logger: &Logger) {
    let Some(peer) = config.ipt.first().cloned() else {
        logger.info("push", "no ipt[] upstream configured; push tasks disabled");
        return;
    };
    let Some(table) = registry.table(push::TABLE_NAME) else {
        return;
    };

    for row in table.find_all(|_| true) {
        let Some(server_id) = server_id_from_key(&row.key) else { continue };
        let Some(push_id) = collector_id_from_key(&row.key) else { continue };
        let Some(op) = push::from_row(server_id, push_id, &row.body) else { continue };

        let registry = Arc::clone(registry);
        let peer = peer.clone();
        let logger = logger.clone();
        thread::spawn(move || push_task_loop(registry, peer, op, logger));
    }
}

fn push_task_loop(registry: Arc<Registry>, peer: config::IptPeer, op: push::PushOp, logger: Logger) {
    thread::sleep(op.delay);
    let addr = format!("{}:{}", peer.host, peer.service);
    let trx = smf_sml::TransactionIdGenerator::new();
    let mut backoff = push::PushBackoff::new(op.interval);

    loop {
        let mirror_key = (op.server_id.clone(), op.push_id);
        let codes = registry
            .table(collector::MIRROR_TABLE)
            .and_then(|t| t.lookup(&collector::collector_key(&mirror_key.0, mirror_key.1)))
            .map(|row| collector::mirror_from_row(&row.body))
            .unwrap_or_default();

        // The most recent bucket for this server-id: profile tables key on
        // `(server-id, bucket-index)`, so the row with the largest index is
        // the latest one the readout loop wrote.
        let bucket = registry
            .table(op.profile.table_name())
            .map(|t| {
                t.find_all(|row| server_id_from_key(&row.key).as_ref() == Some(&op.server_id))
            })
            .unwrap_or_default()
            .into_iter()
            .filter_map(|row| {
                let server_id = server_id_from_key(&row.key)?;
                let bucket_key = match row.key.get(1) {
                    Some(WireValue::U64(n)) => *n,
                    _ => return None,
                };
                Some(smf_gateway::profile::Bucket {
                    server_id,
                    bucket_key,
                    body: row.body,
                })
            })
            .max_by_key(|b| b.bucket_key);

        if let Some(bucket) = bucket {
            match push::run_push_cycle(&addr, &peer.account, &peer.pwd, &op, &bucket, &codes, &trx) {
                Ok(()) => {
                    backoff.reset();
                    logger.info("push", &format!("pushed {} bucket {} to '{}'", op.profile.table_name(), bucket.bucket_key, op.target));
                }
                Err(e) => {
                    logger.warn("push", &format!("push to '{}' failed: {e}", op.target));
                    thread::sleep(backoff.next_delay());
                    continue;
                }
            }
        }

        thread::sleep(op.interval);
    }
}
