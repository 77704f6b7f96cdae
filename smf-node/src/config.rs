//! Typed view over a node's configuration document (§6). Parsing itself is
//! `smf_common::config::Document`'s job; this module only knows the option
//! names this system recognizes and how to turn them into the structs the
//! rest of the crate wants.
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use smf_common::config::{ConfigError, Document, Table};

use crate::role::NodeRole;

#[derive(Debug, Clone)]
pub struct ClusterPeer {
    pub host: String,
    pub service: u16,
    pub account: String,
    pub pwd: String,
    pub monitor: u64,
    pub group: String,
    pub auto_config: bool,
}

#[derive(Debug, Clone)]
pub struct IptPeer {
    pub host: String,
    pub service: u16,
    pub account: String,
    pub pwd: String,
    pub def_sk: Option<String>,
    pub scrambled: bool,
    pub monitor: u64,
}

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub address: String,
    pub service: u16,
    pub account: Option<String>,
    pub pwd: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HardwareOptions {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub class: String,
    pub mac: String,
}

#[derive(Debug, Clone)]
pub struct MbusOptions {
    pub readout_interval: u64,
    pub search_interval: u64,
    pub auto_activate: bool,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub tag: String,
    pub log_dir: String,
    pub log_level: String,
    pub role: NodeRole,
    pub server: ServerOptions,
    pub hardware: Option<HardwareOptions>,
    pub cluster: Vec<ClusterPeer>,
    pub ipt: Vec<IptPeer>,
    pub mbus: MbusOptions,
    pub doc_root: Option<String>,
}

fn cluster_peer(t: &Table) -> Result<ClusterPeer, ConfigError> {
    Ok(ClusterPeer {
        host: t.get_str("host")?.to_string(),
        service: t.get_int("service")? as u16,
        account: t.get_str_opt("account").unwrap_or("").to_string(),
        pwd: t.get_str_opt("pwd").unwrap_or("").to_string(),
        monitor: t.get_int_opt("monitor").unwrap_or(10) as u64,
        group: t.get_str_opt("group").unwrap_or("default").to_string(),
        auto_config: t.get_bool("auto-config", false),
    })
}

fn ipt_peer(t: &Table) -> Result<IptPeer, ConfigError> {
    Ok(IptPeer {
        host: t.get_str("host")?.to_string(),
        service: t.get_int("service")? as u16,
        account: t.get_str_opt("account").unwrap_or("").to_string(),
        pwd: t.get_str_opt("pwd").unwrap_or("").to_string(),
        def_sk: t.get_str_opt("def-sk").map(str::to_string),
        scrambled: t.get_bool("scrambled", false),
        monitor: t.get_int_opt("monitor").unwrap_or(10) as u64,
    })
}

impl NodeConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<NodeConfig, ConfigError> {
        let text = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Syntax {
            line: 0,
            message: format!("cannot read {}: {e}", path.as_ref().display()),
        })?;
        Self::from_text(&text)
    }

    pub fn from_text(text: &str) -> Result<NodeConfig, ConfigError> {
        let doc = Document::parse(text)?;

        let server_section = doc
            .section("server")
            .ok_or_else(|| ConfigError::MissingKey("server".to_string()))?;
        let server = ServerOptions {
            address: server_section.get_str("address")?.to_string(),
            service: server_section.get_int("service")? as u16,
            account: server_section.get_str_opt("account").map(str::to_string),
            pwd: server_section.get_str_opt("pwd").map(str::to_string),
        };

        let hardware = doc.section("hardware").map(|t| HardwareOptions {
            manufacturer: t.get_str_opt("manufacturer").unwrap_or("unknown").to_string(),
            model: t.get_str_opt("model").unwrap_or("unknown").to_string(),
            serial: t.get_str_opt("serial").unwrap_or("").to_string(),
            class: t.get_str_opt("class").unwrap_or("electricity").to_string(),
            mac: t.get_str_opt("mac").unwrap_or("").to_string(),
        });

        let cluster = doc
            .array("cluster")
            .iter()
            .map(cluster_peer)
            .collect::<Result<Vec<_>, _>>()?;
        let ipt = doc
            .array("ipt")
            .iter()
            .map(ipt_peer)
            .collect::<Result<Vec<_>, _>>()?;

        let role_tag = doc.root.get_str_opt("role").unwrap_or("gateway");
        let role = NodeRole::from_tag(role_tag)
            .ok_or_else(|| ConfigError::MissingKey(format!("unrecognized role '{role_tag}'")))?;

        let mbus = doc.section("mbus").map(|t| MbusOptions {
            readout_interval: t.get_int_opt("readout-interval").unwrap_or(900) as u64,
            search_interval: t.get_int_opt("search-interval").unwrap_or(3600) as u64,
            auto_activate: t.get_bool("auto-activate", false),
        }).unwrap_or(MbusOptions {
            readout_interval: 900,
            search_interval: 3600,
            auto_activate: false,
        });

        Ok(NodeConfig {
            tag: doc.root.get_str("tag")?.to_string(),
            log_dir: doc.root.get_str_opt("log-dir").unwrap_or("./log").to_string(),
            log_level: doc.root.get_str_opt("log-level").unwrap_or("info").to_string(),
            role,
            server,
            hardware,
            cluster,
            ipt,
            mbus,
            doc_root: doc.root.get_str_opt("doc-root").map(str::to_string),
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.address, self.server.service).parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        tag = "node-1"
        log-dir = "/var/log/smf"
        log-level = "info"
        role = "gateway"

        [server]
        address = "0.0.0.0"
        service = 8080

        [hardware]
        manufacturer = "Acme"
        model = "G1"
        class = "electricity"
        mac = "00:11:22:33:44:55"

        [[cluster]]
        host = "127.0.0.1"
        service = 7701
        monitor = 10
        auto-config = true
    "#;

    #[test]
    fn parses_the_full_option_set() {
        let cfg = NodeConfig::from_text(SAMPLE).unwrap();
        assert_eq!(cfg.tag, "node-1");
        assert_eq!(cfg.role, NodeRole::Gateway);
        assert_eq!(cfg.server.service, 8080);
        assert_eq!(cfg.hardware.unwrap().manufacturer, "Acme");
        assert_eq!(cfg.cluster.len(), 1);
        assert!(cfg.cluster[0].auto_config);
    }

    #[test]
    fn defaults_to_gateway_role_when_unset() {
        let text = SAMPLE.replace(r#"role = "gateway""#, "");
        let cfg = NodeConfig::from_text(&text).unwrap();
        assert_eq!(cfg.role, NodeRole::Gateway);
    }

    #[test]
    fn listen_addr_combines_address_and_service() {
        let cfg = NodeConfig::from_text(SAMPLE).unwrap();
        assert_eq!(cfg.listen_addr().unwrap(), "0.0.0.0:8080".parse().unwrap());
    }
}
