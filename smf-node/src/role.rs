//! A node boots into exactly one role, chosen by its configuration's
//! `[server] role` key: a cluster master holding the replicated store's
//! canonical copy, a gateway doing meter readout and push against a
//! replica of it, or a dashboard serving HTTP/WebSocket only. The shape
//! mirrors a cluster bus node's master/replica split, generalized to the
//! three roles this system actually boots into.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Master,
    Gateway,
    Dashboard,
}

impl NodeRole {
    pub fn from_tag(tag: &str) -> Option<NodeRole> {
        match tag {
            "master" => Some(NodeRole::Master),
            "gateway" => Some(NodeRole::Gateway),
            "dashboard" => Some(NodeRole::Dashboard),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            NodeRole::Master => "master",
            NodeRole::Gateway => "gateway",
            NodeRole::Dashboard => "dashboard",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_its_tag() {
        for role in [NodeRole::Master, NodeRole::Gateway, NodeRole::Dashboard] {
            assert_eq!(NodeRole::from_tag(role.tag()), Some(role));
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert_eq!(NodeRole::from_tag("replica"), None);
    }
}
