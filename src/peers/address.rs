//! Peer endpoints

use crate::common::Number160;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// An overlay member: its identifier plus how to reach it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    pub id: Number160,
    pub addr: SocketAddr,
    /// Unreachable over UDP without a relay
    #[serde(default)]
    pub firewalled_udp: bool,
    /// Unreachable over TCP without a relay
    #[serde(default)]
    pub firewalled_tcp: bool,
}

impl PeerAddress {
    pub fn new(id: Number160, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            firewalled_udp: false,
            firewalled_tcp: false,
        }
    }

    /// Same peer, new address. Identity (and so distance) is unchanged.
    pub fn change_address(&self, addr: SocketAddr) -> Self {
        Self {
            addr,
            ..self.clone()
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.addr)
    }
}
