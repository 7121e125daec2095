//! Per-host risk registry
//!
//! A mutable multiplier applied to alert severity when computing relation
//! relevance. The registry is an owned instance threaded through the engine;
//! its lifecycle is the engine lifecycle.

use super::address::IpAddress;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Risk multiplier for a host.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct RiskLevel(pub f32);

impl RiskLevel {
    pub const LOW: RiskLevel = RiskLevel(0.5);
    pub const MEDIUM: RiskLevel = RiskLevel(1.0);
    pub const HIGH: RiskLevel = RiskLevel(1.5);
}

/// Wire shape of a host risk entry as exposed by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRisk {
    pub ip_address: String,
    pub risk_level: f32,
}

/// Registry of per-host risk overrides with a default for unregistered
/// hosts.
#[derive(Debug)]
pub struct HostRiskRegistry {
    default_level: RiskLevel,
    levels: FxHashMap<IpAddress, RiskLevel>,
}

impl HostRiskRegistry {
    pub fn new(default_level: RiskLevel) -> Self {
        HostRiskRegistry {
            default_level,
            levels: FxHashMap::default(),
        }
    }

    pub fn set(&mut self, address: IpAddress, level: RiskLevel) {
        self.levels.insert(address, level);
    }

    pub fn clear(&mut self, address: IpAddress) {
        self.levels.remove(&address);
    }

    pub fn level_of(&self, address: IpAddress) -> RiskLevel {
        self.levels
            .get(&address)
            .copied()
            .unwrap_or(self.default_level)
    }

    pub fn hosts(&self) -> Vec<HostRisk> {
        self.levels
            .iter()
            .map(|(address, level)| HostRisk {
                ip_address: address.to_string(),
                risk_level: level.0,
            })
            .collect()
    }
}

impl Default for HostRiskRegistry {
    fn default() -> Self {
        Self::new(RiskLevel::MEDIUM)
    }
}
