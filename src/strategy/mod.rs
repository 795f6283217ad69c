// src/strategy/mod.rs
mod algorithm;
mod least_connections;
mod round_robin;

pub use algorithm::{Cursor, Strategy};
pub use least_connections::LeastConnections;
pub use round_robin::RoundRobin;

use crate::backend::Item;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    #[default]
    RoundRobin,
    LeastConnections,
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyType::RoundRobin => f.write_str("round_robin"),
            StrategyType::LeastConnections => f.write_str("least_connections"),
        }
    }
}

impl FromStr for StrategyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "round_robin" | "roundrobin" => Ok(StrategyType::RoundRobin),
            "least_connections" | "leastconnections" => Ok(StrategyType::LeastConnections),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

/// Fresh strategy over `items` with its cursor at the start.
pub fn build_strategy(
    kind: StrategyType,
    items: Arc<[Arc<Item>]>,
    cooldown: Duration,
) -> Box<dyn Strategy> {
    match kind {
        StrategyType::RoundRobin => Box::new(RoundRobin::new(items, cooldown)),
        StrategyType::LeastConnections => Box::new(LeastConnections::new(items, cooldown)),
    }
}
