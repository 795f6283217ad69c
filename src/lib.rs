// src/lib.rs
pub mod backend;
pub mod balancer;
pub mod config;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod retry;
pub mod server;
pub mod strategy;

pub use backend::{Backend, BackendError, Context, Item, Request, Response, Status};
pub use balancer::{Balancer, BalancerError};
pub use strategy::StrategyType;
