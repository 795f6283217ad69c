// src/balancer/mod.rs
mod balancer;
mod error;

pub use balancer::{ActiveStrategy, Balancer};
pub use error::BalancerError;
