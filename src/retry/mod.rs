mod policy;

pub use policy::{RetryDecision, RetryPolicy};
