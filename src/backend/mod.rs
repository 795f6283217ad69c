mod context;
mod error;
mod http;
mod item;
mod transport;

pub use context::Context;
pub use error::BackendError;
pub use http::HttpBackend;
pub use item::{Item, Status};
pub use transport::{Backend, Request, Response};
