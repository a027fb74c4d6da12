//! Wire protocol - JSON-RPC 2.0 frames exchanged with the venue

pub mod frame;
pub mod request;

pub use frame::{decode, Frame, Notification, Reply};
pub use request::{Method, Params, Request, RequestBuilder};
