//! Shared identifier types.

mod request_id;

pub use request_id::{InvalidRequestId, RequestId};
