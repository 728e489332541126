pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::auth_middleware;
pub use request_id::{request_id_middleware, RequestId};
