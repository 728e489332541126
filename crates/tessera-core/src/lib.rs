pub mod avro;
pub mod classifier;
pub mod connectors;
pub mod differ;
pub mod error;
pub mod impact;
pub mod ports;
pub mod principal;
pub mod proposals;
pub mod publishing;
pub mod service;
pub mod types;
pub mod validation;
pub mod version;

pub use error::{ErrorCode, Result, TesseraError};
pub use principal::Principal;
pub use service::{CoreService, CoreServiceImpl};
