pub mod circuit;
pub mod delivery;
pub mod signer;
pub mod ssrf;

pub use delivery::{DeliveryRecorder, WebhookConfig, WebhookDispatcher, WebhookEvent};
pub use ssrf::SsrfGuardConfig;
