pub mod gateway;
pub mod orchestrator;
pub mod sepay;
pub mod session;
pub mod watcher;

pub use gateway::{
    CreatePaymentLink, GatewayError, GatewayStatus, PaymentGateway, PaymentItem, PaymentLink,
};
pub use orchestrator::{MockGateway, PaymentError, PaymentOrchestrator};
pub use sepay::{SePayConfig, SePayGateway};
pub use session::{PaymentSession, PaymentTarget, SessionState, SessionStore};
pub use watcher::{PaymentWatcher, WatchOutcome, WatcherConfig, WatcherHandle, WatcherRegistry};
