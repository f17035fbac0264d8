pub mod controller;
pub mod publisher;
pub mod recovery;
pub mod router;

pub use controller::StatusController;
pub use publisher::GraphPublisher;
pub use recovery::RecoveryService;
pub use router::{ConsumerRouter, RouterConfig};
