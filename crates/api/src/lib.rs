pub mod claim;
pub mod models;
pub mod observer;
pub mod sink;

// Re-export commonly used types
pub use claim::ClaimClient;
pub use models::*;
pub use observer::{GraphObserver, NullObserver};
pub use sink::{FactSink, SinkError, VecSink};
