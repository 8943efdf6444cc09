pub mod claim;
pub mod emitter;
pub mod error;
pub mod logging;
pub mod recorder;
pub mod signature;

pub use claim::{AcceptAllClient, StaticClaimClient};
pub use emitter::GraphEmitter;
pub use error::{CoreError, Result};
pub use recorder::{FactRecorder, JsonWriterSink};
