//! Application services for the relay stage.

mod processor;
mod router;
mod worker;

pub use processor::{
    InvocationOutcome, MessageHandler, ProcessingError, ProcessingResult, XmlRelayProcessor,
};
pub use router::{ErrorPolicy, FailureRoute, Router};
pub use worker::{DrainReport, RelayWorker, WorkerError};
