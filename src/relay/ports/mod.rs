//! Port contracts for the relay stage.
//!
//! Ports define transport- and schema-agnostic interfaces used by the relay
//! services.

pub mod channel;
pub mod source;
pub mod validator;

pub use channel::{OutboundChannel, PublishError, PublishResult};
pub use source::{InboundSource, SourceError, SourceResult};
pub use validator::DocumentValidator;
