//! In-memory transport for tests and embedding.

mod channel;
mod source;

pub use channel::{ChannelFailure, InMemoryChannel};
pub use source::InMemorySource;
