//! The XML relay stage.
//!
//! One inbound message becomes one invocation: the payload is validated
//! against a load-once XSD, every element is moved into the target
//! namespace, and the result is published to the output channel. A failed
//! invocation either sends an error record to the error channel
//! (fail-open) or is returned to the runtime (fail-closed).
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Schema loading in [`schema`], checking in [`validation`]
//! - The namespace rewrite in [`transform`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod schema;
pub mod services;
pub mod transform;
pub mod validation;

#[cfg(test)]
mod tests;
