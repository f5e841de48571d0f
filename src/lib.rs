//! xmlrelay: a queue-to-queue XML processing stage.
//!
//! Each inbound message is validated against a load-once XML Schema, has
//! every element moved into a fixed target namespace, and is published to
//! an output channel. Failures are either recorded on an error channel
//! (fail-open) or handed back to the runtime for redelivery (fail-closed).
//!
//! # Architecture
//!
//! The relay follows hexagonal architecture principles:
//!
//! - **Domain**: documents, messages and the invocation state machine
//! - **Ports**: trait interfaces for channels, sources and validators
//! - **Adapters**: in-memory and file-spool transports
//!
//! # Modules
//!
//! - [`relay`]: validation, transformation and routing
//! - [`config`]: startup settings and fail-fast checks
//! - [`telemetry`]: tracing subscriber setup

pub mod config;
pub mod relay;
pub mod telemetry;
