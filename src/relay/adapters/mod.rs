//! Adapter implementations for relay ports.

pub mod memory;
pub mod spool;
