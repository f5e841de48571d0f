//! Instance-document validation.
//!
//! Checks a payload against the configured [`crate::relay::schema::Schema`]:
//! every element and attribute in one pass, with every error reported
//! together and located by its element path.

mod rules;
pub mod service;
mod simple;

pub use rules::XSI_NAMESPACE;
pub use service::{SchemaValidator, validate};

#[cfg(test)]
mod tests;
