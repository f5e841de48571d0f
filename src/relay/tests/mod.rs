//! Unit tests for the relay stage.

mod processor_tests;
mod state_transition_tests;
