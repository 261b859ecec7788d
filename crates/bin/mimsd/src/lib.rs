//! Wiring of the MIMS daemon, shared by `main` and the end-to-end tests.

pub mod config;
pub mod wiring;
