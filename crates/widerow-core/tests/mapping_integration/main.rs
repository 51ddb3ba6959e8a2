//! Integration tests for the mapping layer.
//!
//! Every suite runs against the in-memory transport, wrapped so that batch
//! reads come back in reverse order and ordering bugs surface.

mod batch_loader;
mod common;
mod config;
mod failover;
mod indexes;
mod scenarios;
