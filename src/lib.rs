//! Polls cloud provider status pages and folds their heterogeneous formats
//! (HTML, Statuspage JSON, Atom) into one status model.
//!
//! Services of the same provider share a [`core::Collector`], which keeps at
//! most one request per provider in flight and serves repeat requests from a
//! short-lived cache.

pub mod config;
pub mod core;
