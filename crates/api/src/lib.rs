//! HTTP API: configuration, routing, bearer authentication and the role gate.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
