//! Stream relay between chat clients and a search-grounded Gemini model.
//!
//! `relay` owns one upstream generation call per exchange and re-frames its
//! events; `http_server` exposes it over HTTP.

pub mod config;
pub mod http_server;
pub mod relay;
