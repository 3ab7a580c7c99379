//! Quizdeck: quiz authoring and study groups over a local document store.
//!
//! The library holds everything both binaries share. The `quizdeck` CLI and
//! the `quizdeck-server` HTTP server are thin shells over [`access::Backend`].

pub mod access;
pub mod actions;
pub mod ai;
pub mod config;
pub mod db;
pub mod server;
