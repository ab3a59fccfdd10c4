//! `chatline`: line-oriented terminal chat client library.

pub mod app;
pub mod config;
pub mod console;
pub mod format;
pub mod roster;
pub mod session;
pub mod sink;
pub mod transport;
