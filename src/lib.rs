//! voxd: offline bilingual text-to-speech engine.
//!
//! The engine runs as a long-lived daemon that owns the expensive voice
//! models. Clients connect over a Unix-socket message protocol, send
//! `speak`/`stop`/`ping` requests, and receive asynchronous `result`
//! replies. A single-flight speaking guard keeps at most one
//! synthesis+playback cycle in flight process-wide; concurrent attempts
//! are rejected, never queued.

pub mod assets;
pub mod audio;
pub mod client;
pub mod config;
pub mod error;
pub mod ipc;
pub mod language;
pub mod model;
pub mod playback;
pub mod server;
pub mod session;
#[cfg(feature = "sherpa")]
pub mod sherpa;

#[cfg(test)]
mod testutil;
