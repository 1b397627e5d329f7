//! End-to-end tests with fake desktop, voice and recognizer backends.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod app_loop;
mod config_roundtrip;
mod helpers;
mod orchestrator_flow;
mod remote_flow;
