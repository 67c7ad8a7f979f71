// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! wfh-daemon: process wiring for the per-shard workflow history engine —
//! config load, logging setup, and the in-memory collaborator wiring the
//! scenario runner in `main.rs` drives end to end.
//!
//! The RPC listener a real deployment would run in front of [`wfh_engine::Engine`]
//! is out of scope (spec §1 Non-goals); this crate wires the engine up
//! against `wfh-storage`'s `test-support` fakes and exercises it directly.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod scenario;

pub use scenario::{run_scenario, ScenarioOutcome};
