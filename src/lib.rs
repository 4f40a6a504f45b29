//! Two-door network-connected access-control node core (spec §1-§9).
//!
//! Rearchitected from the teacher's dual-core `no_std` ESP32 firmware into a
//! single-task hosted service (spec §9): one [`engine::CoreState`] owns all
//! mutable state and is driven exclusively by [`scheduler::run`], fed by
//! the HTTP admin surface (`api`), its own periodic housekeeping ticks, and
//! the controller sync client (`controller`).

pub mod api;
pub mod clock;
pub mod config;
pub mod controller;
pub mod decision;
pub mod door;
pub mod engine;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod log_queue;
pub mod model;
pub mod schedule;
pub mod scheduler;
pub mod wiegand;
