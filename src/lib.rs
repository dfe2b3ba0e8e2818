#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # Breaker Core
//!
//! An embeddable circuit breaker. A [`Breaker`] wraps a unit of work against an
//! unreliable dependency, observes its outcome, and fails fast while the
//! dependency is unhealthy, so that one failing downstream cannot exhaust the
//! resources of every caller upstream.
//!
//! Generally, there are several steps when embedding a breaker:
//! 1. Add the dependency and initialize logging.
//! 2. Describe the breaker with a [`Rule`] (failure threshold and recovery timeout).
//! 3. Route calls to the dependency through [`Breaker::execute`] (or
//!    `Breaker::execute_async` with the `async` feature).
//! 4. Inspect [`Breaker::current_state`] and [`Breaker::service_level`], or register a
//!    [`StateChangeListener`], to feed the embedding application's own telemetry.
//!
//! ## Add Dependency
//!
//! Add the dependency in `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! breaker-core = { version = "0.1.0", features = ["full"] }
//! ```
//!
//! Optional features list:
//! - async: asynchronous `execute_async` entry point for operations that suspend.
//! - logger_env: use `env_logger` to initialize logging.
//!
//! ## Wrapping an Operation
//!
//! The wrapped operation reports abnormal termination as a [`Failure`], a cause
//! tagged with a [`FailureKind`]. The breaker counts the failure, possibly trips,
//! and re-raises it as [`BreakerError::Operation`] with the original cause attached:
//!
//! ```rust
//! use breaker_core::breaker::{Breaker, BreakerError, Failure, FailureKind, Rule};
//!
//! let breaker = Breaker::new(Rule {
//!     failure_threshold: 5,
//!     retry_timeout_ms: 60_000,
//!     ..Default::default()
//! })?;
//!
//! match breaker.execute(|| remote_call().map_err(|e| Failure::new(FailureKind::Connection, e))) {
//!     Ok(reply) => handle(reply),
//!     Err(BreakerError::Open) => { /* fail fast, the dependency is considered down */ }
//!     Err(err) => { /* the call itself failed, inspect err.failure() */ }
//! }
//! ```
//!
//! Failure kinds added to the ignored set (see [`Breaker::add_ignored_kind`])
//! bypass the breaker entirely: they neither count against the threshold nor
//! change state, and propagate as-is.
//!
//! ## State Machine
//!
//! `Closed -> Open` once the failure count reaches the threshold, `Open ->
//! HalfOpen` when the recovery timer elapses, and the single probe call decides
//! between `HalfOpen -> Closed` (success) and `HalfOpen -> Open` (failure).
//! [`Breaker::trip`] and [`Breaker::reset`] force the transitions imperatively.
//!
// This module is not intended to be part of the public API. In general, any
// `doc(hidden)` code is not part of the crate's public and stable API.
#[macro_use]
#[doc(hidden)]
pub mod macros;

/// Core implementation: the circuit breaker state machine, its rule entity,
/// the recovery timer abstraction and the error taxonomy.
pub mod core;
/// Adapters for different logging crates.
pub mod logging;
// Utility functions shared across the crate.
pub mod utils;

// re-export preludes
pub use crate::core::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
