//! End-to-end tests for opsnorm-daemon.
//!
//! Each scenario builds a real [`Orchestrator`] over temp log files and a
//! file output, runs it until a test-controlled shutdown, and inspects the
//! JSON lines it wrote.
//!
//! - `helpers/` -- config builder, output readers
//! - `scenarios/` -- lifecycle, record flow, config errors, shutdown
//!
//! ```bash
//! cargo test -p opsnorm-daemon --test e2e
//! ```
//!
//! [`Orchestrator`]: opsnorm_daemon::orchestrator::Orchestrator

mod helpers;
mod scenarios;
