//! E2E scenarios.

mod config_error;
mod lifecycle;
mod pipeline_flow;
mod shutdown;
