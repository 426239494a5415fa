//! HTTP surface for triggering and inspecting meal notification runs.

pub mod routes;
pub mod state;
