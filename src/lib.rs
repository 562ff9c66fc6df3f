//! Gamelab · interactive coding exercises
//!
//! A pure exercise state machine (bug hunts, block ordering, complexity
//! questions) with its collaborators: blueprint normalization, answer
//! verification, scoring and scene progression. The `state` and `routes`
//! modules put it behind an HTTP + WebSocket API.

pub mod config;
pub mod domain;
pub mod error;
pub mod feedback;
pub mod machine;
pub mod normalize;
pub mod progression;
pub mod protocol;
pub mod routes;
pub mod sandbox;
pub mod scoring;
pub mod seeds;
pub mod state;
pub mod telemetry;
pub mod util;
pub mod verify;
