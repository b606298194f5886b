//! Orchestration of one analysis run over a backend connection.

pub mod controller;
pub mod run;

pub use controller::{
    SessionController, SessionSettings, SessionSnapshot, SessionUpdate, ToggleOutcome,
};
pub use run::{RunOutcome, RunSession};
