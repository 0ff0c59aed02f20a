//! Application services layer.
//!
//! This module contains the background services that drive the daemon between
//! the API layer and its collaborators (location, time-table, playback).

pub mod scheduler;

pub use scheduler::{MatchPolicy, Scheduler, TickReport};
