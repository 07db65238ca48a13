//! Error types for the waypoint updater

use crate::lifecycle::State;
use thiserror::Error;

/// Errors produced by the planning pipeline
#[derive(Debug, Error)]
pub enum PlannerError {
    /// An input the planner needs has not arrived yet
    #[error("{0} not received yet")]
    NotReady(&'static str),

    /// Localization was attempted against an empty route
    #[error("route has no points")]
    NoRoute,

    /// A route index outside `[0, len)`
    #[error("route index {index} out of range for route of {len} points")]
    OutOfRange { index: usize, len: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot transition from {from:?} to {to:?}")]
    InvalidTransition { from: State, to: State },

    #[error("failed to lock {0}")]
    LockPoisoned(&'static str),

    #[error("failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PlannerError {
    /// Whether the error only means "nothing to publish yet"
    pub fn is_not_ready(&self) -> bool {
        matches!(self, PlannerError::NotReady(_) | PlannerError::NoRoute)
    }
}
