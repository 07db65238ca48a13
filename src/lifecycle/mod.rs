//! Lifecycle management for waypoint updater components

use crate::error::PlannerError;

/// Trait for components that follow a lifecycle pattern
pub trait LifecycleNode: Send + Sync {
    /// Configure the node
    fn on_configure(&mut self) -> Result<(), PlannerError>;

    /// Activate the node
    fn on_activate(&mut self) -> Result<(), PlannerError>;

    /// Deactivate the node
    fn on_deactivate(&mut self) -> Result<(), PlannerError>;

    /// Clean up the node
    fn on_cleanup(&mut self) -> Result<(), PlannerError>;
}

/// Base implementation for lifecycle nodes
#[derive(Debug)]
pub struct LifecycleNodeBase {
    pub name: String,
    state: State,
}

/// State of a lifecycle node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unconfigured,
    Inactive,
    Active,
}

impl LifecycleNodeBase {
    /// Create a new lifecycle node base
    pub fn new(name: &str) -> Self {
        LifecycleNodeBase {
            name: name.to_string(),
            state: State::Unconfigured,
        }
    }

    /// Get the current state
    pub fn get_state(&self) -> State {
        self.state
    }

    /// Move to `to`, rejecting transitions the lifecycle does not allow
    pub fn transition(&mut self, to: State) -> Result<(), PlannerError> {
        let allowed = matches!(
            (self.state, to),
            (State::Unconfigured, State::Inactive)
                | (State::Inactive, State::Active)
                | (State::Active, State::Inactive)
                | (State::Inactive, State::Unconfigured)
        );
        if !allowed {
            return Err(PlannerError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        log::debug!("{}: {:?} -> {:?}", self.name, self.state, to);
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_configure_activate_cycle() {
        let mut base = LifecycleNodeBase::new("test");
        assert_eq!(base.get_state(), State::Unconfigured);
        base.transition(State::Inactive).unwrap();
        base.transition(State::Active).unwrap();
        base.transition(State::Inactive).unwrap();
        base.transition(State::Unconfigured).unwrap();
    }

    #[test]
    fn rejects_activation_before_configure() {
        let mut base = LifecycleNodeBase::new("test");
        let err = base.transition(State::Active).unwrap_err();
        assert!(matches!(
            err,
            PlannerError::InvalidTransition {
                from: State::Unconfigured,
                to: State::Active
            }
        ));
        assert_eq!(base.get_state(), State::Unconfigured);
    }
}
