//! Outbound waypoint publishing

use crate::common::{Waypoint, Window};
use std::time::SystemTime;

/// Message envelope handed to the transport layer
#[derive(Debug, Clone, PartialEq)]
pub struct LaneMessage {
    pub frame_id: String,
    pub stamp: SystemTime,
    pub waypoints: Vec<Waypoint>,
}

/// Transport that delivers lane messages to downstream consumers
#[cfg_attr(test, mockall::automock)]
pub trait LaneSink: Send + Sync {
    fn send(&self, lane: &LaneMessage) -> anyhow::Result<()>;
}

/// Wraps planner windows into lane messages and sends them
pub struct WaypointPublisher {
    frame_id: String,
    sink: Box<dyn LaneSink>,
}

impl WaypointPublisher {
    pub fn new(frame_id: &str, sink: Box<dyn LaneSink>) -> Self {
        WaypointPublisher {
            frame_id: frame_id.to_string(),
            sink,
        }
    }

    /// Publish a window. Empty windows are skipped.
    ///
    /// Returns whether a message was sent.
    pub fn publish(&self, window: &Window) -> anyhow::Result<bool> {
        if window.is_empty() {
            return Ok(false);
        }

        let lane = LaneMessage {
            frame_id: self.frame_id.clone(),
            stamp: SystemTime::now(),
            waypoints: window.waypoints.clone(),
        };
        self.sink.send(&lane)?;
        Ok(true)
    }
}

impl std::fmt::Debug for WaypointPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaypointPublisher")
            .field("frame_id", &self.frame_id)
            .finish_non_exhaustive()
    }
}
