//! Waypoint updater
//!
//! Publishes a short window of waypoints ahead of the vehicle, taken from a
//! fixed map route, with target velocities that hold the speed limit or
//! bring the vehicle to rest at a red traffic light.

pub mod common;
pub mod config;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod navigation;
pub mod perception;

pub use crate::common::{Pose, RoutePoint, Waypoint, Window};
pub use crate::config::PlannerConfig;
pub use crate::error::PlannerError;
pub use crate::lifecycle::LifecycleNode;
pub use crate::navigation::planner::WaypointPlanner;
pub use crate::navigation::publisher::{LaneMessage, LaneSink, WaypointPublisher};
pub use crate::navigation::WaypointUpdater;
