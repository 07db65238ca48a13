//! Common utilities and types for the waypoint updater

use nalgebra::{Point3, UnitQuaternion, Vector2};

/// Convert a speed in km/h to m/s
pub fn kmh_to_mps(kmh: f64) -> f64 {
    kmh * 1000.0 / 3600.0
}

/// Yaw (rotation about +z) of an orientation quaternion
pub fn yaw_of(orientation: &UnitQuaternion<f64>) -> f64 {
    let (_, _, yaw) = orientation.euler_angles();
    yaw
}

/// Unit vector in the x/y plane pointing along `yaw`
pub fn heading_vector(yaw: f64) -> Vector2<f64> {
    Vector2::new(yaw.cos(), yaw.sin())
}

/// A single point of the map route
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutePoint {
    pub position: Point3<f64>,
    pub orientation: UnitQuaternion<f64>,
    /// Speed limit at this point (m/s)
    pub reference_velocity: f64,
}

impl RoutePoint {
    /// Create a route point from a planar position and heading
    pub fn new(x: f64, y: f64, yaw: f64, reference_velocity: f64) -> Self {
        RoutePoint {
            position: Point3::new(x, y, 0.0),
            orientation: UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
            reference_velocity,
        }
    }

    /// Heading of the route at this point
    pub fn yaw(&self) -> f64 {
        yaw_of(&self.orientation)
    }

    /// Euclidean distance to another route point
    pub fn distance_to(&self, other: &RoutePoint) -> f64 {
        nalgebra::distance(&self.position, &other.position)
    }
}

/// Current vehicle state as reported by localization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Point3<f64>,
    pub orientation: UnitQuaternion<f64>,
    /// Time of the measurement in seconds
    pub stamp: f64,
}

impl Pose {
    /// Create a pose from a planar position and heading
    pub fn new(x: f64, y: f64, yaw: f64, stamp: f64) -> Self {
        Pose {
            position: Point3::new(x, y, 0.0),
            orientation: UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
            stamp,
        }
    }

    pub fn yaw(&self) -> f64 {
        yaw_of(&self.orientation)
    }
}

/// A route point annotated with the velocity to hold on this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    /// Index of the point in the route
    pub index: usize,
    pub point: RoutePoint,
    /// Target velocity (m/s)
    pub velocity: f64,
}

/// The forward-looking sequence of waypoints produced on each tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Window {
    pub waypoints: Vec<Waypoint>,
}

impl Window {
    pub fn empty() -> Self {
        Window::default()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Route index of the first waypoint, if any
    pub fn start_index(&self) -> Option<usize> {
        self.waypoints.first().map(|wp| wp.index)
    }

    pub fn velocities(&self) -> Vec<f64> {
        self.waypoints.iter().map(|wp| wp.velocity).collect()
    }
}
