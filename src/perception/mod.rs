//! Perception module: where the vehicle is relative to the route
pub mod localization;

pub use self::localization::RouteLocalizer;
