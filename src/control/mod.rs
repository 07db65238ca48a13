//! Control-side computations: velocity profiles for the planned waypoints
pub mod trajectory;

pub use self::trajectory::VelocityProfile;
