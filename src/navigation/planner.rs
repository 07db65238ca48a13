//! Waypoint window planner
//!
//! Keeps the latest route, pose and stop index and turns them into a window
//! of annotated waypoints on every tick. Inputs are written from transport
//! callbacks while a periodic loop calls [`WaypointPlanner::tick`].

use crate::common::{Pose, RoutePoint, Window};
use crate::config::PlannerConfig;
use crate::control::trajectory::VelocityProfile;
use crate::error::PlannerError;
use crate::navigation::route::RouteStore;
use crate::perception::localization::RouteLocalizer;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, RwLock};

const NO_STOP: i64 = -1;

/// Localization result of the previous tick
#[derive(Debug, Clone, Copy)]
struct Hint {
    generation: u64,
    index: usize,
}

/// Builds the forward-looking waypoint window
#[derive(Debug)]
pub struct WaypointPlanner {
    lookahead: usize,
    speed_limit: f64,
    circular: bool,
    route: RouteStore,
    pose: RwLock<Option<Pose>>,
    stop_index: AtomicI64,
    hint: Mutex<Option<Hint>>,
    localizer: RouteLocalizer,
    profile: VelocityProfile,
}

impl WaypointPlanner {
    /// Create a planner from configuration
    pub fn new(config: &PlannerConfig) -> Self {
        WaypointPlanner {
            lookahead: config.lookahead_wps,
            speed_limit: config.speed_limit_mps(),
            circular: config.circular_route,
            route: RouteStore::new(),
            pose: RwLock::new(None),
            stop_index: AtomicI64::new(NO_STOP),
            hint: Mutex::new(None),
            localizer: RouteLocalizer::new(
                config.search_window,
                config.relocalization_distance_m,
            ),
            profile: VelocityProfile::new(config.decel_limit_mps2, config.braking_horizon_m),
        }
    }

    /// Speed limit in m/s
    pub fn speed_limit(&self) -> f64 {
        self.speed_limit
    }

    pub fn route(&self) -> &RouteStore {
        &self.route
    }

    /// Store the full route, discarding any cached localization
    pub fn set_route(&self, points: Vec<RoutePoint>) -> Result<(), PlannerError> {
        let count = points.len();
        let generation = self.route.set_route(points)?;
        *self
            .hint
            .lock()
            .map_err(|_| PlannerError::LockPoisoned("localization hint"))? = None;
        log::info!(
            "Route received: {} points, speed limit {:.2} m/s (generation {})",
            count,
            self.speed_limit,
            generation
        );
        Ok(())
    }

    /// Replace the cached vehicle pose
    pub fn update_pose(&self, pose: Pose) -> Result<(), PlannerError> {
        *self
            .pose
            .write()
            .map_err(|_| PlannerError::LockPoisoned("vehicle pose"))? = Some(pose);
        Ok(())
    }

    /// Replace the cached stop index. Negative values clear it.
    pub fn update_stop_index(&self, raw: i64) {
        let value = if raw < 0 { NO_STOP } else { raw };
        let previous = self.stop_index.swap(value, Ordering::AcqRel);
        if previous != value {
            log::info!("Stop index changed: {} -> {}", previous, value);
        }
    }

    pub fn stop_index(&self) -> Option<usize> {
        let raw = self.stop_index.load(Ordering::Acquire);
        usize::try_from(raw).ok()
    }

    pub fn pose(&self) -> Option<Pose> {
        self.pose.read().ok().and_then(|pose| *pose)
    }

    /// Forget every cached input
    pub fn reset(&self) -> Result<(), PlannerError> {
        self.route.clear()?;
        *self
            .pose
            .write()
            .map_err(|_| PlannerError::LockPoisoned("vehicle pose"))? = None;
        *self
            .hint
            .lock()
            .map_err(|_| PlannerError::LockPoisoned("localization hint"))? = None;
        self.stop_index.store(NO_STOP, Ordering::Release);
        Ok(())
    }

    /// Compute the window for the latest inputs, logging and returning an
    /// empty window if it cannot be built
    pub fn tick(&self) -> Window {
        match self.try_tick() {
            Ok(window) => window,
            Err(e) if e.is_not_ready() => {
                log::debug!("Skipping tick: {}", e);
                Window::empty()
            }
            Err(e) => {
                log::error!("Failed to build waypoint window: {}", e);
                Window::empty()
            }
        }
    }

    /// Compute the window for the latest inputs
    pub fn try_tick(&self) -> Result<Window, PlannerError> {
        let snapshot = self.route.snapshot()?;
        let pose = (*self
            .pose
            .read()
            .map_err(|_| PlannerError::LockPoisoned("vehicle pose"))?)
        .ok_or(PlannerError::NotReady("pose"))?;
        let stop_index = self.stop_index();

        let hint = {
            let hint = self
                .hint
                .lock()
                .map_err(|_| PlannerError::LockPoisoned("localization hint"))?;
            (*hint)
                .filter(|h| h.generation == snapshot.generation)
                .map(|h| h.index)
        };

        let route = &snapshot.route;
        let start = self
            .localizer
            .nearest_ahead_of(route, &pose, hint, self.circular)?;
        let indices = route.window_indices(start, self.lookahead, self.circular);
        let window =
            self.profile
                .annotate(route, &indices, stop_index, self.speed_limit, self.circular)?;

        *self
            .hint
            .lock()
            .map_err(|_| PlannerError::LockPoisoned("localization hint"))? = Some(Hint {
            generation: snapshot.generation,
            index: start,
        });

        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner() -> WaypointPlanner {
        let config = PlannerConfig {
            velocity_kmh: 36.0,
            ..PlannerConfig::default()
        };
        WaypointPlanner::new(&config)
    }

    fn straight(n: usize) -> Vec<RoutePoint> {
        (0..n)
            .map(|i| RoutePoint::new(i as f64, 0.0, 0.0, 10.0))
            .collect()
    }

    #[test]
    fn empty_until_route_and_pose_arrive() {
        let planner = planner();
        assert!(planner.tick().is_empty());
        assert!(matches!(
            planner.try_tick(),
            Err(PlannerError::NotReady("route"))
        ));

        planner.set_route(straight(100)).unwrap();
        assert!(matches!(planner.try_tick(), Err(PlannerError::NotReady("pose"))));

        planner.update_pose(Pose::new(0.0, 0.0, 0.0, 0.0)).unwrap();
        assert_eq!(planner.tick().len(), 50);
    }

    #[test]
    fn empty_route_yields_empty_window() {
        let planner = planner();
        planner.set_route(Vec::new()).unwrap();
        planner.update_pose(Pose::new(0.0, 0.0, 0.0, 0.0)).unwrap();
        assert!(matches!(planner.try_tick(), Err(PlannerError::NoRoute)));
        assert!(planner.tick().is_empty());
    }

    #[test]
    fn negative_stop_index_clears_the_stop() {
        let planner = planner();
        planner.update_stop_index(12);
        assert_eq!(planner.stop_index(), Some(12));
        planner.update_stop_index(-1);
        assert_eq!(planner.stop_index(), None);
    }

    #[test]
    fn stop_beyond_route_skips_the_tick() {
        let planner = planner();
        planner.set_route(straight(100)).unwrap();
        planner.update_pose(Pose::new(0.0, 0.0, 0.0, 0.0)).unwrap();
        planner.update_stop_index(100);
        assert!(matches!(
            planner.try_tick(),
            Err(PlannerError::OutOfRange { index: 100, len: 100 })
        ));
        assert!(planner.tick().is_empty());
    }

    #[test]
    fn window_follows_the_vehicle() {
        let planner = planner();
        planner.set_route(straight(100)).unwrap();
        for x in [0.0, 10.0, 30.0, 80.0] {
            planner.update_pose(Pose::new(x, 0.0, 0.0, x)).unwrap();
            let window = planner.tick();
            assert_eq!(window.start_index(), Some(x as usize));
        }
    }

    #[test]
    fn reset_forgets_inputs() {
        let planner = planner();
        planner.set_route(straight(10)).unwrap();
        planner.update_pose(Pose::new(0.0, 0.0, 0.0, 0.0)).unwrap();
        planner.update_stop_index(5);
        planner.reset().unwrap();
        assert!(planner.pose().is_none());
        assert!(planner.stop_index().is_none());
        assert!(!planner.route().is_ready());
    }
}
