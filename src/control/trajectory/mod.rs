//! Velocity profile generation
//!
//! Assigns a target velocity to every waypoint of a window. Without an active
//! stop line the vehicle cruises at the speed limit; with one it follows a
//! constant-deceleration profile that reaches zero exactly at the stop point.

use crate::common::{Waypoint, Window};
use crate::error::PlannerError;
use crate::navigation::route::Route;

/// Velocity profile generator
#[derive(Debug, Clone)]
pub struct VelocityProfile {
    decel_limit: f64,
    braking_horizon: f64,
}

impl VelocityProfile {
    /// Create a new profile generator.
    ///
    /// `decel_limit` is the comfortable deceleration (m/s^2); stop lines more
    /// than `braking_horizon` metres past the end of the window are ignored.
    pub fn new(decel_limit: f64, braking_horizon: f64) -> Self {
        VelocityProfile {
            decel_limit,
            braking_horizon,
        }
    }

    /// Velocity to hold `distance` metres before a stop line
    pub fn braking_velocity(&self, distance: f64) -> f64 {
        (2.0 * self.decel_limit * distance.max(0.0)).sqrt()
    }

    /// Annotate the route points at `indices` with target velocities.
    ///
    /// `indices` must be a contiguous run along the route starting at the
    /// vehicle, as produced by [`Route::window_indices`].
    pub fn annotate(
        &self,
        route: &Route,
        indices: &[usize],
        stop_index: Option<usize>,
        speed_limit: f64,
        circular: bool,
    ) -> Result<Window, PlannerError> {
        let Some(&start) = indices.first() else {
            return Ok(Window::empty());
        };

        // Arc length from the window start to each waypoint
        let mut along = Vec::with_capacity(indices.len());
        let mut travelled = 0.0;
        let mut previous = route.point_at(start)?;
        for &index in indices {
            let point = route.point_at(index)?;
            travelled += previous.distance_to(point);
            along.push(travelled);
            previous = point;
        }
        let window_length = travelled;

        let stop = match stop_index {
            Some(stop) => self.active_stop(route, start, stop, window_length, circular)?,
            None => None,
        };

        let waypoints = indices
            .iter()
            .zip(along.iter())
            .enumerate()
            .map(|(offset, (&index, &distance_from_start))| {
                let point = route.points()[index];
                let cruise = point.reference_velocity.min(speed_limit).max(0.0);
                let velocity = match stop {
                    Some((stop_offset, _)) if offset >= stop_offset => 0.0,
                    Some((_, stop_distance)) => {
                        cruise.min(self.braking_velocity(stop_distance - distance_from_start))
                    }
                    None => cruise,
                };
                Waypoint {
                    index,
                    point,
                    velocity,
                }
            })
            .collect();

        Ok(Window { waypoints })
    }

    /// Window offset and arc distance of the stop line if it should shape the
    /// profile, `None` when the vehicle should cruise
    fn active_stop(
        &self,
        route: &Route,
        start: usize,
        stop: usize,
        window_length: f64,
        circular: bool,
    ) -> Result<Option<(usize, f64)>, PlannerError> {
        route.point_at(stop)?;

        // The vehicle has crept over the stop line: hold it
        let n = route.len();
        let just_crossed = if circular {
            (stop + 1) % n == start
        } else {
            stop + 1 == start
        };
        if just_crossed {
            return Ok(Some((0, 0.0)));
        }

        let (offset, distance) = if circular {
            ((stop + n - start) % n, route.loop_distance(start, stop)?)
        } else if stop < start {
            log::debug!("Stop index {} already passed (vehicle at {})", stop, start);
            return Ok(None);
        } else {
            (stop - start, route.distance(start, stop)?)
        };

        if distance > window_length + self.braking_horizon {
            return Ok(None);
        }
        Ok(Some((offset, distance)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::RoutePoint;

    fn straight(n: usize, reference: f64) -> Route {
        Route::new(
            (0..n)
                .map(|i| RoutePoint::new(i as f64, 0.0, 0.0, reference))
                .collect(),
        )
    }

    fn profile() -> VelocityProfile {
        VelocityProfile::new(1.0, 50.0)
    }

    #[test]
    fn cruises_without_a_stop() {
        let route = straight(100, 12.0);
        let indices = route.window_indices(0, 50, false);
        let window = profile().annotate(&route, &indices, None, 10.0, false).unwrap();
        assert_eq!(window.len(), 50);
        assert!(window.waypoints.iter().all(|wp| wp.velocity == 10.0));
    }

    #[test]
    fn reference_velocity_below_limit_is_kept() {
        let route = straight(10, 4.0);
        let indices = route.window_indices(0, 10, false);
        let window = profile().annotate(&route, &indices, None, 10.0, false).unwrap();
        assert!(window.waypoints.iter().all(|wp| wp.velocity == 4.0));
    }

    #[test]
    fn brakes_to_zero_at_the_stop_line() {
        let route = straight(100, 10.0);
        let indices = route.window_indices(0, 50, false);
        let window = profile().annotate(&route, &indices, Some(20), 10.0, false).unwrap();
        let v = window.velocities();

        assert_eq!(v[20], 0.0);
        assert!(v[21..].iter().all(|&x| x == 0.0));
        assert!((v[19] - 2.0_f64.sqrt()).abs() < 1e-9);
        assert!((v[0] - 10.0_f64.min(40.0_f64.sqrt())).abs() < 1e-9);
        for k in 0..20 {
            assert!(v[k] >= v[k + 1]);
        }
    }

    #[test]
    fn stop_at_window_start_stops_everything() {
        let route = straight(100, 10.0);
        let indices = route.window_indices(30, 50, false);
        let window = profile().annotate(&route, &indices, Some(30), 10.0, false).unwrap();
        assert!(window.waypoints.iter().all(|wp| wp.velocity == 0.0));
    }

    #[test]
    fn passed_stop_line_is_ignored() {
        let route = straight(100, 10.0);
        let indices = route.window_indices(30, 50, false);
        let window = profile().annotate(&route, &indices, Some(25), 10.0, false).unwrap();
        assert!(window.waypoints.iter().all(|wp| wp.velocity == 10.0));
    }

    #[test]
    fn stop_line_just_behind_the_start_still_holds() {
        let route = straight(100, 10.0);
        let indices = route.window_indices(30, 50, false);
        let window = profile().annotate(&route, &indices, Some(29), 10.0, false).unwrap();
        assert!(window.waypoints.iter().all(|wp| wp.velocity == 0.0));

        // Same on a loop, across the seam
        let route = straight(20, 10.0);
        let indices = route.window_indices(0, 10, true);
        let window = profile().annotate(&route, &indices, Some(19), 10.0, true).unwrap();
        assert!(window.waypoints.iter().all(|wp| wp.velocity == 0.0));
    }

    #[test]
    fn stop_beyond_horizon_is_ignored() {
        let route = straight(300, 10.0);
        let indices = route.window_indices(0, 50, false);
        // Window covers 49 m, horizon adds 50 m
        let window = profile().annotate(&route, &indices, Some(150), 10.0, false).unwrap();
        assert!(window.waypoints.iter().all(|wp| wp.velocity == 10.0));

        let window = profile().annotate(&route, &indices, Some(90), 10.0, false).unwrap();
        assert!((window.waypoints[49].velocity - 82.0_f64.sqrt().min(10.0)).abs() < 1e-9);
        assert!(window.waypoints[49].velocity < 10.0);
    }

    #[test]
    fn stop_past_route_end_is_out_of_range() {
        let route = straight(10, 10.0);
        let indices = route.window_indices(0, 10, false);
        let err = profile().annotate(&route, &indices, Some(10), 10.0, false).unwrap_err();
        assert!(matches!(err, PlannerError::OutOfRange { index: 10, len: 10 }));
    }

    #[test]
    fn braking_uses_arc_length_on_curves() {
        // Right angle: 5 m east then 5 m north, stop at the end
        let mut points: Vec<RoutePoint> = (0..=5)
            .map(|i| RoutePoint::new(i as f64, 0.0, 0.0, 10.0))
            .collect();
        points.extend((1..=5).map(|i| RoutePoint::new(5.0, i as f64, 0.0, 10.0)));
        let route = Route::new(points);
        let indices = route.window_indices(0, 11, false);
        let window = profile().annotate(&route, &indices, Some(10), 10.0, false).unwrap();
        // 10 m of path, not the 7.07 m chord
        assert!((window.waypoints[0].velocity - 20.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn circular_window_brakes_across_the_seam() {
        let route = straight(20, 10.0);
        let indices = route.window_indices(15, 10, true);
        // Closing segment from 19 back to 0 is 19 m long
        let window = profile().annotate(&route, &indices, Some(2), 10.0, true).unwrap();
        let v = window.velocities();
        assert_eq!(window.waypoints[7].index, 2);
        assert_eq!(v[7], 0.0);
        assert!((v[6] - 2.0_f64.sqrt()).abs() < 1e-9);
        assert!((v[4] - 10.0_f64.min((2.0_f64 * 21.0).sqrt())).abs() < 1e-9);
    }

    #[test]
    fn empty_window_stays_empty() {
        let route = straight(10, 10.0);
        let window = profile().annotate(&route, &[], Some(3), 10.0, false).unwrap();
        assert!(window.is_empty());
    }
}
