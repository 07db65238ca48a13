//! Localization against the route
//!
//! Finds the route point the vehicle is at or just about to reach. The search
//! starts around the previous result and only falls back to scanning the
//! whole route when the local answer looks wrong.

use crate::common::{heading_vector, Pose};
use crate::error::PlannerError;
use crate::navigation::route::Route;
use nalgebra::Vector2;

/// Extra distance charged to route points heading against the vehicle, so
/// the other side of a loop only wins when it is clearly closer
const OPPOSED_HEADING_PENALTY_M: f64 = 2.0;

const TIE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    distance: f64,
    score: f64,
    alignment: f64,
}

impl Candidate {
    fn beats(&self, other: &Candidate) -> bool {
        if (self.score - other.score).abs() > TIE_EPSILON {
            self.score < other.score
        } else {
            self.alignment > other.alignment
        }
    }
}

/// Localizes the vehicle on a route
#[derive(Debug, Clone)]
pub struct RouteLocalizer {
    search_window: usize,
    relocalization_distance: f64,
}

impl RouteLocalizer {
    /// Create a new localizer
    pub fn new(search_window: usize, relocalization_distance: f64) -> Self {
        RouteLocalizer {
            search_window,
            relocalization_distance,
        }
    }

    /// Index of the closest route point at or ahead of the vehicle.
    ///
    /// `hint` is the previous result, if still valid for this route.
    pub fn nearest_ahead_of(
        &self,
        route: &Route,
        pose: &Pose,
        hint: Option<usize>,
        circular: bool,
    ) -> Result<usize, PlannerError> {
        if route.is_empty() {
            return Err(PlannerError::NoRoute);
        }
        let n = route.len();
        let vehicle_heading = heading_vector(pose.yaw());

        let local = hint
            .filter(|&h| h < n && 2 * self.search_window + 1 < n)
            .and_then(|h| self.search_local(route, pose, &vehicle_heading, h, circular));

        let nearest = match local {
            Some(candidate) => candidate,
            None => {
                log::debug!("Full route scan for localization");
                best_of(route, pose, &vehicle_heading, 0..n).ok_or(PlannerError::NoRoute)?
            }
        };

        Ok(self.step_ahead(route, pose, nearest.index, circular))
    }

    /// Search `search_window` points either side of `hint`. Returns `None`
    /// when the result should not be trusted.
    fn search_local(
        &self,
        route: &Route,
        pose: &Pose,
        vehicle_heading: &Vector2<f64>,
        hint: usize,
        circular: bool,
    ) -> Option<Candidate> {
        let n = route.len();
        let w = self.search_window;

        let (indices, lo, hi): (Vec<usize>, usize, usize) = if circular {
            let lo = (hint + n - w) % n;
            let hi = (hint + w) % n;
            ((0..=2 * w).map(|k| (lo + k) % n).collect(), lo, hi)
        } else {
            let lo = hint.saturating_sub(w);
            let hi = (hint + w).min(n - 1);
            ((lo..=hi).collect(), lo, hi)
        };

        let best = best_of(route, pose, vehicle_heading, indices.into_iter())?;

        // Still descending at the window edge: the vehicle moved further than
        // the window covers.
        let on_edge = (best.index == lo && (circular || lo > 0))
            || (best.index == hi && (circular || hi < n - 1));
        if on_edge || best.distance > self.relocalization_distance {
            return None;
        }
        Some(best)
    }

    /// Move one point forward if the nearest point is already behind
    fn step_ahead(&self, route: &Route, pose: &Pose, index: usize, circular: bool) -> usize {
        let n = route.len();
        let point = &route.points()[index].position;
        let direction = route_heading(route, index);
        let to_point = Vector2::new(point.x - pose.position.x, point.y - pose.position.y);

        if to_point.dot(&direction) >= 0.0 {
            return index;
        }
        if index + 1 < n {
            index + 1
        } else if circular {
            0
        } else {
            index
        }
    }
}

fn best_of(
    route: &Route,
    pose: &Pose,
    vehicle_heading: &Vector2<f64>,
    indices: impl Iterator<Item = usize>,
) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for index in indices {
        let point = &route.points()[index];
        let distance = nalgebra::distance(&point.position, &pose.position);
        let alignment = route_heading(route, index).dot(vehicle_heading);
        let score = if alignment < 0.0 {
            distance + OPPOSED_HEADING_PENALTY_M
        } else {
            distance
        };
        let candidate = Candidate {
            index,
            distance,
            score,
            alignment,
        };
        if best.map_or(true, |b| candidate.beats(&b)) {
            best = Some(candidate);
        }
    }
    best
}

/// Unit direction of travel at a route point.
///
/// Taken from the neighbouring segment; zero-length segments fall back to
/// the point's own orientation.
pub fn route_heading(route: &Route, index: usize) -> Vector2<f64> {
    let points = route.points();
    let segment = if index + 1 < points.len() {
        Some((&points[index], &points[index + 1]))
    } else if index > 0 {
        Some((&points[index - 1], &points[index]))
    } else {
        None
    };

    if let Some((a, b)) = segment {
        let d = Vector2::new(b.position.x - a.position.x, b.position.y - a.position.y);
        let norm = d.norm();
        if norm > TIE_EPSILON {
            return d / norm;
        }
    }
    heading_vector(points[index].yaw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::RoutePoint;
    use std::f64::consts::PI;

    fn straight(n: usize) -> Route {
        Route::new(
            (0..n)
                .map(|i| RoutePoint::new(i as f64, 0.0, 0.0, 10.0))
                .collect(),
        )
    }

    fn localizer() -> RouteLocalizer {
        RouteLocalizer::new(25, 5.0)
    }

    #[test]
    fn empty_route_is_an_error() {
        let route = Route::new(Vec::new());
        let pose = Pose::new(0.0, 0.0, 0.0, 0.0);
        assert!(matches!(
            localizer().nearest_ahead_of(&route, &pose, None, false),
            Err(PlannerError::NoRoute)
        ));
    }

    #[test]
    fn vehicle_on_a_point_starts_there() {
        let route = straight(100);
        let pose = Pose::new(10.0, 0.0, 0.0, 0.0);
        assert_eq!(
            localizer().nearest_ahead_of(&route, &pose, None, false).unwrap(),
            10
        );
    }

    #[test]
    fn nearest_point_behind_steps_forward() {
        let route = straight(100);
        // 10.2 is nearest to 10, which is behind the vehicle
        let pose = Pose::new(10.2, 0.3, 0.0, 0.0);
        assert_eq!(
            localizer().nearest_ahead_of(&route, &pose, Some(9), false).unwrap(),
            11
        );
    }

    #[test]
    fn hint_and_full_scan_agree() {
        let route = straight(200);
        let pose = Pose::new(57.6, -0.5, 0.0, 0.0);
        let loc = localizer();
        let cold = loc.nearest_ahead_of(&route, &pose, None, false).unwrap();
        let warm = loc.nearest_ahead_of(&route, &pose, Some(55), false).unwrap();
        assert_eq!(cold, 58);
        assert_eq!(warm, cold);
    }

    #[test]
    fn recovers_after_a_large_jump() {
        let route = straight(500);
        let pose = Pose::new(400.0, 0.0, 0.0, 0.0);
        // Stale hint far from the vehicle
        assert_eq!(
            localizer().nearest_ahead_of(&route, &pose, Some(3), false).unwrap(),
            400
        );
    }

    #[test]
    fn out_of_range_hint_is_ignored() {
        let route = straight(100);
        let pose = Pose::new(20.0, 0.0, 0.0, 0.0);
        assert_eq!(
            localizer().nearest_ahead_of(&route, &pose, Some(1000), false).unwrap(),
            20
        );
    }

    #[test]
    fn past_the_end_clamps_to_last_point() {
        let route = straight(10);
        let pose = Pose::new(15.0, 0.0, 0.0, 0.0);
        let loc = localizer();
        assert_eq!(loc.nearest_ahead_of(&route, &pose, None, false).unwrap(), 9);
        assert_eq!(loc.nearest_ahead_of(&route, &pose, None, true).unwrap(), 0);
    }

    #[test]
    fn heading_picks_the_matching_side_of_a_hairpin() {
        // Out along y = 0 heading east, back along y = 0.5 heading west
        let mut points: Vec<RoutePoint> = (0..20)
            .map(|i| RoutePoint::new(i as f64, 0.0, 0.0, 10.0))
            .collect();
        points.extend((0..20).map(|i| RoutePoint::new(19.0 - i as f64, 0.5, PI, 10.0)));
        let route = Route::new(points);

        // Between the two legs, slightly closer to the return leg, facing west
        let westbound = Pose::new(5.0, 0.3, PI, 0.0);
        let index = localizer()
            .nearest_ahead_of(&route, &westbound, None, false)
            .unwrap();
        assert!(index >= 20, "expected the return leg, got {}", index);

        // Same spot facing east picks the outbound leg
        let eastbound = Pose::new(5.0, 0.3, 0.0, 0.0);
        let index = localizer()
            .nearest_ahead_of(&route, &eastbound, None, false)
            .unwrap();
        assert_eq!(index, 5);
    }

    #[test]
    fn degenerate_segments_fall_back_to_orientation() {
        let route = Route::new(vec![
            RoutePoint::new(0.0, 0.0, 0.0, 1.0),
            RoutePoint::new(0.0, 0.0, 0.0, 1.0),
        ]);
        let heading = route_heading(&route, 0);
        assert!((heading.x - 1.0).abs() < 1e-9);
    }
}
