//! Route store
//!
//! Holds the full ordered route of the map. The route is published once at
//! startup and read by every planning tick, so readers take a cheap `Arc`
//! snapshot instead of holding the lock while they compute.

use crate::common::RoutePoint;
use crate::error::PlannerError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// An immutable route with precomputed arc length
#[derive(Debug, Clone)]
pub struct Route {
    points: Vec<RoutePoint>,
    // cumulative[i] = arc length from point 0 to point i
    cumulative: Vec<f64>,
    // length of the segment joining the last point back to the first
    closing_segment: f64,
}

impl Route {
    pub fn new(points: Vec<RoutePoint>) -> Self {
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for (i, point) in points.iter().enumerate() {
            if i > 0 {
                total += points[i - 1].distance_to(point);
            }
            cumulative.push(total);
        }

        let closing_segment = match (points.first(), points.last()) {
            (Some(first), Some(last)) if points.len() > 1 => last.distance_to(first),
            _ => 0.0,
        };

        Route {
            points,
            cumulative,
            closing_segment,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[RoutePoint] {
        &self.points
    }

    /// Bounds-checked access to a route point
    pub fn point_at(&self, index: usize) -> Result<&RoutePoint, PlannerError> {
        self.points.get(index).ok_or(PlannerError::OutOfRange {
            index,
            len: self.points.len(),
        })
    }

    fn check(&self, index: usize) -> Result<(), PlannerError> {
        self.point_at(index).map(|_| ())
    }

    /// Arc length along the route between two indices
    pub fn distance(&self, from: usize, to: usize) -> Result<f64, PlannerError> {
        self.check(from)?;
        self.check(to)?;
        Ok((self.cumulative[to] - self.cumulative[from]).abs())
    }

    /// Arc length travelling forward from `from` to `to`, wrapping through
    /// the closing segment when `to` lies behind `from`
    pub fn loop_distance(&self, from: usize, to: usize) -> Result<f64, PlannerError> {
        self.check(from)?;
        self.check(to)?;
        if to >= from {
            Ok(self.cumulative[to] - self.cumulative[from])
        } else {
            Ok(self.loop_length() - (self.cumulative[from] - self.cumulative[to]))
        }
    }

    /// Length of one full lap including the closing segment
    pub fn loop_length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0) + self.closing_segment
    }

    /// Route indices of a window of up to `len` points starting at `start`.
    ///
    /// Non-circular routes clamp at the final point. Circular routes wrap but
    /// never repeat a point.
    pub fn window_indices(&self, start: usize, len: usize, circular: bool) -> Vec<usize> {
        let n = self.points.len();
        if start >= n {
            return Vec::new();
        }
        if circular {
            (0..len.min(n)).map(|k| (start + k) % n).collect()
        } else {
            (start..(start + len).min(n)).collect()
        }
    }
}

/// A route together with the generation it was stored under
#[derive(Debug, Clone)]
pub struct RouteSnapshot {
    pub route: Arc<Route>,
    pub generation: u64,
}

/// Thread-safe holder of the current route
#[derive(Debug, Default)]
pub struct RouteStore {
    current: RwLock<Option<RouteSnapshot>>,
    generations: AtomicU64,
}

impl RouteStore {
    pub fn new() -> Self {
        RouteStore::default()
    }

    /// Store the full route, replacing any previous one.
    ///
    /// Returns the generation of the new route. Localization hints taken
    /// against an older generation are no longer valid.
    pub fn set_route(&self, points: Vec<RoutePoint>) -> Result<u64, PlannerError> {
        let route = Arc::new(Route::new(points));
        let mut current = self
            .current
            .write()
            .map_err(|_| PlannerError::LockPoisoned("route store"))?;
        let generation = self.generations.fetch_add(1, Ordering::AcqRel) + 1;
        if current.is_some() {
            log::warn!("Replacing route (generation {})", generation);
        }
        *current = Some(RouteSnapshot { route, generation });
        Ok(generation)
    }

    /// Drop the stored route
    pub fn clear(&self) -> Result<(), PlannerError> {
        let mut current = self
            .current
            .write()
            .map_err(|_| PlannerError::LockPoisoned("route store"))?;
        *current = None;
        Ok(())
    }

    /// Current route, or `NotReady` if none was set
    pub fn snapshot(&self) -> Result<RouteSnapshot, PlannerError> {
        let current = self
            .current
            .read()
            .map_err(|_| PlannerError::LockPoisoned("route store"))?;
        current.clone().ok_or(PlannerError::NotReady("route"))
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot().is_ok()
    }

    pub fn size(&self) -> Result<usize, PlannerError> {
        Ok(self.snapshot()?.route.len())
    }

    pub fn point_at(&self, index: usize) -> Result<RoutePoint, PlannerError> {
        let snapshot = self.snapshot()?;
        snapshot.route.point_at(index).copied()
    }
}
