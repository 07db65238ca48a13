//! Drives a simulated vehicle along a synthetic route up to a red light,
//! waits, and continues after the light turns green. No transport needed.

use anyhow::Result;
use std::f64::consts::PI;
use waypoint_updater::{
    LaneMessage, LaneSink, LifecycleNode, PlannerConfig, Pose, RoutePoint, WaypointUpdater,
};

/// Simulation step (s)
const DT: f64 = 0.2;
/// Acceleration of the simulated vehicle (m/s^2)
const ACCEL: f64 = 1.5;
const STOP_LINE_INDEX: i64 = 160;

struct LogSink;

impl LaneSink for LogSink {
    fn send(&self, lane: &LaneMessage) -> Result<()> {
        if let (Some(first), Some(last)) = (lane.waypoints.first(), lane.waypoints.last()) {
            log::debug!(
                "lane [{}]: {} waypoints, indices {}..={}, v0={:.2}",
                lane.frame_id,
                lane.waypoints.len(),
                first.index,
                last.index,
                first.velocity
            );
        }
        Ok(())
    }
}

/// A straight stretch followed by a gentle left curve, one point per metre
fn synthetic_route(speed_limit: f64) -> Vec<RoutePoint> {
    let mut points: Vec<RoutePoint> = (0..100)
        .map(|i| RoutePoint::new(i as f64, 0.0, 0.0, speed_limit))
        .collect();
    let radius = 60.0;
    let steps = (radius * PI / 2.0) as usize;
    points.extend((1..=steps).map(|k| {
        let theta = k as f64 / radius;
        RoutePoint::new(
            99.0 + radius * theta.sin(),
            radius * (1.0 - theta.cos()),
            theta,
            speed_limit,
        )
    }));
    points
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Simulating approach to a red light...");

    let config = PlannerConfig::load()?;
    let mut updater = WaypointUpdater::new(config, Box::new(LogSink));
    updater.on_configure()?;
    updater.on_activate()?;

    let planner = updater.planner();
    planner.set_route(synthetic_route(planner.speed_limit()))?;
    let route = planner.route().snapshot()?.route;

    let mut position = route.point_at(0)?.position;
    let mut yaw = 0.0;
    let mut speed = 0.0;
    let mut time = 0.0;
    let mut red_for = 0.0;

    planner.update_stop_index(STOP_LINE_INDEX);

    while time < 120.0 {
        planner.update_pose(Pose {
            position,
            orientation: nalgebra::UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
            stamp: time,
        })?;
        updater.step();

        let window = planner.tick();
        if window.len() < 2 {
            log::info!("End of route reached at t={:.1}s", time);
            break;
        }

        // Brake immediately, accelerate gently, steer at the next waypoint
        let desired = window.waypoints[0].velocity;
        speed = if desired < speed {
            desired
        } else {
            (speed + ACCEL * DT).min(desired)
        };
        let target = window.waypoints[1].point.position;
        let to_target = target - position;
        if to_target.norm() > 1e-6 {
            yaw = to_target.y.atan2(to_target.x);
            position += to_target.normalize() * (speed * DT).min(to_target.norm());
        }

        if speed < 1e-3 && planner.stop_index().is_some() {
            red_for += DT;
            if red_for >= 5.0 {
                log::info!("Light turned green at t={:.1}s", time);
                planner.update_stop_index(-1);
            }
        }

        if (time / DT).round() as u64 % 25 == 0 {
            log::info!(
                "t={:5.1}s index={:3} speed={:5.2} m/s",
                time,
                window.waypoints[0].index,
                speed
            );
        }
        time += DT;
    }

    updater.on_deactivate()?;
    Ok(())
}
