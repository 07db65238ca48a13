//! Navigation module for the waypoint updater
pub mod planner;
pub mod publisher;
pub mod route;

use self::planner::WaypointPlanner;
use self::publisher::{LaneSink, WaypointPublisher};
use crate::config::PlannerConfig;
use crate::error::PlannerError;
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Planner, publisher and the fixed-rate loop that connects them
pub struct WaypointUpdater {
    base: LifecycleNodeBase,
    config: PlannerConfig,
    planner: Arc<WaypointPlanner>,
    publisher: Arc<WaypointPublisher>,
    active: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl WaypointUpdater {
    /// Create a new waypoint updater publishing through `sink`
    pub fn new(config: PlannerConfig, sink: Box<dyn LaneSink>) -> Self {
        let planner = Arc::new(WaypointPlanner::new(&config));
        let publisher = Arc::new(WaypointPublisher::new(&config.frame_id, sink));

        WaypointUpdater {
            base: LifecycleNodeBase::new("waypoint_updater"),
            config,
            planner,
            publisher,
            active: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared handle for transport callbacks feeding route, pose and stop index
    pub fn planner(&self) -> Arc<WaypointPlanner> {
        Arc::clone(&self.planner)
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn state(&self) -> State {
        self.base.get_state()
    }

    /// Run one planning tick and publish the result if the node is active.
    ///
    /// Returns whether a message was published.
    pub fn step(&self) -> bool {
        publish_once(&self.planner, &self.publisher, &self.active)
    }

    /// Spawn the fixed-rate publish loop on the current tokio runtime.
    ///
    /// The loop exits at the first tick after [`WaypointUpdater::shutdown`].
    pub fn spawn_publish_loop(&self) -> Result<JoinHandle<()>, PlannerError> {
        self.config.validate()?;
        let planner = Arc::clone(&self.planner);
        let publisher = Arc::clone(&self.publisher);
        let active = Arc::clone(&self.active);
        let running = Arc::clone(&self.running);
        let period = Duration::from_secs_f64(1.0 / self.config.rate_hz);

        running.store(true, Ordering::Release);
        log::info!("Publishing waypoints every {:?}", period);

        Ok(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !running.load(Ordering::Acquire) {
                    break;
                }
                publish_once(&planner, &publisher, &active);
            }
            log::info!("Publish loop stopped");
        }))
    }

    /// Ask the publish loop to stop
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

fn publish_once(
    planner: &WaypointPlanner,
    publisher: &WaypointPublisher,
    active: &AtomicBool,
) -> bool {
    if !active.load(Ordering::Acquire) {
        return false;
    }
    let window = planner.tick();
    match publisher.publish(&window) {
        Ok(sent) => sent,
        Err(e) => {
            log::warn!("Failed to publish final waypoints: {}", e);
            false
        }
    }
}

impl LifecycleNode for WaypointUpdater {
    fn on_configure(&mut self) -> Result<(), PlannerError> {
        log::info!("Configuring waypoint updater");
        self.config.validate()?;
        self.base.transition(State::Inactive)
    }

    fn on_activate(&mut self) -> Result<(), PlannerError> {
        log::info!("Activating waypoint updater");
        self.base.transition(State::Active)?;
        self.active.store(true, Ordering::Release);
        Ok(())
    }

    fn on_deactivate(&mut self) -> Result<(), PlannerError> {
        log::info!("Deactivating waypoint updater");
        self.base.transition(State::Inactive)?;
        self.active.store(false, Ordering::Release);
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<(), PlannerError> {
        log::info!("Cleaning up waypoint updater");
        self.base.transition(State::Unconfigured)?;
        self.planner.reset()
    }
}
