use anyhow::{Error, Result};
use nalgebra::{Point3, Quaternion, UnitQuaternion};
use rclrs::{
    Context, CreateBasicExecutor, Node, RclrsErrorFilter, SpinOptions, QOS_PROFILE_DEFAULT,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use waypoint_updater::{
    LaneMessage, LaneSink, LifecycleNode, PlannerConfig, Pose, RoutePoint, WaypointPlanner,
    WaypointUpdater,
};

use builtin_interfaces::msg::Time;
use geometry_msgs::msg::{Pose as PoseMsg, PoseStamped};
use nav_msgs::msg::Path;
use std_msgs::msg::{Float64MultiArray, Int32};

/// Publishes lane messages as a path plus a parallel array of target velocities
struct RosLaneSink {
    path_publisher: Arc<rclrs::Publisher<Path>>,
    velocity_publisher: Arc<rclrs::Publisher<Float64MultiArray>>,
}

impl LaneSink for RosLaneSink {
    fn send(&self, lane: &LaneMessage) -> Result<()> {
        let mut path = Path::default();
        path.header.frame_id = lane.frame_id.clone();
        path.header.stamp = to_ros_time(lane.stamp);
        let header = path.header.clone();
        path.poses = lane
            .waypoints
            .iter()
            .map(|wp| {
                let mut pose_stamped = PoseStamped::default();
                pose_stamped.header = header.clone();
                pose_stamped.pose.position.x = wp.point.position.x;
                pose_stamped.pose.position.y = wp.point.position.y;
                pose_stamped.pose.position.z = wp.point.position.z;
                let q = wp.point.orientation;
                pose_stamped.pose.orientation.x = q.i;
                pose_stamped.pose.orientation.y = q.j;
                pose_stamped.pose.orientation.z = q.k;
                pose_stamped.pose.orientation.w = q.w;
                pose_stamped
            })
            .collect();

        let mut velocities = Float64MultiArray::default();
        velocities.data = lane.waypoints.iter().map(|wp| wp.velocity).collect();

        self.path_publisher.publish(&path)?;
        self.velocity_publisher.publish(&velocities)?;
        Ok(())
    }
}

struct WaypointUpdaterNode {
    updater: WaypointUpdater,
    _node: Arc<Node>,
    _pose_subscription: Arc<rclrs::Subscription<PoseStamped>>,
    _route_subscription: Arc<rclrs::Subscription<Path>>,
    _traffic_subscription: Arc<rclrs::Subscription<Int32>>,
}

impl WaypointUpdaterNode {
    fn new(executor: &rclrs::Executor, name: &str, mut config: PlannerConfig) -> Result<Self> {
        let node = executor.create_node(name)?;

        // ROS parameters take precedence over the config file
        let params = parameter_overrides(&node, &config);
        config.configure(&params)?;
        log::info!(
            "Using parameters: lookahead_wps={}, velocity_kmh={}, decel_limit_mps2={}",
            config.lookahead_wps,
            config.velocity_kmh,
            config.decel_limit_mps2
        );

        log::info!(
            "Topics: pose={}, route={}, traffic={}, output={}",
            config.pose_topic,
            config.route_topic,
            config.traffic_topic,
            config.output_topic
        );

        let path_publisher =
            node.create_publisher::<Path>(&config.output_topic, QOS_PROFILE_DEFAULT)?;
        let velocity_publisher = node.create_publisher::<Float64MultiArray>(
            &format!("{}/velocity", config.output_topic),
            QOS_PROFILE_DEFAULT,
        )?;

        let updater = WaypointUpdater::new(
            config.clone(),
            Box::new(RosLaneSink {
                path_publisher,
                velocity_publisher,
            }),
        );

        let planner = updater.planner();
        let pose_subscription = node.create_subscription::<PoseStamped, _>(
            &config.pose_topic,
            QOS_PROFILE_DEFAULT,
            move |msg: PoseStamped| pose_callback(&planner, msg),
        )?;

        let planner = updater.planner();
        let route_subscription = node.create_subscription::<Path, _>(
            &config.route_topic,
            QOS_PROFILE_DEFAULT,
            move |msg: Path| route_callback(&planner, msg),
        )?;

        let planner = updater.planner();
        let traffic_subscription = node.create_subscription::<Int32, _>(
            &config.traffic_topic,
            QOS_PROFILE_DEFAULT,
            move |msg: Int32| planner.update_stop_index(i64::from(msg.data)),
        )?;

        Ok(WaypointUpdaterNode {
            updater,
            _node: node,
            _pose_subscription: pose_subscription,
            _route_subscription: route_subscription,
            _traffic_subscription: traffic_subscription,
        })
    }
}

/// Declare the numeric parameters, defaulting to the file values
fn parameter_overrides(node: &Node, config: &PlannerConfig) -> HashMap<String, f64> {
    let declared = [
        ("lookahead_wps", config.lookahead_wps as f64),
        ("rate_hz", config.rate_hz),
        ("velocity_kmh", config.velocity_kmh),
        ("decel_limit_mps2", config.decel_limit_mps2),
        ("braking_horizon_m", config.braking_horizon_m),
        ("search_window", config.search_window as f64),
        ("relocalization_distance_m", config.relocalization_distance_m),
    ];

    let mut params = HashMap::new();
    for (name, default) in declared {
        match node.declare_parameter(name).default(default).mandatory() {
            Ok(param) => {
                params.insert(name.to_string(), param.get());
            }
            Err(e) => log::warn!("Parameter {} not declared: {:?}", name, e),
        }
    }
    params
}

fn pose_callback(planner: &WaypointPlanner, msg: PoseStamped) {
    let pose = Pose {
        position: point_from(&msg.pose),
        orientation: orientation_from(&msg.pose),
        stamp: f64::from(msg.header.stamp.sec) + f64::from(msg.header.stamp.nanosec) * 1e-9,
    };
    if let Err(e) = planner.update_pose(pose) {
        log::error!("Failed to store pose: {}", e);
    }
}

fn route_callback(planner: &WaypointPlanner, msg: Path) {
    // The route carries no speeds; every point gets the configured limit
    let reference_velocity = planner.speed_limit();
    let points = msg
        .poses
        .iter()
        .map(|pose_stamped| RoutePoint {
            position: point_from(&pose_stamped.pose),
            orientation: orientation_from(&pose_stamped.pose),
            reference_velocity,
        })
        .collect();
    if let Err(e) = planner.set_route(points) {
        log::error!("Failed to store route: {}", e);
    }
}

fn point_from(pose: &PoseMsg) -> Point3<f64> {
    Point3::new(pose.position.x, pose.position.y, pose.position.z)
}

fn orientation_from(pose: &PoseMsg) -> UnitQuaternion<f64> {
    let o = &pose.orientation;
    let q = Quaternion::new(o.w, o.x, o.y, o.z);
    UnitQuaternion::try_new(q, 1e-9).unwrap_or_else(UnitQuaternion::identity)
}

fn to_ros_time(stamp: SystemTime) -> Time {
    let since_epoch = stamp.duration_since(UNIX_EPOCH).unwrap_or_default();
    Time {
        sec: since_epoch.as_secs() as i32,
        nanosec: since_epoch.subsec_nanos(),
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Error> {
    env_logger::init();
    log::info!("Initializing waypoint updater node...");

    let config = PlannerConfig::load()?;
    let mut executor = Context::default_from_env()?.create_basic_executor();

    let mut node = WaypointUpdaterNode::new(&executor, "waypoint_updater", config)?;
    node.updater.on_configure()?;
    node.updater.on_activate()?;
    let publish_loop = node.updater.spawn_publish_loop()?;

    log::info!("Waypoint updater initialized. Starting to spin...");
    let spin_result =
        tokio::task::block_in_place(|| executor.spin(SpinOptions::default()).first_error());

    node.updater.shutdown();
    publish_loop.await?;
    node.updater.on_deactivate()?;

    spin_result.map_err(|err| err.into())
}
