//! NL-012: The MAES navigation bringup.
//!
//! One logging-buffer env flag, the navigation arguments, the MAES
//! arguments, the injected parameter document, and a single group running
//! SLAM (optional) before the navigation stack.

use crate::core::composer::{group, include};
use crate::core::error::LaunchResult;
use crate::core::parser;
use crate::core::plan::LaunchPlan;
use crate::core::types::{
    Condition, LaunchArgument, LaunchManifest, LaunchUnit, NamespaceScope, ParamTemplate,
    Substitution,
};
use indexmap::IndexMap;
use std::path::PathBuf;

pub const PLAN_NAME: &str = "maes-bringup";
pub const INTERFACE_PACKAGE: &str = "maes_ros2_interface";
pub const NAV2_PACKAGE: &str = "nav2_bringup";
pub const SLAM_LAUNCH: &str = "maes_slam_launch.py";
pub const NAVIGATION_LAUNCH: &str = "launch/navigation_launch.py";
pub const DEFAULT_PARAMS: &str = "params/nav2_params.yaml";
pub const INJECTED_PARAMS: &str = "injected_params";
pub const LOG_BUFFER_VAR: &str = "RCUTILS_LOGGING_BUFFERED_STREAM";
pub const BT_NAV_THROUGH_POSES: &str = "navigate_through_poses_w_replanning_and_recovery.xml";
pub const BT_NAV_TO_POSE: &str = "navigate_to_pose_w_replanning_and_recovery.xml";

/// Arguments forwarded to both sub-plans.
const FORWARDED: [&str; 3] = ["namespace", "use_sim_time", "autostart"];

/// Where the behavior-tree definitions are installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BringupOptions {
    pub install_root: PathBuf,
}

impl Default for BringupOptions {
    /// `$CWD/install`, the colcon workspace layout.
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            install_root: cwd.join("install"),
        }
    }
}

impl BringupOptions {
    /// Absolute path of an installed behavior-tree definition.
    pub fn behavior_tree(&self, file: &str) -> PathBuf {
        self.install_root
            .join(INTERFACE_PACKAGE)
            .join("share")
            .join(INTERFACE_PACKAGE)
            .join(file)
    }
}

fn arguments() -> Vec<LaunchArgument> {
    vec![
        LaunchArgument::with_default("namespace", "", "Top-level namespace"),
        LaunchArgument::with_default(
            "use_namespace",
            "true",
            "Whether to apply a namespace to the navigation stack",
        ),
        LaunchArgument::with_default("slam", "True", "Whether run a SLAM"),
        LaunchArgument::with_default(
            "use_sim_time",
            "false",
            "Use simulation (Gazebo) clock if true",
        ),
        LaunchArgument::with_default_value(
            "params_file",
            Substitution::package_share(NAV2_PACKAGE, DEFAULT_PARAMS),
            "Full path to the ROS2 parameters file to use for all launched nodes",
        ),
        LaunchArgument::with_default("autostart", "true", "Automatically startup the nav2 stack"),
        LaunchArgument::required("raytrace_range", "Raytrace range for the given robot"),
        LaunchArgument::required("robot_radius", "Radius of the robot. Affects path planning"),
        LaunchArgument::required(
            "global_costmap_width",
            "Ensures that global costmap is set to the same width as in the MAES simulation",
        ),
        LaunchArgument::required(
            "global_costmap_height",
            "Ensures that global costmap is set to the same height as in the MAES simulation",
        ),
        LaunchArgument::required(
            "global_costmap_origin_x",
            "Offsets the map in the x direction to ensure availability until map border",
        ),
        LaunchArgument::required(
            "global_costmap_origin_y",
            "Offsets the map in the y direction to ensure availability until map border",
        ),
    ]
}

fn injected_params(opts: &BringupOptions) -> ParamTemplate {
    let mut replacements = IndexMap::new();
    for (token, arg) in [
        ("<robot_namespace>", "namespace"),
        ("<raytrace_range>", "raytrace_range"),
        ("<robot_radius>", "robot_radius"),
        ("<global_costmap_width>", "global_costmap_width"),
        ("<global_costmap_height>", "global_costmap_height"),
        ("<global_costmap_origin_x>", "global_costmap_origin_x"),
        ("<global_costmap_origin_y>", "global_costmap_origin_y"),
    ] {
        replacements.insert(token.to_string(), Substitution::arg(arg));
    }
    for (token, file) in [
        ("<bt_nav_through_poses_xml_path>", BT_NAV_THROUGH_POSES),
        ("<bt_nav_to_pose_xml_path>", BT_NAV_TO_POSE),
    ] {
        let path = opts.behavior_tree(file).display().to_string();
        replacements.insert(token.to_string(), Substitution::text(&path));
    }
    ParamTemplate {
        source: Substitution::arg("params_file"),
        replacements,
    }
}

fn forwarded(extra: &[(&'static str, Substitution)]) -> Vec<(&'static str, Substitution)> {
    let mut args: Vec<(&str, Substitution)> = FORWARDED
        .iter()
        .map(|name| (*name, Substitution::arg(name)))
        .collect();
    args.push(("params_file", Substitution::document(INJECTED_PARAMS)));
    args.extend(extra.iter().cloned());
    args
}

fn bringup_group() -> LaunchUnit {
    let slam = include(
        Substitution::package_share(INTERFACE_PACKAGE, SLAM_LAUNCH),
        Some(Condition::If(Substitution::arg("slam"))),
        forwarded(&[]),
    );
    let navigation = include(
        Substitution::package_share(NAV2_PACKAGE, NAVIGATION_LAUNCH),
        None,
        forwarded(&[
            ("use_lifecycle_mgr", Substitution::text("false")),
            ("map_subscribe_transient_local", Substitution::text("true")),
        ]),
    );
    group(
        None,
        Some(NamespaceScope {
            value: Substitution::arg("namespace"),
            when: Some(Condition::If(Substitution::arg("use_namespace"))),
        }),
        vec![slam, navigation],
    )
}

/// The bringup as a manifest (what `init` writes).
pub fn navigation_bringup(opts: &BringupOptions) -> LaunchManifest {
    LaunchManifest {
        version: "1.0".to_string(),
        name: PLAN_NAME.to_string(),
        description: Some("MAES SLAM + Nav2 bringup".to_string()),
        env: IndexMap::from([(LOG_BUFFER_VAR.to_string(), Substitution::text("1"))]),
        arguments: arguments(),
        templates: IndexMap::from([(INJECTED_PARAMS.to_string(), injected_params(opts))]),
        units: vec![bringup_group()],
    }
}

/// The bringup as a built plan.
pub fn bringup_plan(opts: &BringupOptions) -> LaunchResult<LaunchPlan> {
    parser::build_plan(&navigation_bringup(opts))
}
