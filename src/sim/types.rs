//! Plain data exchanged with a simulation backend.
//!
//! Handles are opaque indices minted by the backend. Geometry types are kept
//! deliberately small: the harness only needs positions for scene layout and
//! reward shaping.

use qtty::{Quantity, Second};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::units::{tick_from_rate, to_seconds, SameDim};

/// Handle to a simulation created by [`SimulationBackend::create_sim`].
///
/// [`SimulationBackend::create_sim`]: super::SimulationBackend::create_sim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimHandle(pub usize);

/// Handle to one scene (one task instance) inside a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneHandle(pub usize);

/// Handle to an actor, local to the scene it was created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorHandle(pub usize);

/// Handle to an interactive viewer window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewerHandle(pub usize);

/// A 3D vector in simulator coordinates (Z up).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

/// Rigid transform. Rotation is a unit quaternion `[x, y, z, w]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Transform {
    pub p: Vec3,
    pub r: [f32; 4],
}

impl Transform {
    /// Pure translation.
    pub const fn at(p: Vec3) -> Self {
        Self {
            p,
            r: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::at(Vec3::ZERO)
    }
}

/// Axis-aligned bounds of a scene, used by the backend to lay scenes out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneBounds {
    pub lower: Vec3,
    pub upper: Vec3,
}

impl SceneBounds {
    /// Bounds `(-s, 0, -s)..(s, s, s)` for a grid spacing `s`.
    pub fn from_spacing(spacing: f32) -> Self {
        Self {
            lower: Vec3::new(-spacing, 0.0, -spacing),
            upper: Vec3::new(spacing, spacing, spacing),
        }
    }
}

/// Position limits of a single controllable joint.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointLimit {
    pub lower: f32,
    pub upper: f32,
}

impl JointLimit {
    pub const fn new(lower: f32, upper: f32) -> Self {
        Self { lower, upper }
    }

    /// Maps a normalized command in `[-1, 1]` onto `[lower, upper]`.
    ///
    /// Out-of-range commands saturate at the limits.
    pub fn scale(&self, normalized: f32) -> f32 {
        let n = normalized.clamp(-1.0, 1.0);
        self.lower + (n + 1.0) * 0.5 * (self.upper - self.lower)
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.lower, self.upper)
    }
}

/// Joint positions and velocities of one articulated actor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JointState {
    pub positions: Vec<f32>,
    pub velocities: Vec<f32>,
}

impl JointState {
    pub fn zeros(n: usize) -> Self {
        Self {
            positions: vec![0.0; n],
            velocities: vec![0.0; n],
        }
    }

    /// Number of degrees of freedom.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Options shared by agent and object assets.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AssetOptions {
    pub fix_base_link: bool,
    pub disable_gravity: bool,
    pub armature: f32,
    pub damping: f32,
}

impl Default for AssetOptions {
    fn default() -> Self {
        Self {
            fix_base_link: true,
            disable_gravity: false,
            armature: 0.01,
            damping: 0.1,
        }
    }
}

/// Description of the controllable articulated agent.
///
/// `link_lengths[i]` is the length of the link driven by joint `i`; joint 0
/// is the base yaw and its length is the shoulder height.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AgentAsset {
    pub name: String,
    pub joint_limits: Vec<JointLimit>,
    pub link_lengths: Vec<f32>,
    pub options: AssetOptions,
}

impl AgentAsset {
    /// A six-axis arm with a two-finger gripper (eight joints).
    pub fn six_axis_arm() -> Self {
        let revolute = JointLimit::new(-std::f32::consts::PI, std::f32::consts::PI);
        let finger = JointLimit::new(0.0, 0.035);
        Self {
            name: "six_axis_arm".to_string(),
            joint_limits: vec![
                revolute, revolute, revolute, revolute, revolute, revolute, finger, finger,
            ],
            link_lengths: vec![0.12, 0.28, 0.25, 0.0, 0.09, 0.0, 0.0, 0.0],
            options: AssetOptions::default(),
        }
    }

    pub fn dof_count(&self) -> usize {
        self.joint_limits.len()
    }
}

/// A box-shaped rigid object.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoxAsset {
    pub dims: Vec3,
    pub options: AssetOptions,
}

impl BoxAsset {
    pub fn cube(edge: f32) -> Self {
        Self {
            dims: Vec3::new(edge, edge, edge),
            options: AssetOptions::default(),
        }
    }
}

/// Vertical axis convention of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UpAxis {
    Y,
    Z,
}

/// Global simulation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimParams {
    /// Duration of one physics tick.
    pub dt: Quantity<Second>,
    /// Integration substeps per tick.
    pub substeps: u32,
    pub up_axis: UpAxis,
    pub gravity: Vec3,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            dt: tick_from_rate(60.0),
            substeps: 2,
            up_axis: UpAxis::Z,
            gravity: Vec3::new(0.0, 0.0, -9.81),
        }
    }
}

impl SimParams {
    /// Sets the physics tick from a duration in any time unit.
    pub fn with_tick<U: SameDim<Second>>(mut self, tick: Quantity<U>) -> Self {
        self.dt = to_seconds(tick);
        self
    }

    /// Sets the physics tick from a rate in frames per second.
    pub fn with_rate(mut self, frames_per_second: f64) -> Self {
        self.dt = tick_from_rate(frames_per_second);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joint_limit_scales_unit_range() {
        let limit = JointLimit::new(-2.0, 4.0);
        assert_eq!(limit.scale(-1.0), -2.0);
        assert_eq!(limit.scale(1.0), 4.0);
        assert_eq!(limit.scale(0.0), 1.0);
        assert_eq!(limit.scale(7.0), 4.0);
    }

    #[test]
    fn scene_bounds_from_spacing() {
        let bounds = SceneBounds::from_spacing(2.0);
        assert_eq!(bounds.lower, Vec3::new(-2.0, 0.0, -2.0));
        assert_eq!(bounds.upper, Vec3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn arm_asset_is_consistent() {
        let asset = AgentAsset::six_axis_arm();
        assert_eq!(asset.dof_count(), 8);
        assert_eq!(asset.link_lengths.len(), asset.dof_count());
    }

    #[test]
    fn default_tick_is_sixty_hertz() {
        let params = SimParams::default();
        assert!((params.dt.value() - 1.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn tick_accepts_other_time_units() {
        let params = SimParams::default().with_tick(Quantity::<qtty::Minute>::new(0.001));
        assert!((params.dt.value() - 0.06).abs() < 1e-12);
        assert!((SimParams::default().with_rate(120.0).dt.value() - 1.0 / 120.0).abs() < 1e-12);
    }
}
