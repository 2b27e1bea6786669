use nalgebra::{Point3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use cam_geom::ExtrinsicParameters;

/// Position and orientation of a camera in the world frame.
///
/// `orientation` rotates camera-local vectors into the world frame. The
/// camera-local frame has +X pointing right, +Y pointing down and +Z pointing
/// forward, matching the pixel frame of the intrinsic matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    pub fn new(position: Point3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Camera at the origin looking along world +Z with +Y down.
    pub fn identity() -> Self {
        Self::new(Point3::origin(), UnitQuaternion::identity())
    }

    /// Camera at `position` looking at `look_at` with `up` pointing up in
    /// the image.
    pub fn from_view(position: &Point3<f64>, look_at: &Point3<f64>, up: &Vector3<f64>) -> Self {
        let up_unit = Unit::new_normalize(*up);
        let extrinsics = ExtrinsicParameters::from_view(&position.coords, &look_at.coords, &up_unit);
        // `pose()` maps world to camera coordinates.
        let orientation = extrinsics.pose().rotation.inverse();
        Self::new(*position, orientation)
    }

    /// The camera's local +X axis in world coordinates.
    pub fn right(&self) -> Vector3<f64> {
        self.orientation * Vector3::x()
    }

    /// The camera's viewing direction in world coordinates.
    pub fn forward(&self) -> Vector3<f64> {
        self.orientation * Vector3::z()
    }

    /// A copy of this pose moved by `distance` along the local right axis.
    ///
    /// The orientation is left untouched.
    pub fn translated_along_right(&self, distance: f64) -> Self {
        Self::new(self.position + self.right() * distance, self.orientation)
    }

    /// Express a world point in this pose's local frame.
    pub fn world_to_local(&self, world: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.orientation.inverse_transform_vector(&(world - self.position)))
    }

    /// Express a point in this pose's local frame in world coordinates.
    pub fn local_to_world(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.orientation.transform_vector(&local.coords)
    }

    pub fn to_extrinsics(&self) -> ExtrinsicParameters<f64> {
        ExtrinsicParameters::from_rotation_and_camcenter(self.orientation.inverse(), self.position)
    }
}

/// One of the two views of a stereo capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    /// Capture order.
    pub const ALL: [Eye; 2] = [Eye::Left, Eye::Right];

    /// Direction along the local right axis: -1 for left, +1 for right.
    pub fn sign(&self) -> f64 {
        match self {
            Eye::Left => -1.0,
            Eye::Right => 1.0,
        }
    }

    /// Pose of this eye given the mid-baseline reference pose.
    pub fn pose(&self, reference: &Pose, baseline_offset: f64) -> Pose {
        reference.translated_along_right(self.sign() * baseline_offset / 2.0)
    }

    pub fn image_name(&self) -> &'static str {
        match self {
            Eye::Left => crate::artifacts::LEFT_IMAGE,
            Eye::Right => crate::artifacts::RIGHT_IMAGE,
        }
    }
}

impl std::fmt::Display for Eye {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Eye::Left => write!(f, "left"),
            Eye::Right => write!(f, "right"),
        }
    }
}
