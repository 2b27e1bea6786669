//! Simple 3D scenes for generating stereo calibration data.
//!
//! A [Scene] is a flat list of [Parry](https://parry.rs) shapes, each with a
//! pose and a color. It implements [RayIntersector] (closest hit) and can be
//! viewed with [SceneRenderer], a ray casting [ViewRenderer] using the same
//! pixel rays as the correspondence sweep.
//!
//! Scenes are usually loaded from YAML:
//!
//! ```yaml
//! name: Room
//! background: [20, 20, 40]
//! objects:
//!   - shape: {type: plane, normal: [0.0, 0.0, -1.0]}
//!     position: [0.0, 0.0, 5.0]
//!   - shape: {type: ball, radius: 0.5}
//!     position: [0.0, 0.0, 3.0]
//!     color: [255, 0, 0]
//! ```
use image::{Rgb, RgbImage};
use nalgebra::{Isometry3, Point3, Unit, Vector3};
use parry3d_f64::{
    query::{Ray, RayCast, RayIntersection},
    shape::SharedShape,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use stereo_cal_data::{IntrinsicParameters, PixelRays, Pose, RayIntersector, ViewRenderer};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("{source}")]
    SerdeYaml {
        #[from]
        source: serde_yaml::Error,
    },
    #[error("invalid shape for object {index}: {msg}")]
    InvalidShape { index: usize, msg: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;

const DEFAULT_BACKGROUND: [u8; 3] = [0, 0, 0];
const DEFAULT_COLOR: [u8; 3] = [200, 200, 200];

fn default_background() -> [u8; 3] {
    DEFAULT_BACKGROUND
}

fn default_color() -> [u8; 3] {
    DEFAULT_COLOR
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneDescription {
    pub name: String,
    #[serde(default = "default_background")]
    pub background: [u8; 3],
    #[serde(default)]
    pub objects: Vec<ObjectDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectDescription {
    pub shape: ShapeDescription,
    #[serde(default)]
    pub position: [f64; 3],
    /// Rotation as a scaled axis (axis times angle in radians).
    #[serde(default)]
    pub rotation: [f64; 3],
    #[serde(default = "default_color")]
    pub color: [u8; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapeDescription {
    Ball { radius: f64 },
    Cuboid { half_extents: [f64; 3] },
    /// Solid half space below the plane through the object position.
    Plane { normal: [f64; 3] },
    Triangle { a: [f64; 3], b: [f64; 3], c: [f64; 3] },
}

impl ShapeDescription {
    fn to_shape(&self) -> std::result::Result<SharedShape, &'static str> {
        match self {
            ShapeDescription::Ball { radius } => {
                if !(radius.is_finite() && *radius > 0.0) {
                    return Err("ball radius must be positive");
                }
                Ok(SharedShape::ball(*radius))
            }
            ShapeDescription::Cuboid { half_extents } => {
                if !half_extents.iter().all(|x| x.is_finite() && *x > 0.0) {
                    return Err("cuboid half extents must be positive");
                }
                let [hx, hy, hz] = *half_extents;
                Ok(SharedShape::cuboid(hx, hy, hz))
            }
            ShapeDescription::Plane { normal } => {
                let normal = Vector3::from(*normal);
                if !(normal.norm() > 0.0) {
                    return Err("plane normal must be non-zero");
                }
                Ok(SharedShape::halfspace(Unit::new_normalize(normal)))
            }
            ShapeDescription::Triangle { a, b, c } => {
                let (a, b, c) = (Point3::from(*a), Point3::from(*b), Point3::from(*c));
                if !((b - a).cross(&(c - a)).norm() > 0.0) {
                    return Err("triangle is degenerate");
                }
                Ok(SharedShape::triangle(a, b, c))
            }
        }
    }
}

pub struct SceneObject {
    pub isometry: Isometry3<f64>,
    pub shape: SharedShape,
    pub color: [u8; 3],
}

impl std::fmt::Debug for SceneObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneObject")
            .field("isometry", &self.isometry)
            .field("shape_type", &self.shape.shape_type())
            .field("color", &self.color)
            .finish()
    }
}

#[derive(Debug)]
pub struct Scene {
    name: String,
    background: [u8; 3],
    objects: Vec<SceneObject>,
}

impl Scene {
    /// A scene without any geometry.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            background: DEFAULT_BACKGROUND,
            objects: Vec::new(),
        }
    }

    pub fn from_description(desc: &SceneDescription) -> Result<Self> {
        let objects = desc
            .objects
            .iter()
            .enumerate()
            .map(|(index, obj)| {
                let shape = obj
                    .shape
                    .to_shape()
                    .map_err(|msg| Error::InvalidShape { index, msg })?;
                Ok(SceneObject {
                    isometry: Isometry3::new(obj.position.into(), obj.rotation.into()),
                    shape,
                    color: obj.color,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        debug!("scene \"{}\" with {} objects", desc.name, objects.len());
        Ok(Self {
            name: desc.name.clone(),
            background: desc.background,
            objects,
        })
    }

    pub fn from_yaml_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let desc: SceneDescription = serde_yaml::from_reader(reader)?;
        Self::from_description(&desc)
    }

    pub fn from_yaml_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let fd = std::fs::File::open(path.as_ref())?;
        Self::from_yaml_reader(std::io::BufReader::new(fd))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn background(&self) -> [u8; 3] {
        self.background
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    /// Closest object hit by `ray`, if any.
    pub fn closest_hit(&self, ray: &Ray) -> Option<(&SceneObject, RayIntersection)> {
        let solid = true;
        let mut best: Option<(&SceneObject, RayIntersection)> = None;
        for obj in self.objects.iter() {
            let opt_hit = obj
                .shape
                .cast_ray_and_get_normal(&obj.isometry, ray, f64::MAX, solid);
            if let Some(hit) = opt_hit {
                let closer = match &best {
                    Some((_, prev)) => hit.time_of_impact < prev.time_of_impact,
                    None => true,
                };
                if closer {
                    best = Some((obj, hit));
                }
            }
        }
        best
    }
}

impl RayIntersector for Scene {
    fn intersect(&self, ray: &Ray) -> Option<Point3<f64>> {
        self.closest_hit(ray)
            .map(|(_, hit)| ray.point_at(hit.time_of_impact))
    }
}

/// Ray casting renderer with a head light.
///
/// Pixel rays are generated from the intrinsics handed in by the capture,
/// matching the correspondence sweep pixel for pixel.
pub struct SceneRenderer<'a> {
    scene: &'a Scene,
    ambient: f64,
}

impl<'a> SceneRenderer<'a> {
    pub fn new(scene: &'a Scene) -> Self {
        Self {
            scene,
            ambient: 0.2,
        }
    }

    /// Fraction of the object color seen regardless of lighting, in `[0, 1]`.
    pub fn with_ambient(mut self, ambient: f64) -> Self {
        self.ambient = ambient.clamp(0.0, 1.0);
        self
    }

    fn shade(&self, ray: &Ray) -> Rgb<u8> {
        match self.scene.closest_hit(ray) {
            Some((obj, hit)) => {
                // two sided
                let lambert = hit.normal.dot(&ray.dir.normalize()).abs();
                let intensity = self.ambient + (1.0 - self.ambient) * lambert;
                Rgb(obj
                    .color
                    .map(|c| (f64::from(c) * intensity).round().clamp(0.0, 255.0) as u8))
            }
            None => Rgb(self.scene.background),
        }
    }
}

impl ViewRenderer for SceneRenderer<'_> {
    fn render_full_frame(
        &mut self,
        pose: &Pose,
        intrinsics: &IntrinsicParameters,
        width: u32,
        height: u32,
    ) -> stereo_cal_data::Result<RgbImage> {
        let rays = PixelRays::new(intrinsics, pose);
        debug!("rendering {width}x{height} from {:?}", pose.position);
        Ok(RgbImage::from_fn(width, height, |x, y| {
            self.shade(&rays.ray_through(x, y))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_shapes() {
        let bad = [
            ShapeDescription::Ball { radius: 0.0 },
            ShapeDescription::Cuboid {
                half_extents: [1.0, -1.0, 1.0],
            },
            ShapeDescription::Plane {
                normal: [0.0, 0.0, 0.0],
            },
            ShapeDescription::Triangle {
                a: [0.0, 0.0, 0.0],
                b: [1.0, 1.0, 1.0],
                c: [2.0, 2.0, 2.0],
            },
        ];
        for (index, shape) in bad.into_iter().enumerate() {
            let desc = SceneDescription {
                name: "bad".into(),
                background: DEFAULT_BACKGROUND,
                objects: vec![ObjectDescription {
                    shape,
                    position: [0.0; 3],
                    rotation: [0.0; 3],
                    color: DEFAULT_COLOR,
                }],
            };
            match Scene::from_description(&desc) {
                Err(Error::InvalidShape { index: 0, .. }) => {}
                other => panic!("shape {index}: unexpected {other:?}"),
            }
        }
    }
}
