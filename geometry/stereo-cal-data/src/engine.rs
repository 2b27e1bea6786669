use image::RgbImage;
use nalgebra::{Point3, RowVector2};
use parry3d_f64::query::Ray;
use tracing::{debug, info, trace};

use crate::{
    Error, Result,
    artifacts::CaptureArtifacts,
    config::{CameraConfig, clamp_baseline_offset},
    intrinsics::IntrinsicParameters,
    pose::{Eye, Pose},
};

/// Closest-hit ray queries against the scene.
pub trait RayIntersector {
    /// Return the first point where `ray` hits scene geometry, in world
    /// coordinates.
    fn intersect(&self, ray: &Ray) -> Option<Point3<f64>>;
}

/// Renders the scene from an arbitrary pose at full frame.
pub trait ViewRenderer {
    /// Render a `width` x `height` RGB image as seen from `pose` through a
    /// pinhole with `intrinsics`.
    ///
    /// `intrinsics` are the ones saved with the capture, so the image and
    /// the correspondence table describe the same camera.
    fn render_full_frame(
        &mut self,
        pose: &Pose,
        intrinsics: &IntrinsicParameters,
        width: u32,
        height: u32,
    ) -> Result<RgbImage>;
}

/// Encodes a raster into a byte stream, e.g. a PNG file.
pub trait RasterEncoder {
    fn encode(&self, raster: &RgbImage) -> Result<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PngRasterEncoder;

impl RasterEncoder for PngRasterEncoder {
    fn encode(&self, raster: &RgbImage) -> Result<Vec<u8>> {
        use image::ImageEncoder;
        let mut png_buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut png_buf);
        encoder.write_image(
            raster.as_raw(),
            raster.width(),
            raster.height(),
            image::ExtendedColorType::Rgb8,
        )?;
        Ok(png_buf)
    }
}

/// A ray-cast result for a single pixel of the left eye view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrespondencePoint {
    /// `(x, y)` with the origin at the top-left pixel.
    pub pixel: (u32, u32),
    /// Surface point in the left eye's local frame.
    pub local_position: Point3<f64>,
}

/// Generates world-frame rays through pixel centers.
///
/// Pixel `(x, y)` covers `[x, x+1) x [y, y+1)` in the continuous image frame
/// of the intrinsic matrix and is sampled at its center.
pub struct PixelRays {
    camera: cam_geom::Camera<f64, cam_geom::IntrinsicParametersPerspective<f64>>,
}

impl PixelRays {
    pub fn new(intrinsics: &IntrinsicParameters, pose: &Pose) -> Self {
        Self {
            camera: cam_geom::Camera::new(intrinsics.to_cam_geom(), pose.to_extrinsics()),
        }
    }

    pub fn ray_through(&self, x: u32, y: u32) -> Ray {
        let pixel = cam_geom::Pixels::new(RowVector2::new(f64::from(x) + 0.5, f64::from(y) + 0.5));
        let world_ray = self.camera.pixel_to_world(&pixel).to_single_ray();
        Ray::new(
            Point3::from(world_ray.center.transpose()),
            world_ray.direction.transpose(),
        )
    }
}

/// The camera whose pose is temporarily moved to each eye during capture.
#[derive(Debug, Clone)]
pub struct StereoCamera {
    name: String,
    config: CameraConfig,
    pose: Pose,
}

impl StereoCamera {
    pub fn new(name: impl Into<String>, config: CameraConfig, pose: Pose) -> Self {
        Self {
            name: name.into(),
            config,
            pose,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn config(&self) -> &CameraConfig {
        &self.config
    }
    pub fn config_mut(&mut self) -> &mut CameraConfig {
        &mut self.config
    }
    pub fn pose(&self) -> &Pose {
        &self.pose
    }
}

/// Puts the camera back at its reference pose when dropped.
struct PoseRestorer<'a> {
    camera: &'a mut StereoCamera,
    reference: Pose,
}

impl<'a> PoseRestorer<'a> {
    fn new(camera: &'a mut StereoCamera) -> Self {
        let reference = camera.pose;
        Self { camera, reference }
    }
    fn move_to(&mut self, pose: Pose) {
        self.camera.pose = pose;
    }
}

impl Drop for PoseRestorer<'_> {
    fn drop(&mut self) {
        self.camera.pose = self.reference;
    }
}

/// Capture both eyes and the left eye correspondences.
///
/// The camera is moved to the left and then the right eye pose, each offset
/// by half the baseline along the reference pose's right axis. Each view is
/// rendered and encoded. For the left eye, a ray is cast through every pixel
/// and each hit is recorded in raster order (rows top to bottom, pixels left
/// to right). Pixels without a hit are skipped.
///
/// The camera pose is restored to its value on entry before this returns,
/// also on error. Either the full artifact set is returned or nothing is.
///
/// This blocks for the whole `width * height` sweep.
pub fn capture(
    camera: &mut StereoCamera,
    intersector: &dyn RayIntersector,
    renderer: &mut dyn ViewRenderer,
    encoder: &dyn RasterEncoder,
) -> Result<CaptureArtifacts> {
    let config = camera.config().clone();
    let (width, height) = config.resolution();
    let (width, height) = (width.max(1), height.max(1));
    let baseline_offset = clamp_baseline_offset(config.baseline_offset());
    let intrinsics = IntrinsicParameters::from_config(&config);

    info!(
        "capturing camera \"{}\" at {width}x{height}, baseline {baseline_offset} m",
        camera.name()
    );
    debug!("intrinsics: {intrinsics:?}");

    let mut restorer = PoseRestorer::new(camera);
    let reference = restorer.reference;

    let mut images: [Vec<u8>; 2] = Default::default();
    let mut correspondences = Vec::new();
    for (idx, eye) in Eye::ALL.iter().enumerate() {
        let eye_pose = eye.pose(&reference, baseline_offset);
        restorer.move_to(eye_pose);
        debug!("rendering {eye} eye at {:?}", eye_pose.position);

        let raster = renderer.render_full_frame(&eye_pose, &intrinsics, width, height)?;
        if raster.dimensions() != (width, height) {
            return Err(Error::RasterSizeMismatch {
                width,
                height,
                actual_width: raster.width(),
                actual_height: raster.height(),
            });
        }

        if *eye == Eye::Left {
            correspondences =
                correspondence_sweep(&intrinsics, &eye_pose, width, height, intersector);
        }

        images[idx] = encoder.encode(&raster)?;
    }
    drop(restorer);

    let [left_image, right_image] = images;
    Ok(CaptureArtifacts {
        intrinsics,
        correspondences,
        left_image,
        right_image,
    })
}

/// Cast one ray per pixel from `pose` and collect the hits in raster order.
///
/// Hit points are expressed in the local frame of `pose`.
pub fn correspondence_sweep(
    intrinsics: &IntrinsicParameters,
    pose: &Pose,
    width: u32,
    height: u32,
    intersector: &dyn RayIntersector,
) -> Vec<CorrespondencePoint> {
    let rays = PixelRays::new(intrinsics, pose);
    let mut points = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let ray = rays.ray_through(x, y);
            if let Some(world) = intersector.intersect(&ray) {
                points.push(CorrespondencePoint {
                    pixel: (x, y),
                    local_position: pose.world_to_local(&world),
                });
            }
        }
        trace!("row {y}: {} hits so far", points.len());
    }
    let n_rays = u64::from(width) * u64::from(height);
    info!("{} of {n_rays} rays hit the scene", points.len());
    points
}
