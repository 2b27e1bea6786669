use std::cell::Cell;

use approx::assert_relative_eq;
use image::{Rgb, RgbImage};
use nalgebra::{Point3, Vector3};
use parry3d_f64::query::Ray;
use test_log::test;

use stereo_cal_data::{
    CameraConfig, Error, IntrinsicParameters, MemorySink, Pose, PngRasterEncoder, RayIntersector,
    StereoCamera, ViewRenderer, capture, capture_and_save,
};

/// Infinite plane `z = depth` in world coordinates, hit from either side.
struct ZPlane {
    depth: f64,
    n_rays: Cell<usize>,
}

impl ZPlane {
    fn new(depth: f64) -> Self {
        Self {
            depth,
            n_rays: Cell::new(0),
        }
    }
}

impl RayIntersector for ZPlane {
    fn intersect(&self, ray: &Ray) -> Option<Point3<f64>> {
        self.n_rays.set(self.n_rays.get() + 1);
        if ray.dir.z.abs() < 1e-15 {
            return None;
        }
        let t = (self.depth - ray.origin.z) / ray.dir.z;
        (t >= 0.0).then(|| ray.point_at(t))
    }
}

struct Nothing;

impl RayIntersector for Nothing {
    fn intersect(&self, _ray: &Ray) -> Option<Point3<f64>> {
        None
    }
}

/// Fills the frame with a color derived from the eye position.
#[derive(Default)]
struct FlatRenderer {
    poses: Vec<Pose>,
    fail_on_call: Option<usize>,
    wrong_size: bool,
}

impl ViewRenderer for FlatRenderer {
    fn render_full_frame(
        &mut self,
        pose: &Pose,
        _intrinsics: &IntrinsicParameters,
        width: u32,
        height: u32,
    ) -> stereo_cal_data::Result<RgbImage> {
        if self.fail_on_call == Some(self.poses.len()) {
            return Err(Error::Render("no render target".into()));
        }
        self.poses.push(*pose);
        let shade = if pose.position.x < 0.0 { 50 } else { 200 };
        let width = if self.wrong_size { width + 1 } else { width };
        Ok(RgbImage::from_pixel(width, height, Rgb([shade, shade, shade])))
    }
}

fn reference_pose() -> Pose {
    Pose::from_view(
        &Point3::new(0.0, 0.0, 0.0),
        &Point3::new(0.0, 0.0, 1.0),
        &Vector3::new(0.0, -1.0, 0.0),
    )
}

fn small_camera(width: u32, height: u32) -> StereoCamera {
    let config = CameraConfig::default()
        .with_resolution(width, height)
        .with_sensor_size(4.0, 4.0)
        .with_focal_length(4.0)
        .with_baseline_offset(0.5);
    StereoCamera::new("Main Camera", config, reference_pose())
}

#[test]
fn test_full_hd_intrinsics() {
    let config = CameraConfig::default()
        .with_resolution(1920, 1080)
        .with_sensor_size(36.0, 24.0)
        .with_focal_length(50.0)
        .with_lens_shift(0.0, 0.0);
    let k = IntrinsicParameters::from_config(&config);
    assert_relative_eq!(k.focal_length_x, 2666.667, epsilon = 1e-2);
    assert_relative_eq!(k.focal_length_y, 2250.0, epsilon = 1e-2);
    assert_relative_eq!(k.principal_point_x, 960.0, epsilon = 1e-2);
    assert_relative_eq!(k.principal_point_y, 540.0, epsilon = 1e-2);
}

#[test]
fn test_single_pixel() {
    let mut camera = small_camera(1, 1);
    let plane = ZPlane::new(3.0);
    let mut renderer = FlatRenderer::default();
    let artifacts = capture(&mut camera, &plane, &mut renderer, &PngRasterEncoder).unwrap();

    assert_eq!(plane.n_rays.get(), 1);
    assert_eq!(artifacts.calibration_2d_text(), "0 0\n");
    assert_eq!(artifacts.correspondences.len(), 1);
    let local = artifacts.correspondences[0].local_position;
    // The single pixel is centered on the optical axis.
    assert_relative_eq!(local, Point3::new(0.0, 0.0, 3.0), epsilon = 1e-12);
    assert_eq!(artifacts.calibration_3d_text().lines().count(), 1);
}

#[test]
fn test_dense_sweep_order_and_frame() {
    let (width, height) = (8, 6);
    let mut camera = small_camera(width, height);
    let plane = ZPlane::new(2.0);
    let mut renderer = FlatRenderer::default();
    let artifacts = capture(&mut camera, &plane, &mut renderer, &PngRasterEncoder).unwrap();

    assert_eq!(plane.n_rays.get(), (width * height) as usize);
    assert_eq!(artifacts.correspondences.len(), (width * height) as usize);

    let expected_pixels: Vec<(u32, u32)> = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .collect();
    let actual_pixels: Vec<(u32, u32)> =
        artifacts.correspondences.iter().map(|c| c.pixel).collect();
    assert_eq!(actual_pixels, expected_pixels);

    // Points are in the left eye frame, so the plane is at local depth 2 and
    // projecting back through K lands on the pixel center.
    let k = artifacts.intrinsics;
    for c in artifacts.correspondences.iter() {
        let p = c.local_position;
        assert_relative_eq!(p.z, 2.0, epsilon = 1e-9);
        let u = k.focal_length_x * p.x / p.z + k.principal_point_x;
        let v = k.focal_length_y * p.y / p.z + k.principal_point_y;
        assert_relative_eq!(u, f64::from(c.pixel.0) + 0.5, epsilon = 1e-9);
        assert_relative_eq!(v, f64::from(c.pixel.1) + 0.5, epsilon = 1e-9);
    }

    let n2 = artifacts.calibration_2d_text().lines().count();
    let n3 = artifacts.calibration_3d_text().lines().count();
    assert_eq!(n2, n3);
}

#[test]
fn test_eye_poses() {
    let mut camera = small_camera(4, 4);
    let reference = *camera.pose();
    let right = reference.right();
    let mut renderer = FlatRenderer::default();
    capture(&mut camera, &Nothing, &mut renderer, &PngRasterEncoder).unwrap();

    assert_eq!(renderer.poses.len(), 2);
    let (left, right_eye) = (renderer.poses[0], renderer.poses[1]);
    assert_relative_eq!(left.position, reference.position - right * 0.25, epsilon = 1e-12);
    assert_relative_eq!(right_eye.position, reference.position + right * 0.25, epsilon = 1e-12);
    assert_eq!(left.orientation, reference.orientation);
    assert_eq!(right_eye.orientation, reference.orientation);
}

#[test]
fn test_empty_scene() {
    let mut camera = small_camera(5, 4);
    let mut renderer = FlatRenderer::default();
    let artifacts = capture(&mut camera, &Nothing, &mut renderer, &PngRasterEncoder).unwrap();
    assert!(artifacts.correspondences.is_empty());
    assert_eq!(artifacts.calibration_2d_text(), "");
    assert_eq!(artifacts.calibration_3d_text(), "");
    assert!(!artifacts.left_image.is_empty());
    assert_ne!(artifacts.left_image, artifacts.right_image);
}

#[test]
fn test_pose_restored() {
    for baseline in [0.5, 1e-9, 0.0, -0.0, -3.0, f64::NAN] {
        let mut camera = small_camera(3, 2);
        camera.config_mut().set_baseline_offset(baseline);
        let before = *camera.pose();
        let mut renderer = FlatRenderer::default();
        capture(&mut camera, &ZPlane::new(1.0), &mut renderer, &PngRasterEncoder).unwrap();
        assert_eq!(camera.pose().position, before.position);
        assert_eq!(camera.pose().orientation, before.orientation);
        // The two eyes never coincide.
        assert_ne!(renderer.poses[0].position, renderer.poses[1].position);
    }
}

#[test]
fn test_pose_restored_on_error() {
    let mut camera = small_camera(3, 2);
    let before = *camera.pose();
    // Fail on the left eye, before the sweep, and on the right eye, after it.
    for fail_on_call in [0, 1] {
        let plane = ZPlane::new(1.0);
        let mut renderer = FlatRenderer {
            fail_on_call: Some(fail_on_call),
            ..Default::default()
        };
        let result = capture(&mut camera, &plane, &mut renderer, &PngRasterEncoder);
        assert!(matches!(result, Err(Error::Render(_))));
        assert_eq!(renderer.poses.len(), fail_on_call);
        assert_eq!(plane.n_rays.get(), if fail_on_call == 0 { 0 } else { 6 });
        assert_eq!(*camera.pose(), before);
    }

    let mut renderer = FlatRenderer {
        wrong_size: true,
        ..Default::default()
    };
    let result = capture(&mut camera, &ZPlane::new(1.0), &mut renderer, &PngRasterEncoder);
    assert!(matches!(
        result,
        Err(Error::RasterSizeMismatch {
            width: 3,
            actual_width: 4,
            ..
        })
    ));
    assert_eq!(*camera.pose(), before);
}

#[test]
fn test_idempotent() {
    let plane = ZPlane::new(4.0);
    let mut a = MemorySink::new();
    let mut b = MemorySink::new();
    for sink in [&mut a, &mut b] {
        let mut camera = small_camera(6, 4);
        let mut renderer = FlatRenderer::default();
        capture_and_save(
            &mut camera,
            "Scene",
            &plane,
            &mut renderer,
            &PngRasterEncoder,
            sink,
        )
        .unwrap();
    }
    assert_eq!(a.files.len(), 9);
    assert_eq!(a.files, b.files);
}

#[test]
fn test_configuration_errors_before_capture() {
    let mut camera = small_camera(2, 2);
    let mut renderer = FlatRenderer::default();
    let mut sink = MemorySink::new();
    let result = capture_and_save(
        &mut camera,
        "",
        &Nothing,
        &mut renderer,
        &PngRasterEncoder,
        &mut sink,
    );
    assert!(matches!(result, Err(Error::NoActiveScene)));

    let mut nameless = StereoCamera::new("", camera.config().clone(), *camera.pose());
    let result = capture_and_save(
        &mut nameless,
        "Scene",
        &Nothing,
        &mut renderer,
        &PngRasterEncoder,
        &mut sink,
    );
    assert!(matches!(result, Err(Error::MissingCamera)));

    assert!(renderer.poses.is_empty());
    assert!(sink.files.is_empty());
}

#[test]
fn test_save_to_dir_and_zip() {
    let tempdir = tempfile::tempdir().unwrap();
    let plane = ZPlane::new(1.5);

    let mut camera = small_camera(4, 3);
    let mut renderer = FlatRenderer::default();
    let mut dir_sink = zip_or_dir::ZipDirWriter::auto_from_path(tempdir.path().join("out")).unwrap();
    capture_and_save(
        &mut camera,
        "Scene1",
        &plane,
        &mut renderer,
        &PngRasterEncoder,
        &mut dir_sink,
    )
    .unwrap();
    dir_sink.finish().unwrap();

    let cam_dir = tempdir
        .path()
        .join("out")
        .join("Camera-Data")
        .join("Scene1")
        .join("Main Camera");
    let matrix = std::fs::read_to_string(cam_dir.join("Intrinsic-Matrix.txt")).unwrap();
    assert_eq!(matrix, "4 0 2\n0 3 1.5\n0 0 1");
    let cal2d = std::fs::read_to_string(cam_dir.join("Calibration-2D.txt")).unwrap();
    let cal3d = std::fs::read_to_string(cam_dir.join("Calibration-3D.txt")).unwrap();
    assert_eq!(cal2d.lines().count(), 12);
    assert_eq!(cal3d.lines().count(), 12);
    for line in cal3d.lines() {
        assert_eq!(line.split(' ').count(), 3);
        assert!(!line.contains(','));
    }
    let left = image::open(cam_dir.join("Left.png")).unwrap();
    assert_eq!((left.width(), left.height()), (4, 3));

    let zip_fname = tempdir.path().join("out.zip");
    let mut zip_sink = zip_or_dir::ZipDirWriter::auto_from_path(&zip_fname).unwrap();
    capture_and_save(
        &mut camera,
        "Scene1",
        &plane,
        &mut renderer,
        &PngRasterEncoder,
        &mut zip_sink,
    )
    .unwrap();
    zip_sink.finish().unwrap();

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&zip_fname).unwrap()).unwrap();
    assert_eq!(archive.len(), 9);
    let mut buf = String::new();
    std::io::Read::read_to_string(
        &mut archive
            .by_name("Camera-Data/Scene1/Main Camera/Intrinsic-Matrix.txt")
            .unwrap(),
        &mut buf,
    )
    .unwrap();
    assert_eq!(buf, matrix);
}
