use std::{borrow::Cow, collections::BTreeMap, fmt::Write as _, io::Seek};

use tracing::{debug, info};

use crate::{
    Error, Result,
    engine::{CorrespondencePoint, RasterEncoder, RayIntersector, StereoCamera, ViewRenderer},
    intrinsics::IntrinsicParameters,
    pose::Eye,
};

pub const FOCAL_LENGTH_X: &str = "Focal-Length-X.txt";
pub const FOCAL_LENGTH_Y: &str = "Focal-Length-Y.txt";
pub const PRINCIPAL_POINT_X: &str = "Principal-Point-X.txt";
pub const PRINCIPAL_POINT_Y: &str = "Principal-Point-Y.txt";
pub const INTRINSIC_MATRIX: &str = "Intrinsic-Matrix.txt";
pub const CALIBRATION_2D: &str = "Calibration-2D.txt";
pub const CALIBRATION_3D: &str = "Calibration-3D.txt";
pub const LEFT_IMAGE: &str = "Left.png";
pub const RIGHT_IMAGE: &str = "Right.png";

/// Top level directory of all saved captures.
pub const DATA_ROOT: &str = "Camera-Data";

/// Everything produced by one [capture](crate::capture).
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureArtifacts {
    pub intrinsics: IntrinsicParameters,
    /// Left eye hits in raster order.
    pub correspondences: Vec<CorrespondencePoint>,
    /// Encoded left eye image.
    pub left_image: Vec<u8>,
    /// Encoded right eye image.
    pub right_image: Vec<u8>,
}

impl CaptureArtifacts {
    /// One `x y` line per correspondence.
    pub fn calibration_2d_text(&self) -> String {
        let mut buf = String::new();
        for pt in self.correspondences.iter() {
            // Writing to a String cannot fail.
            let _ = writeln!(buf, "{} {}", pt.pixel.0, pt.pixel.1);
        }
        buf
    }

    /// One `x y z` line per correspondence, aligned with
    /// [Self::calibration_2d_text].
    pub fn calibration_3d_text(&self) -> String {
        let mut buf = String::new();
        for pt in self.correspondences.iter() {
            let p = &pt.local_position;
            let _ = writeln!(buf, "{} {} {}", p.x, p.y, p.z);
        }
        buf
    }

    /// All nine files with their names, in a fixed order.
    pub fn files(&self) -> Vec<(&'static str, Cow<'_, [u8]>)> {
        let k = &self.intrinsics;
        let text = |s: String| Cow::Owned(s.into_bytes());
        vec![
            (FOCAL_LENGTH_X, text(k.focal_length_x_text())),
            (FOCAL_LENGTH_Y, text(k.focal_length_y_text())),
            (PRINCIPAL_POINT_X, text(k.principal_point_x_text())),
            (PRINCIPAL_POINT_Y, text(k.principal_point_y_text())),
            (INTRINSIC_MATRIX, text(k.matrix_text())),
            (CALIBRATION_2D, text(self.calibration_2d_text())),
            (CALIBRATION_3D, text(self.calibration_3d_text())),
            (Eye::Left.image_name(), Cow::Borrowed(self.left_image.as_slice())),
            (Eye::Right.image_name(), Cow::Borrowed(self.right_image.as_slice())),
        ]
    }
}

/// Accepts named byte blobs.
pub trait ArtifactSink {
    fn write(&mut self, relative_path: &str, bytes: &[u8]) -> Result<()>;
}

impl<W: std::io::Write + Seek> ArtifactSink for zip_or_dir::ZipDirWriter<W> {
    fn write(&mut self, relative_path: &str, bytes: &[u8]) -> Result<()> {
        Ok(self.write_file(relative_path, bytes)?)
    }
}

/// Keeps written files in memory, keyed by relative path.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub files: BTreeMap<String, Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn get(&self, relative_path: &str) -> Option<&[u8]> {
        self.files.get(relative_path).map(Vec::as_slice)
    }
}

impl ArtifactSink for MemorySink {
    fn write(&mut self, relative_path: &str, bytes: &[u8]) -> Result<()> {
        self.files.insert(relative_path.to_string(), bytes.to_vec());
        Ok(())
    }
}

/// `Camera-Data/{scene}/{camera}`
pub fn artifact_root(scene: &str, camera: &str) -> String {
    format!("{DATA_ROOT}/{scene}/{camera}")
}

/// Fail with [Error::NoActiveScene] or [Error::MissingCamera] if an
/// identifier is blank.
pub fn check_identifiers(scene: &str, camera: &str) -> Result<()> {
    if scene.trim().is_empty() {
        return Err(Error::NoActiveScene);
    }
    if camera.trim().is_empty() {
        return Err(Error::MissingCamera);
    }
    Ok(())
}

/// Write all artifacts below [artifact_root].
///
/// Identifiers are checked before anything is written. A failing sink aborts
/// the remaining writes; files already written are left in place.
pub fn save_artifacts(
    artifacts: &CaptureArtifacts,
    scene: &str,
    camera: &str,
    sink: &mut dyn ArtifactSink,
) -> Result<()> {
    check_identifiers(scene, camera)?;
    let root = artifact_root(scene, camera);
    for (name, bytes) in artifacts.files() {
        let relname = format!("{root}/{name}");
        sink.write(&relname, &bytes)?;
        debug!("saved {relname} ({} bytes)", bytes.len());
    }
    info!(
        "saved capture to {root} with {} correspondences",
        artifacts.correspondences.len()
    );
    Ok(())
}

/// Run [capture](crate::capture) and [save_artifacts] in sequence.
pub fn capture_and_save(
    camera: &mut StereoCamera,
    scene: &str,
    intersector: &dyn RayIntersector,
    renderer: &mut dyn ViewRenderer,
    encoder: &dyn RasterEncoder,
    sink: &mut dyn ArtifactSink,
) -> Result<CaptureArtifacts> {
    check_identifiers(scene, camera.name())?;
    let artifacts = crate::capture(camera, intersector, renderer, encoder)?;
    save_artifacts(&artifacts, scene, camera.name(), sink)?;
    Ok(artifacts)
}
