//! Stereo camera calibration data from a simulated pinhole camera.
//!
//! Given a physical camera description ([CameraConfig]: resolution, sensor
//! size, focal length, lens shift and stereo baseline) and a reference
//! [Pose], this crate
//!
//! - computes the pinhole [IntrinsicParameters],
//! - renders a left and a right view, offset by half the baseline each along
//!   the camera's right axis,
//! - casts a ray through every pixel of the left view and records where it
//!   hits the scene, giving a dense 2D to 3D correspondence table,
//! - saves everything through an [ArtifactSink], either into a directory or
//!   into a zip archive.
//!
//! Rendering and ray intersection are provided by the caller through the
//! [ViewRenderer] and [RayIntersector] traits.
//!
//! ## Coordinate Systems
//!
//! - **World Frame**: the scene's 3D coordinate system.
//! - **Camera Frame**: +X right, +Y down, +Z forward. Correspondence points
//!   are saved in the left eye's camera frame.
//! - **Pixel Coordinates**: origin at the top-left corner of the image,
//!   +x right, +y down. Integer pixel `(x, y)` is sampled at its center
//!   `(x + 0.5, y + 0.5)`.
//!
//! ## Saved files
//!
//! Below `Camera-Data/{scene}/{camera}/`:
//!
//! | file | contents |
//! |---|---|
//! | `Focal-Length-X.txt`, `Focal-Length-Y.txt` | focal length in pixels |
//! | `Principal-Point-X.txt`, `Principal-Point-Y.txt` | principal point in pixels |
//! | `Intrinsic-Matrix.txt` | 3 rows of 3 space separated values |
//! | `Calibration-2D.txt` | `x y` pixel per line |
//! | `Calibration-3D.txt` | `x y z` camera frame point per line |
//! | `Left.png`, `Right.png` | rendered views |
//!
//! Line N of `Calibration-2D.txt` and line N of `Calibration-3D.txt` describe
//! the same surface point.
#![deny(rust_2018_idioms)]

mod error;
pub use error::Error;

pub mod artifacts;
pub mod config;
pub mod engine;
pub mod intrinsics;
pub mod pose;
pub mod viewport;

pub use artifacts::{
    ArtifactSink, CaptureArtifacts, MemorySink, artifact_root, capture_and_save, check_identifiers,
    save_artifacts,
};
pub use config::CameraConfig;
pub use engine::{
    CorrespondencePoint, PixelRays, PngRasterEncoder, RasterEncoder, RayIntersector,
    StereoCamera, ViewRenderer, capture, correspondence_sweep,
};
pub use intrinsics::IntrinsicParameters;
pub use pose::{Eye, Pose};

pub type Result<T> = std::result::Result<T, Error>;
