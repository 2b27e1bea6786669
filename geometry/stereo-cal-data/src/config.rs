use serde::{Deserialize, Serialize};

/// Smallest allowed sensor width or height, in millimeters.
pub const MIN_SENSOR_SIZE_MM: f64 = 0.1;

/// Smallest allowed focal length, in millimeters.
pub const MIN_FOCAL_LENGTH_MM: f64 = 0.1047227;

/// Baseline used in place of a zero or negative configured baseline.
///
/// This only keeps the two eye positions from coinciding. It is not a
/// meaningful stereo baseline.
pub const MIN_BASELINE_OFFSET: f64 = f64::EPSILON;

/// Camera parameters for a single stereo capture.
///
/// All fields are private and every setter clamps its input, so that an
/// instance always satisfies:
///
/// - `width >= 1` and `height >= 1`
/// - each sensor dimension `>= MIN_SENSOR_SIZE_MM`
/// - `focal_length >= MIN_FOCAL_LENGTH_MM`
/// - `baseline_offset > 0`
///
/// Deserialization goes through the same setters, so a configuration loaded
/// from a file is clamped exactly like one edited interactively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCameraConfig", into = "RawCameraConfig")]
pub struct CameraConfig {
    width: u32,
    height: u32,
    sensor_size: (f64, f64),
    focal_length: f64,
    lens_shift: (f64, f64),
    baseline_offset: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            sensor_size: (36.0, 24.0),
            focal_length: 50.0,
            lens_shift: (0.0, 0.0),
            baseline_offset: 0.064,
        }
    }
}

impl CameraConfig {
    /// Image width and height in pixels.
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
    pub fn width(&self) -> u32 {
        self.width
    }
    pub fn height(&self) -> u32 {
        self.height
    }
    /// Sensor width and height in millimeters.
    pub fn sensor_size(&self) -> (f64, f64) {
        self.sensor_size
    }
    /// Focal length in millimeters.
    pub fn focal_length(&self) -> f64 {
        self.focal_length
    }
    /// Lens shift as a fraction of the sensor size.
    pub fn lens_shift(&self) -> (f64, f64) {
        self.lens_shift
    }
    /// Distance between the left and right eye, in meters.
    pub fn baseline_offset(&self) -> f64 {
        self.baseline_offset
    }
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
    }
    pub fn set_sensor_size(&mut self, width_mm: f64, height_mm: f64) {
        self.sensor_size = (
            floor_at(width_mm, MIN_SENSOR_SIZE_MM),
            floor_at(height_mm, MIN_SENSOR_SIZE_MM),
        );
    }
    pub fn set_focal_length(&mut self, focal_length_mm: f64) {
        self.focal_length = floor_at(focal_length_mm, MIN_FOCAL_LENGTH_MM);
    }
    pub fn set_lens_shift(&mut self, x: f64, y: f64) {
        self.lens_shift = (x, y);
    }
    pub fn set_baseline_offset(&mut self, meters: f64) {
        self.baseline_offset = clamp_baseline_offset(meters);
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.set_resolution(width, height);
        self
    }
    pub fn with_sensor_size(mut self, width_mm: f64, height_mm: f64) -> Self {
        self.set_sensor_size(width_mm, height_mm);
        self
    }
    pub fn with_focal_length(mut self, focal_length_mm: f64) -> Self {
        self.set_focal_length(focal_length_mm);
        self
    }
    pub fn with_lens_shift(mut self, x: f64, y: f64) -> Self {
        self.set_lens_shift(x, y);
        self
    }
    pub fn with_baseline_offset(mut self, meters: f64) -> Self {
        self.set_baseline_offset(meters);
        self
    }
}

/// Replace a non-positive (or NaN) baseline with [MIN_BASELINE_OFFSET].
pub fn clamp_baseline_offset(meters: f64) -> f64 {
    if meters > 0.0 {
        meters
    } else {
        MIN_BASELINE_OFFSET
    }
}

// NaN compares false and so is also replaced by `min`.
fn floor_at(value: f64, min: f64) -> f64 {
    if value >= min { value } else { min }
}

/// On-disk form of [CameraConfig], before clamping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct RawCameraConfig {
    width: i64,
    height: i64,
    sensor_size: (f64, f64),
    focal_length: f64,
    lens_shift: (f64, f64),
    baseline_offset: f64,
}

impl Default for RawCameraConfig {
    fn default() -> Self {
        CameraConfig::default().into()
    }
}

impl From<RawCameraConfig> for CameraConfig {
    fn from(raw: RawCameraConfig) -> Self {
        fn to_dim(x: i64) -> u32 {
            u32::try_from(x.max(1)).unwrap_or(u32::MAX)
        }
        let mut cfg = CameraConfig::default();
        cfg.set_resolution(to_dim(raw.width), to_dim(raw.height));
        cfg.set_sensor_size(raw.sensor_size.0, raw.sensor_size.1);
        cfg.set_focal_length(raw.focal_length);
        cfg.set_lens_shift(raw.lens_shift.0, raw.lens_shift.1);
        cfg.set_baseline_offset(raw.baseline_offset);
        cfg
    }
}

impl From<CameraConfig> for RawCameraConfig {
    fn from(cfg: CameraConfig) -> Self {
        Self {
            width: cfg.width.into(),
            height: cfg.height.into(),
            sensor_size: cfg.sensor_size,
            focal_length: cfg.focal_length,
            lens_shift: cfg.lens_shift,
            baseline_offset: cfg.baseline_offset,
        }
    }
}
