use nalgebra::Matrix3;

use crate::config::CameraConfig;

/// Pinhole intrinsic parameters, in pixels.
///
/// These are derived from the physical camera description (sensor size and
/// focal length in millimeters, lens shift as a fraction of the sensor) and
/// the image resolution. All arithmetic is done in `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntrinsicParameters {
    pub focal_length_x: f64,
    pub focal_length_y: f64,
    pub principal_point_x: f64,
    pub principal_point_y: f64,
}

impl IntrinsicParameters {
    /// Compute the intrinsic parameters.
    ///
    /// Inputs are expected to be already clamped (see
    /// [CameraConfig](crate::CameraConfig)). This function has no failure
    /// modes and always returns bit-identical results for identical inputs.
    pub fn compute(
        width: u32,
        height: u32,
        focal_length_mm: f64,
        sensor_size: (f64, f64),
        lens_shift: (f64, f64),
    ) -> Self {
        let width = f64::from(width);
        let height = f64::from(height);
        Self {
            focal_length_x: focal_length_mm * width / sensor_size.0,
            focal_length_y: focal_length_mm * height / sensor_size.1,
            principal_point_x: (0.5 + lens_shift.0) * width,
            principal_point_y: (0.5 + lens_shift.1) * height,
        }
    }

    pub fn from_config(cfg: &CameraConfig) -> Self {
        Self::compute(
            cfg.width(),
            cfg.height(),
            cfg.focal_length(),
            cfg.sensor_size(),
            cfg.lens_shift(),
        )
    }

    /// The 3x3 intrinsic matrix `K`.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focal_length_x,
            0.0,
            self.principal_point_x,
            0.0,
            self.focal_length_y,
            self.principal_point_y,
            0.0,
            0.0,
            1.0,
        )
    }

    /// `K` as three newline separated rows of space separated values.
    pub fn matrix_text(&self) -> String {
        let k = self.matrix();
        (0..3)
            .map(|row| {
                (0..3)
                    .map(|col| format!("{}", k[(row, col)]))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn focal_length_x_text(&self) -> String {
        format!("{}", self.focal_length_x)
    }
    pub fn focal_length_y_text(&self) -> String {
        format!("{}", self.focal_length_y)
    }
    pub fn principal_point_x_text(&self) -> String {
        format!("{}", self.principal_point_x)
    }
    pub fn principal_point_y_text(&self) -> String {
        format!("{}", self.principal_point_y)
    }

    /// Convert to a linear (distortion-free) `cam-geom` model with zero skew.
    pub fn to_cam_geom(&self) -> cam_geom::IntrinsicParametersPerspective<f64> {
        cam_geom::PerspectiveParams {
            fx: self.focal_length_x,
            fy: self.focal_length_y,
            skew: 0.0,
            cx: self.principal_point_x,
            cy: self.principal_point_y,
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_full_hd_35mm() {
        let k = IntrinsicParameters::compute(1920, 1080, 50.0, (36.0, 24.0), (0.0, 0.0));
        assert_relative_eq!(k.focal_length_x, 2666.667, epsilon = 1e-2);
        assert_relative_eq!(k.focal_length_y, 2250.0, epsilon = 1e-2);
        assert_relative_eq!(k.principal_point_x, 960.0, epsilon = 1e-2);
        assert_relative_eq!(k.principal_point_y, 540.0, epsilon = 1e-2);
    }

    #[test]
    fn test_formulas() {
        for (width, height, f, sensor, shift) in [
            (1u32, 1u32, 0.1047227, (0.1, 0.1), (0.0, 0.0)),
            (640, 480, 4.2, (4.8, 3.6), (0.1, -0.05)),
            (4096, 2160, 85.0, (35.0, 24.5), (-0.5, 0.5)),
        ] {
            let k = IntrinsicParameters::compute(width, height, f, sensor, shift);
            let (w, h) = (f64::from(width), f64::from(height));
            assert_relative_eq!(k.focal_length_x, f * w / sensor.0, max_relative = 1e-9);
            assert_relative_eq!(k.focal_length_y, f * h / sensor.1, max_relative = 1e-9);
            assert_eq!(k.principal_point_x, (0.5 + shift.0) * w);
            assert_eq!(k.principal_point_y, (0.5 + shift.1) * h);
        }
    }

    #[test]
    fn test_matrix_text() {
        let k = IntrinsicParameters::compute(640, 480, 4.0, (4.0, 2.0), (0.0, 0.25));
        assert_eq!(k.matrix_text(), "640 0 320\n0 960 360\n0 0 1");
        assert_eq!(k.focal_length_x_text(), "640");
        assert_eq!(k.principal_point_y_text(), "360");
        assert_eq!(k.matrix_text().lines().count(), 3);
    }

    #[test]
    fn test_deterministic() {
        let cfg = CameraConfig::default().with_lens_shift(0.013, -0.27);
        let a = IntrinsicParameters::from_config(&cfg);
        let b = IntrinsicParameters::from_config(&cfg);
        assert_eq!(a.matrix_text(), b.matrix_text());
        assert_eq!(a.focal_length_x.to_bits(), b.focal_length_x.to_bits());
    }

    #[test]
    fn test_cam_geom_principal_ray() {
        use cam_geom::IntrinsicParameters as _;
        let k = IntrinsicParameters::compute(640, 480, 4.0, (4.0, 3.0), (0.0, 0.0));
        let intrinsics = k.to_cam_geom();
        let pixel = cam_geom::Pixels::new(nalgebra::RowVector2::new(320.0, 240.0));
        let cam_pt = intrinsics
            .pixel_to_camera(&pixel)
            .point_on_ray_at_distance(2.0);
        assert_relative_eq!(cam_pt.data[(0, 0)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(cam_pt.data[(0, 1)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(cam_pt.data[(0, 2)], 2.0, epsilon = 1e-12);
    }
}
