use std::path::{Path, PathBuf};

use clap::Parser;
use eyre::WrapErr;
use nalgebra::{Point3, Vector3};
use serde::Deserialize;
use tracing::{info, warn};

use parry_scene::{Scene, SceneRenderer};
use stereo_cal_data::{
    CameraConfig, CaptureArtifacts, PngRasterEncoder, Pose, StereoCamera, artifact_root, capture,
    check_identifiers, save_artifacts,
};
use zip_or_dir::ZipDirWriter;

mod logging;

/// Generate stereo calibration data by capturing a simulated scene.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Filename of input yaml file describing the camera and the scene
    job_yaml: PathBuf,

    /// Output directory, or a path ending in `.zip` to write an archive
    #[arg(long, short, default_value = ".")]
    output: PathBuf,

    /// Scene name used in the saved paths (defaults to the scene's own name)
    #[arg(long)]
    scene_name: Option<String>,

    /// Also write log messages to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Job {
    camera: CameraJob,
    /// Scene yaml file, relative to the job file.
    scene: PathBuf,
}

fn default_up() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CameraJob {
    name: String,
    #[serde(default)]
    config: CameraConfig,
    position: [f64; 3],
    look_at: [f64; 3],
    #[serde(default = "default_up")]
    up: [f64; 3],
}

impl CameraJob {
    fn pose(&self) -> Pose {
        Pose::from_view(
            &Point3::from(self.position),
            &Point3::from(self.look_at),
            &Vector3::from(self.up),
        )
    }
}

fn run(
    job_yaml: &Path,
    output: &Path,
    scene_name: Option<String>,
) -> eyre::Result<(String, CaptureArtifacts)> {
    let job_dir = job_yaml.parent().unwrap_or(Path::new("."));
    let fd = std::fs::File::open(job_yaml)
        .wrap_err_with(|| format!("opening job file \"{}\"", job_yaml.display()))?;
    let job: Job = serde_yaml::from_reader(fd)
        .wrap_err_with(|| format!("parsing job file \"{}\"", job_yaml.display()))?;

    let scene_path = job_dir.join(&job.scene);
    let scene = Scene::from_yaml_path(&scene_path)
        .wrap_err_with(|| format!("loading scene \"{}\"", scene_path.display()))?;
    let scene_name = scene_name.unwrap_or_else(|| scene.name().to_string());

    let pose = job.camera.pose();
    let mut camera = StereoCamera::new(job.camera.name, job.camera.config, pose);
    check_identifiers(&scene_name, camera.name())?;

    let mut renderer = SceneRenderer::new(&scene);
    let artifacts = capture(&mut camera, &scene, &mut renderer, &PngRasterEncoder)?;
    write_output(output, &artifacts, &scene_name, camera.name())?;

    Ok((artifact_root(&scene_name, camera.name()), artifacts))
}

/// Save `artifacts` to `output`. A zip archive created here is removed again
/// if writing fails.
fn write_output(
    output: &Path,
    artifacts: &CaptureArtifacts,
    scene_name: &str,
    camera_name: &str,
) -> eyre::Result<()> {
    let existed = output.exists();
    let mut out = ZipDirWriter::auto_from_path(output)
        .wrap_err_with(|| format!("creating output \"{}\"", output.display()))?;
    let remove_partial = !existed && out.is_zip();

    let result = save_artifacts(artifacts, scene_name, camera_name, &mut out).and_then(|()| {
        info!("wrote {} files to \"{}\"", out.n_files(), out.display());
        out.finish()?;
        Ok(())
    });
    if let Err(err) = result {
        if remove_partial {
            if let Err(rm_err) = std::fs::remove_file(output) {
                warn!("could not remove \"{}\": {rm_err}", output.display());
            }
        }
        return Err(err).wrap_err_with(|| format!("writing output \"{}\"", output.display()));
    }
    Ok(())
}

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_file.as_deref())?;

    let (root, artifacts) = run(&cli.job_yaml, &cli.output, cli.scene_name)?;
    info!(
        "{} correspondences saved to {root} in \"{}\"",
        artifacts.correspondences.len(),
        cli.output.display()
    );
    Ok(())
}
