#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("no camera to capture from")]
    MissingCamera,
    #[error("no active scene")]
    NoActiveScene,
    #[error("rendering failed: {0}")]
    Render(String),
    #[error(
        "rendered raster is {actual_width}x{actual_height} but {width}x{height} was requested"
    )]
    RasterSizeMismatch {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("{source}")]
    ImageError {
        #[from]
        source: image::ImageError,
    },
    #[error("writing output failed: {0}")]
    ZipOrDir(#[from] zip_or_dir::Error),
    #[error("{source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}
