// Copyright 2020-2023 Andrew D. Straw.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT
// or http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A destination for "files", either a filesystem directory or zip archive.
//!
//! The primary object of interest in this crate is the struct
//! [ZipDirWriter], which provides a write-only wrapper over a directory within
//! a filesystem or a zip archive. Callers hand it named byte blobs with
//! [ZipDirWriter::write_file] and do not need to care which of the two
//! storage drivers is in use.
//!
//! Relative names always use forward slashes as the directory separator. When
//! writing to a directory, they are converted to native paths. When writing
//! to a zip archive, they are stored as given (zip files always use forward
//! slashes).
//!
//! When writing zip archives, the destination need not be a local file on the
//! filesystem. Instead, [ZipDirWriter::create_zip] takes any writer that
//! implements the `std::io::Write + std::io::Seek` traits. Therefore, one
//! could e.g. stage an archive in memory with `std::io::Cursor<Vec<u8>>` and
//! hand the finished bytes to a browser download.

use std::{
    fs::File,
    io::{Seek, Write},
    path::{Component, Path, PathBuf},
};

/// A type alias to wrap return types.
pub type Result<M> = std::result::Result<M, Error>;

/// The possible error types.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("{source}")]
    Zip {
        #[from]
        source: zip::result::ZipError,
    },
    #[error("invalid relative path: \"{0}\"")]
    InvalidPath(String),
    #[error("archive already finished")]
    AlreadyFinished,
}

enum Driver<W: Write + Seek> {
    Dir,
    Zip(Box<zip::ZipWriter<W>>),
    Finished,
}

/// Write-access to either a single zip file or a directory.
///
/// See the crate-level documentation for more information.
pub struct ZipDirWriter<W: Write + Seek> {
    /// The path to the archive (either zip file or dir)
    path: PathBuf,
    driver: Driver<W>,
    n_files: usize,
}

impl<W: Write + Seek> std::fmt::Debug for ZipDirWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.driver {
            Driver::Dir => "dir",
            Driver::Zip(_) => "zip",
            Driver::Finished => "finished",
        };
        f.debug_struct("ZipDirWriter")
            .field("path", &self.path)
            .field("kind", &kind)
            .field("n_files", &self.n_files)
            .finish()
    }
}

impl ZipDirWriter<File> {
    /// Automatically create a ZipDirWriter at a path on the filesystem.
    ///
    /// If the path has a `.zip` extension, a new file is created and passed
    /// to [Self::create_zip]. Otherwise the path is opened (and created, if
    /// needed) as a directory with [Self::create_dir].
    pub fn auto_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let is_zip = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);
        if is_zip {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = File::create(path)?;
            Self::create_zip(file, path.display().to_string())
        } else {
            Self::create_dir(path)
        }
    }

    /// Use a filesystem directory as the destination, creating it if needed.
    pub fn create_dir<P: AsRef<Path>>(path: P) -> Result<Self> {
        std::fs::create_dir_all(path.as_ref())?;
        Ok(ZipDirWriter {
            path: path.as_ref().to_path_buf(),
            driver: Driver::Dir,
            n_files: 0,
        })
    }
}

impl<W: Write + Seek> ZipDirWriter<W> {
    /// Start a new zip archive in `writer`.
    pub fn create_zip(writer: W, display_name: String) -> Result<Self> {
        Ok(ZipDirWriter {
            path: display_name.into(),
            driver: Driver::Zip(Box::new(zip::ZipWriter::new(writer))),
            n_files: 0,
        })
    }

    pub fn display(&self) -> std::path::Display<'_> {
        self.path.display()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_zip(&self) -> bool {
        matches!(self.driver, Driver::Zip(_))
    }

    /// Number of files written so far.
    pub fn n_files(&self) -> usize {
        self.n_files
    }

    /// Write `contents` to the slash-separated relative name `relname`.
    ///
    /// Existing files in a directory destination are overwritten.
    pub fn write_file(&mut self, relname: &str, contents: &[u8]) -> Result<()> {
        let components = split_relname(relname)?;
        match &mut self.driver {
            Driver::Dir => {
                let mut full = self.path.clone();
                for c in components.iter() {
                    full.push(c);
                }
                if let Some(parent) = full.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut fd = File::create(&full)?;
                fd.write_all(contents)?;
                tracing::trace!("wrote {} bytes to \"{}\"", contents.len(), full.display());
            }
            Driver::Zip(zip_writer) => {
                let options = zip::write::SimpleFileOptions::default()
                    .compression_method(zip::CompressionMethod::Deflated)
                    .last_modified_time(zip::DateTime::default())
                    .large_file(contents.len() >= 0xFFFFFFFF);
                zip_writer.start_file(components.join("/"), options)?;
                zip_writer.write_all(contents)?;
                tracing::trace!(
                    "wrote {} bytes to \"{}\" in \"{}\"",
                    contents.len(),
                    relname,
                    self.path.display()
                );
            }
            Driver::Finished => {
                return Err(Error::AlreadyFinished);
            }
        }
        self.n_files += 1;
        Ok(())
    }

    /// Finish writing.
    ///
    /// For zip archives, this writes the central directory and returns the
    /// underlying writer. For directories, nothing needs to be done and
    /// `None` is returned.
    pub fn finish(mut self) -> Result<Option<W>> {
        match std::mem::replace(&mut self.driver, Driver::Finished) {
            Driver::Dir => Ok(None),
            Driver::Zip(zip_writer) => Ok(Some(zip_writer.finish()?)),
            Driver::Finished => Err(Error::AlreadyFinished),
        }
    }
}

/// Split a forward-slash separated relative name into its components.
///
/// Absolute names and names with `..` components are rejected so that
/// nothing is ever written outside of the destination.
fn split_relname(relname: &str) -> Result<Vec<&str>> {
    let invalid = || Error::InvalidPath(relname.to_string());
    if relname.starts_with('/') || relname.contains('\\') {
        return Err(invalid());
    }
    let components: Vec<&str> = relname
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();
    if components.is_empty() {
        return Err(invalid());
    }
    for c in components.iter() {
        match Path::new(c).components().next() {
            Some(Component::Normal(_)) => {}
            _ => return Err(invalid()),
        }
    }
    Ok(components)
}

/// Compile time test that our types here implement `Send` trait.
#[test]
fn test_implements_send() {
    fn implements_send<F: Send>() {}
    implements_send::<ZipDirWriter<File>>();
}
