//! ---
//! autumn_section: "01-configuration"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Lower-priority configuration entries shipped inside the deployable."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use zip::ZipArchive;

use crate::properties::decode_bundle;

/// Environment variable pointing at an explicit packaged archive.
pub const ARCHIVE_ENV: &str = "AUTUMN_ARCHIVE";

/// Failures while reading a packaged archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive or one of its entries could not be read.
    #[error("unable to read archive {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The archive is not a readable zip file.
    #[error("invalid archive {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Secondary key/value source consulted after the resource search path.
pub trait ArchiveSource: Send + Sync + fmt::Debug {
    /// Human-readable location used in logs.
    fn describe(&self) -> String;

    /// Return the entry whose path equals `entry`, if present.
    fn read_entry(&self, entry: &str) -> Result<Option<String>, ArchiveError>;
}

/// Zip archive on disk, typically the artifact the process was deployed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipArchiveSource {
    path: PathBuf,
}

impl ZipArchiveSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Locate the packaged archive from the running executable's provenance.
    pub fn locate() -> Option<Self> {
        locate_packaged_archive().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArchiveSource for ZipArchiveSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read_entry(&self, entry: &str) -> Result<Option<String>, ArchiveError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ArchiveError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|source| ArchiveError::Format {
                path: self.path.clone(),
                source,
            })?;

        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|source| ArchiveError::Format {
                    path: self.path.clone(),
                    source,
                })?;
            if file.name() != entry {
                continue;
            }
            let mut contents = Vec::new();
            file.read_to_end(&mut contents)
                .map_err(|source| ArchiveError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            return Ok(Some(decode_bundle(contents)));
        }
        Ok(None)
    }
}

/// Build-time table of entries, e.g. assembled with `include_str!`.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedArchive {
    entries: &'static [(&'static str, &'static str)],
}

impl EmbeddedArchive {
    pub const fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        Self { entries }
    }
}

impl ArchiveSource for EmbeddedArchive {
    fn describe(&self) -> String {
        format!("embedded archive ({} entries)", self.entries.len())
    }

    fn read_entry(&self, entry: &str) -> Result<Option<String>, ArchiveError> {
        Ok(self
            .entries
            .iter()
            .find(|(path, _)| *path == entry)
            .map(|(_, contents)| (*contents).to_owned()))
    }
}

/// Resolve the packaged archive: `AUTUMN_ARCHIVE` when set, otherwise a
/// `<exe stem>.zip` beside the running executable.
pub fn locate_packaged_archive() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os(ARCHIVE_ENV).filter(|raw| !raw.is_empty()) {
        return Some(PathBuf::from(explicit));
    }
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(err) => {
            debug!(error = %err, "unable to determine executable path");
            return None;
        }
    };
    let candidate = exe.with_extension("zip");
    if candidate.is_file() {
        Some(candidate)
    } else {
        debug!(candidate = %candidate.display(), "no packaged archive beside executable");
        None
    }
}
