//! Versioned artifact directory.
//!
//! Every publish writes `model-v<id>.msgpack` under the next monotonic id and
//! then switches the `CURRENT` pointer file to it. Old versions are kept, so
//! serving can be pinned back to any earlier artifact.

use crate::error::{ObesityError, Result};
use crate::pipeline::{ObesityPipeline, load_artifact, save_artifact};
use log::info;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const CURRENT: &str = "CURRENT";
const PREFIX: &str = "model-v";
const SUFFIX: &str = ".msgpack";

/// Directory of numbered artifacts plus a `CURRENT` pointer.
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(ArtifactStore { dir })
    }

    /// Opens a store that must already exist. A missing directory is
    /// [`ObesityError::ArtifactUnavailable`] and nothing is created.
    pub fn open_existing(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(ObesityError::ArtifactUnavailable(dir));
        }
        Ok(ArtifactStore { dir })
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name a version is stored under.
    pub fn path_for(&self, id: u64) -> PathBuf {
        self.dir.join(format!("{PREFIX}{id:06}{SUFFIX}"))
    }

    /// Stored version ids, ascending.
    pub fn versions(&self) -> Result<Vec<u64>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(id) = name
                .strip_prefix(PREFIX)
                .and_then(|s| s.strip_suffix(SUFFIX))
                .and_then(|s| s.parse::<u64>().ok())
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Version `CURRENT` points at, if any.
    pub fn current(&self) -> Result<Option<u64>> {
        let text = match fs::read_to_string(self.dir.join(CURRENT)) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        text.trim().parse::<u64>().map(Some).map_err(|_| {
            ObesityError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("corrupt {CURRENT} pointer: {text:?}"),
            ))
        })
    }

    /// Path of the artifact serving should load.
    pub fn current_path(&self) -> Result<PathBuf> {
        match self.current()? {
            Some(id) => Ok(self.path_for(id)),
            None => Err(ObesityError::ArtifactUnavailable(self.dir.join(CURRENT))),
        }
    }

    /// Stores `pipeline` under a fresh id and makes it current.
    pub fn publish(&self, pipeline: &mut ObesityPipeline) -> Result<u64> {
        let id = self.versions()?.last().copied().unwrap_or(0) + 1;
        pipeline.meta_mut().artifact_id = id;
        save_artifact(pipeline, &self.path_for(id))?;
        self.pin(id)?;
        info!("published artifact v{id}");
        Ok(id)
    }

    /// Points `CURRENT` at an existing version.
    pub fn pin(&self, id: u64) -> Result<()> {
        if !self.path_for(id).is_file() {
            return Err(ObesityError::InvalidInput(format!(
                "no artifact version {id} in {:?}",
                self.dir
            )));
        }
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        writeln!(tmp, "{id}")?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.dir.join(CURRENT))
            .map_err(|e| ObesityError::Io(e.error))?;
        Ok(())
    }

    /// Moves `CURRENT` to the newest version older than the current one.
    pub fn rollback(&self) -> Result<u64> {
        let current = self
            .current()?
            .ok_or_else(|| ObesityError::ArtifactUnavailable(self.dir.join(CURRENT)))?;
        let previous = self
            .versions()?
            .into_iter()
            .filter(|&id| id < current)
            .next_back()
            .ok_or_else(|| {
                ObesityError::InvalidInput(format!("no version older than v{current}"))
            })?;
        self.pin(previous)?;
        info!("rolled back from v{current} to v{previous}");
        Ok(previous)
    }

    /// Loads the artifact `CURRENT` points at.
    pub fn load_current(&self) -> Result<ObesityPipeline> {
        load_artifact(&self.current_path()?)
    }

    /// Loads one stored version.
    pub fn load_version(&self, id: u64) -> Result<ObesityPipeline> {
        load_artifact(&self.path_for(id))
    }
}
