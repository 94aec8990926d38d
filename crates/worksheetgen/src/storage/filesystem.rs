//! Per-job local workspace: `{work_directory}/{job_id}/`.

use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::render::{Artifact, MaterializedImage};

const IMAGES_DIR: &str = "images";

/// Writes generated images and rendered artifacts under the work directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    work_directory: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(work_directory: P) -> Self {
        Self {
            work_directory: work_directory.as_ref().to_path_buf(),
        }
    }

    pub fn work_directory(&self) -> &Path {
        &self.work_directory
    }

    /// The workspace directory of one job. Job ids must be a single path segment.
    pub fn job_dir(&self, job_id: &str) -> Result<PathBuf, StorageError> {
        let valid = !job_id.is_empty()
            && job_id != "."
            && job_id != ".."
            && job_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidName(job_id.to_string()));
        }
        Ok(self.work_directory.join(job_id))
    }

    pub fn images_dir(&self, job_id: &str) -> Result<PathBuf, StorageError> {
        Ok(self.job_dir(job_id)?.join(IMAGES_DIR))
    }

    /// Writes the `index`-th generated image (1-based) as `images/image_{index}.png`.
    pub fn write_image(
        &self,
        job_id: &str,
        index: usize,
        bytes: &[u8],
    ) -> Result<MaterializedImage, StorageError> {
        let dir = self.images_dir(job_id)?;
        self.ensure_directory(&dir)?;
        let path = dir.join(format!("image_{}.png", index));
        write_file(&path, bytes)?;
        Ok(MaterializedImage::new(path))
    }

    /// Writes an artifact under its canonical file name in the job directory.
    pub fn write_artifact(&self, job_id: &str, artifact: &Artifact) -> Result<PathBuf, StorageError> {
        let dir = self.job_dir(job_id)?;
        self.ensure_directory(&dir)?;
        let path = dir.join(artifact.kind.file_name());
        write_file(&path, &artifact.bytes)?;
        Ok(path)
    }

    /// Removes the job's images directory. Missing directories are fine.
    pub fn remove_images(&self, job_id: &str) -> Result<(), StorageError> {
        let dir = self.images_dir(job_id)?;
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Remove {
                path: dir,
                source: e,
            }),
        }
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}

/// Writes to a temporary sibling and renames it into place.
fn write_file(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).map_err(|e| StorageError::WriteFile {
        path: tmp.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| StorageError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}
