// document-toolkit/src/output.rs

use crate::error::{DocumentError, Result};
use crate::models::ToolResponse;
use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, instrument};

pub const RESPONSE_FILE: &str = "response.json";

/// Writes response artifacts into an output directory.
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Each write goes to a temp file in the same directory and is then
    /// renamed into place, so readers never see a partial artifact.
    fn persist(&self, file_name: &str, data: &[u8]) -> Result<PathBuf> {
        let name = Path::new(file_name)
            .file_name()
            .filter(|name| *name == file_name)
            .ok_or_else(|| DocumentError::InvalidData(format!("unsafe file name '{}'", file_name)))?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(data)?;
        tmp.flush()?;

        let path = self.dir.join(name);
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(path)
    }

    /// Writes every artifact plus `response.json` (without inline content).
    #[instrument(skip(self, response), fields(request_id = %response.request_id, dir = %self.dir.display()))]
    pub fn write_response(&self, response: &ToolResponse) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(response.artifacts.len() + 1);
        let mut summary = response.clone();

        for artifact in &mut summary.artifacts {
            let data = general_purpose::STANDARD.decode(&artifact.content_base64)?;

            let checksum = hex::encode(Sha256::digest(&data));
            if checksum != artifact.sha256 {
                return Err(DocumentError::InvalidData(format!(
                    "checksum mismatch for {}",
                    artifact.filename
                )));
            }

            let path = self.persist(&artifact.filename, &data)?;
            info!(
                path = %path.display(),
                size_bytes = data.len(),
                sha256 = %checksum,
                "Wrote artifact"
            );
            written.push(path);
            artifact.content_base64.clear();
        }

        let json = serde_json::to_vec_pretty(&summary)?;
        written.push(self.persist(RESPONSE_FILE, &json)?);

        Ok(written)
    }
}
