use std::path::{Path, PathBuf};

use fs_err as fs;

use crate::{Error, Result};

pub const DEFAULT_STATE_FILE: &str = "/tmp/certbot_r01_record_id";

/// The scratch file carrying the challenge record id from the auth run to the cleanup run.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, record_id: u64) -> std::io::Result<()> {
        fs::write(&self.path, record_id.to_string())
    }

    pub fn load(&self) -> Result<u64> {
        let content = fs::read_to_string(&self.path).map_err(|err| self.error(err))?;
        content.trim().parse().map_err(|err| {
            self.error(format!("invalid record id {:?}: {err}", content.trim()))
        })
    }

    pub fn remove(&self) -> std::io::Result<()> {
        fs::remove_file(&self.path)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn error(&self, reason: impl ToString) -> Error {
        Error::State {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}
