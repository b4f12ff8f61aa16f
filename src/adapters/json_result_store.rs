//! Result store writing one `{id}.json` document per backtest.

use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::CandlescopeError;
use crate::ports::result_store::ResultStore;

pub struct JsonResultStore {
    dir: PathBuf,
}

impl JsonResultStore {
    /// Creates `dir` if it does not exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CandlescopeError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| storage(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

fn storage(path: &Path, err: impl std::fmt::Display) -> CandlescopeError {
    CandlescopeError::Storage {
        reason: format!("{}: {}", path.display(), err),
    }
}

impl ResultStore for JsonResultStore {
    fn save(&self, result: &BacktestResult) -> Result<(), CandlescopeError> {
        let path = self.path_for(result.id);
        let json = serde_json::to_string_pretty(result)?;
        // write then rename so readers never see a half-written document
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| storage(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| storage(&path, e))
    }

    fn load(&self, id: Uuid) -> Result<Option<BacktestResult>, CandlescopeError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|e| storage(&path, e))?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

/// Keeps the latest saved result in one file, whatever its id.
pub struct JsonResultFile {
    path: PathBuf,
}

impl JsonResultFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResultStore for JsonResultFile {
    fn save(&self, result: &BacktestResult) -> Result<(), CandlescopeError> {
        let json = serde_json::to_string_pretty(result)?;
        fs::write(&self.path, json).map_err(|e| storage(&self.path, e))
    }

    fn load(&self, id: Uuid) -> Result<Option<BacktestResult>, CandlescopeError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path).map_err(|e| storage(&self.path, e))?;
        let result: BacktestResult = serde_json::from_str(&content)?;
        Ok((result.id == id).then_some(result))
    }
}
