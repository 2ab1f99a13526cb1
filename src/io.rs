use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::Serialize;

use crate::error::{IoError, PipelineResult};

/// Serializes `value` to pretty JSON and lands it in `path` via
/// `tmp file + rename within the same directory`, so a reader never
/// observes a partially written file and a crash mid-write leaves the
/// previous version (if any) intact.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> PipelineResult<()> {
    let dir = path.parent().ok_or_else(|| {
        IoError::FileSystem(format!("path '{}' has no parent directory", path.display()))
    })?;
    fs::create_dir_all(dir).map_err(IoError::Io)?;

    let tmp_path = tmp_path_for(path);
    {
        let mut tmp_file = File::create(&tmp_path).map_err(|e| {
            IoError::WriterCreation(format!("{}: {e}", tmp_path.display()))
        })?;
        let bytes = serde_json::to_vec_pretty(value).map_err(IoError::Json)?;
        tmp_file.write_all(&bytes).map_err(IoError::Io)?;
        tmp_file.sync_all().map_err(IoError::Io)?;
    }

    fs::rename(&tmp_path, path)
        .map_err(|e| IoError::AtomicRename(format!("{} -> {}: {e}", tmp_path.display(), path.display())))?;
    Ok(())
}

/// Reads and deserializes a JSON artifact. Missing files are a plain `Ok(None)`,
/// never an error — callers decide whether absence is meaningful.
pub fn read_json_if_exists<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> PipelineResult<Option<T>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(IoError::Json)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(IoError::Io(e).into()),
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{file_name}.tmp"))
}

/// Deep-merges `incoming` into `base`: object keys in `incoming` win at
/// leaves, nested objects are merged recursively, arrays are replaced
/// wholesale. Used to layer `extra.intel_snapshot` onto a metadata
/// document the agent already wrote.
pub fn deep_merge_json(base: &mut serde_json::Value, incoming: serde_json::Value) {
    use serde_json::Value;
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            for (key, incoming_val) in incoming_map {
                match base_map.get_mut(&key) {
                    Some(base_val) => deep_merge_json(base_val, incoming_val),
                    None => {
                        base_map.insert(key, incoming_val);
                    }
                }
            }
        }
        (base_slot, incoming_val) => {
            *base_slot = incoming_val;
        }
    }
}

/// Appends one line-delimited JSON record to a log file, holding a
/// process-local lock for the duration of the write so concurrent
/// writers never interleave partial lines. A crash mid-line leaves the
/// file parseable up to the last complete line because writes are
/// single `write_all` calls terminated by a newline.
pub struct AppendLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AppendLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn append<T: Serialize>(&self, record: &T) -> PipelineResult<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| IoError::LogLock(e.to_string()))?;

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(IoError::Io)?;
        }

        let mut line = serde_json::to_vec(record).map_err(IoError::Json)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| IoError::WriterCreation(format!("{}: {e}", self.path.display())))?;
        file.write_all(&line).map_err(IoError::Io)?;
        Ok(())
    }

    /// Reads all well-formed lines, skipping malformed ones rather than
    /// aborting — the trigger log and the append-only episode log both
    /// need this tolerance (see `scheduler::trigger`).
    pub fn read_lines<T: serde::de::DeserializeOwned>(&self) -> PipelineResult<Vec<T>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(IoError::Io(e).into()),
        };

        Ok(contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect())
    }

    /// Truncates the log file to empty. Used by the scheduler at tick
    /// boundaries once triggers have been drained.
    pub fn truncate(&self) -> PipelineResult<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| IoError::LogLock(e.to_string()))?;
        File::create(&self.path).map_err(IoError::Io)?;
        Ok(())
    }
}
