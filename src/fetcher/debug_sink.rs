use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

/// Optional diagnostic tap on raw fetch bodies. Never part of the fetch
/// result.
pub trait DebugSink: Send + Sync {
    fn record(&self, fetcher: &str, body: &[u8]);
}

/// Writes each body to `<dir>/<unix-seconds>-<fetcher>.txt`.
#[derive(Debug, Clone)]
pub struct DirectoryDebugSink {
    dir: PathBuf,
}

impl DirectoryDebugSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, fetcher: &str) -> PathBuf {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        let name: String = fetcher
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{secs}-{name}.txt"))
    }
}

impl DebugSink for DirectoryDebugSink {
    fn record(&self, fetcher: &str, body: &[u8]) {
        let path = self.path_for(fetcher);
        match fs::create_dir_all(&self.dir).and_then(|()| fs::write(&path, body)) {
            Ok(()) => debug!(fetcher, path = %path.display(), "wrote debug body"),
            Err(err) => warn!(fetcher, path = %path.display(), "failed to write debug body: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_body_named_after_fetcher() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = DirectoryDebugSink::new(tmp.path().join("debug"));
        sink.record("weather/forecast", b"{\"ok\":true}");

        let entries: Vec<_> = fs::read_dir(sink.dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("-weather_forecast.txt"), "{name}");
        assert_eq!(fs::read(&entries[0]).unwrap(), b"{\"ok\":true}");
    }

    #[test]
    fn unwritable_directory_is_only_logged() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        DirectoryDebugSink::new(blocker.join("nested")).record("transit", b"body");
    }
}
