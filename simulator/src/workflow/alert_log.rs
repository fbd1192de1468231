use anyhow::Context;
use breathcore::pipeline::AlertSink;
use breathcore::processing::Alert;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Append-only JSON-lines alert file, one object per alert.
pub struct FileAlertLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileAlertLog {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating alert log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening alert log {}", path.display()))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AlertSink for FileAlertLog {
    fn append(&self, alert: &Alert) {
        log::warn!("[alert] {} {}", alert.timestamp, alert.message);
        let line = match alert.to_json_line() {
            Ok(line) => line,
            Err(err) => {
                log::error!("encoding alert: {}", err);
                return;
            }
        };
        let Ok(mut file) = self.file.lock() else {
            log::error!("alert log {} lock poisoned", self.path.display());
            return;
        };
        if let Err(err) = file.write_all(line.as_bytes()).and_then(|_| file.flush()) {
            log::error!("writing alert log {}: {}", self.path.display(), err);
        }
    }
}
