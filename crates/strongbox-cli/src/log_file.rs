//! Size-rotated log file behind `logging.file`
//!
//! When the file would grow past `logging.max_size_mb` it is renamed to
//! `<file>.1`, older copies shift up by one, and anything past
//! `logging.max_files` is dropped.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use strongbox_core::config::LoggingConfig;

const BYTES_PER_MB: u64 = 1024 * 1024;

pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    max_files: u32,
    file: File,
    written: u64,
}

impl RotatingFile {
    pub fn from_config(logging: &LoggingConfig) -> io::Result<Self> {
        Self::open(
            &logging.file,
            logging.max_size_mb.saturating_mul(BYTES_PER_MB),
            logging.max_files,
        )
    }

    /// Opens `path` for appending, creating its directory if needed
    pub fn open(path: &Path, max_bytes: u64, max_files: u32) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            max_bytes,
            max_files,
            file,
            written,
        })
    }

    fn rotated(&self, n: u32) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{n}"));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.max_files == 0 {
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?;
            self.written = 0;
            return Ok(());
        }

        for n in (1..self.max_files).rev() {
            let from = self.rotated(n);
            if from.exists() {
                fs::rename(&from, self.rotated(n + 1))?;
            }
        }
        fs::rename(&self.path, self.rotated(1))?;
        self.file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("strongbox.log");

        let mut log = RotatingFile::open(&path, 1024, 3).unwrap();
        log.write_all(b"first\n").unwrap();
        drop(log);
        let mut log = RotatingFile::open(&path, 1024, 3).unwrap();
        log.write_all(b"second\n").unwrap();

        assert_eq!(lines(&path), ["first", "second"]);
    }

    #[test]
    fn test_rotates_at_size_and_keeps_max_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strongbox.log");

        let mut log = RotatingFile::open(&path, 8, 2).unwrap();
        for line in ["one\n", "two\n", "three\n", "four\n", "five\n"] {
            log.write_all(line.as_bytes()).unwrap();
        }
        log.flush().unwrap();

        assert_eq!(lines(&path), ["five"]);
        assert_eq!(lines(&dir.path().join("strongbox.log.1")), ["four"]);
        assert_eq!(lines(&dir.path().join("strongbox.log.2")), ["three"]);
        assert!(!dir.path().join("strongbox.log.3").exists());
    }

    #[test]
    fn test_from_config_uses_logging_section() {
        let dir = tempfile::tempdir().unwrap();
        let logging = LoggingConfig {
            file: dir.path().join("strongbox.log"),
            max_size_mb: 1,
            max_files: 2,
            ..LoggingConfig::default()
        };

        let log = RotatingFile::from_config(&logging).unwrap();
        assert_eq!(log.max_bytes, BYTES_PER_MB);
        assert_eq!(log.max_files, 2);
        assert!(logging.file.exists());
    }
}
