use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Append-only JSON-lines log, one record per line
pub struct WriteAheadLog {
    file: Mutex<BufWriter<File>>,
    raw_file: Mutex<File>, // for fsync
    path: PathBuf,
}

impl WriteAheadLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        let raw_file = file.try_clone()?;

        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            raw_file: Mutex::new(raw_file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `record` as one line and flush it.
    pub fn append<T: Serialize>(&self, record: &T) -> Result<()> {
        let line = serde_json::to_vec(record).context("encoding log record")?;
        let mut writer = self.file.lock();
        writer.write_all(&line)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Flush and fdatasync.
    pub fn sync(&self) -> Result<()> {
        self.file.lock().flush()?;
        self.raw_file.lock().sync_data()?;
        Ok(())
    }

    /// Read every record back in append order.
    ///
    /// A torn final line (crash mid-append) is dropped with a warning; a bad
    /// line anywhere else is an error.
    pub fn replay<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<Vec<T>> {
        Ok(scan(path.as_ref())?.records)
    }

    /// Replay `path`, cut off a torn tail, then open it for appending.
    ///
    /// New records always start on a fresh line after the last good one.
    pub fn recover<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<(Self, Vec<T>)> {
        let path = path.as_ref();
        let scanned = scan(path)?;

        if path.exists() {
            let len = std::fs::metadata(path)?.len();
            if scanned.valid_len < len {
                warn!(
                    path = %path.display(),
                    from = len,
                    to = scanned.valid_len,
                    "truncating torn tail"
                );
                OpenOptions::new()
                    .write(true)
                    .open(path)?
                    .set_len(scanned.valid_len)?;
            }
        }

        let wal = Self::new(path)?;
        if scanned.missing_newline {
            let mut writer = wal.file.lock();
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        Ok((wal, scanned.records))
    }
}

struct Scan<T> {
    records: Vec<T>,
    /// Byte length of the file up to the end of the last good line
    valid_len: u64,
    /// Last good line was written without its newline
    missing_newline: bool,
}

fn scan<T: DeserializeOwned>(path: &Path) -> Result<Scan<T>> {
    let mut scanned = Scan {
        records: Vec::new(),
        valid_len: 0,
        missing_newline: false,
    };
    if !path.exists() {
        return Ok(scanned);
    }

    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut offset = 0;
    let mut line_no = 0;
    while offset < data.len() {
        line_no += 1;
        let newline = data[offset..].iter().position(|&b| b == b'\n');
        let (line, next) = match newline {
            Some(pos) => (&data[offset..offset + pos], offset + pos + 1),
            None => (&data[offset..], data.len()),
        };

        if !line.iter().all(u8::is_ascii_whitespace) {
            match serde_json::from_slice(line) {
                Ok(record) => scanned.records.push(record),
                Err(e) if data[next..].iter().all(u8::is_ascii_whitespace) => {
                    warn!(path = %path.display(), line = line_no, error = %e, "dropping torn tail record");
                    break;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("{}:{}", path.display(), line_no));
                }
            }
        }
        scanned.valid_len = next as u64;
        scanned.missing_newline = newline.is_none();
        offset = next;
    }
    Ok(scanned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        n: u32,
    }

    #[test]
    fn test_append_and_replay() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        {
            let wal = WriteAheadLog::new(&path).unwrap();
            wal.append(&Entry { n: 1 }).unwrap();
            wal.append(&Entry { n: 2 }).unwrap();
            wal.sync().unwrap();
        }
        let wal = WriteAheadLog::new(&path).unwrap();
        wal.append(&Entry { n: 3 }).unwrap();

        let entries: Vec<Entry> = WriteAheadLog::replay(&path).unwrap();
        assert_eq!(entries, vec![Entry { n: 1 }, Entry { n: 2 }, Entry { n: 3 }]);
    }

    #[test]
    fn test_replay_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let entries: Vec<Entry> = WriteAheadLog::replay(dir.path().join("none.jsonl")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_torn_tail_dropped_but_corrupt_middle_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");

        std::fs::write(&path, "{\"n\":1}\n{\"n\":2}\n{\"n\":").unwrap();
        let entries: Vec<Entry> = WriteAheadLog::replay(&path).unwrap();
        assert_eq!(entries.len(), 2);

        std::fs::write(&path, "{\"n\":1}\ngarbage\n{\"n\":3}\n").unwrap();
        assert!(WriteAheadLog::replay::<Entry, _>(&path).is_err());
    }

    #[test]
    fn test_recover_truncates_torn_tail_before_appending() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        std::fs::write(&path, "{\"n\":1}\n{\"n\":").unwrap();

        let (wal, entries) = WriteAheadLog::recover::<Entry, _>(&path).unwrap();
        assert_eq!(entries, vec![Entry { n: 1 }]);
        wal.append(&Entry { n: 2 }).unwrap();
        wal.append(&Entry { n: 3 }).unwrap();
        drop(wal);

        let (_, entries) = WriteAheadLog::recover::<Entry, _>(&path).unwrap();
        assert_eq!(entries, vec![Entry { n: 1 }, Entry { n: 2 }, Entry { n: 3 }]);
    }

    #[test]
    fn test_recover_terminates_unfinished_last_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        std::fs::write(&path, "{\"n\":1}\n{\"n\":2}").unwrap();

        let (wal, entries) = WriteAheadLog::recover::<Entry, _>(&path).unwrap();
        assert_eq!(entries.len(), 2);
        wal.append(&Entry { n: 3 }).unwrap();
        drop(wal);

        let entries: Vec<Entry> = WriteAheadLog::replay(&path).unwrap();
        assert_eq!(entries, vec![Entry { n: 1 }, Entry { n: 2 }, Entry { n: 3 }]);
    }
}
