//! Output sinks: shared JSON array writer and line writer, both with
//! atomic tmp→rename.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Write buffer per sink (1MB)
const WRITE_BUF_SIZE: usize = 1024 * 1024;

fn tmp_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    final_path.with_file_name(name)
}

fn create_tmp(final_path: &Path) -> io::Result<(BufWriter<File>, PathBuf)> {
    if let Some(parent) = final_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = tmp_path_for(final_path);
    // Stale tmp from an interrupted run
    if tmp_path.exists() {
        fs::remove_file(&tmp_path)?;
    }
    let file = File::create(&tmp_path)?;
    Ok((BufWriter::with_capacity(WRITE_BUF_SIZE, file), tmp_path))
}

fn poisoned() -> io::Error {
    io::Error::other("sink lock poisoned")
}

fn failed_earlier(tmp_path: &Path) -> io::Error {
    io::Error::other(format!(
        "earlier write failed, output left as {}",
        tmp_path.display()
    ))
}

struct ArrayState {
    writer: BufWriter<File>,
    first: bool,
}

/// JSON array document shared by many writer threads.
///
/// Elements are serialized outside the lock; only the separator, element
/// bytes and trailing newline are written under it, so concurrent appends
/// never interleave. Output looks like `[{..}\n,{..}\n]`.
pub struct JsonArraySink {
    state: Mutex<ArrayState>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    count: AtomicU64,
    failed: AtomicBool,
}

impl std::fmt::Debug for JsonArraySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonArraySink")
            .field("final_path", &self.final_path)
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}

impl JsonArraySink {
    /// Open `<path>.tmp` and write the array-open token.
    pub fn create(path: &Path) -> io::Result<Self> {
        let (mut writer, tmp_path) = create_tmp(path)?;
        writer.write_all(b"[")?;
        Ok(Self {
            state: Mutex::new(ArrayState {
                writer,
                first: true,
            }),
            tmp_path,
            final_path: path.to_path_buf(),
            count: AtomicU64::new(0),
            failed: AtomicBool::new(false),
        })
    }

    /// Append one element.
    pub fn append(&self, value: &serde_json::Value) -> io::Result<()> {
        let bytes = serde_json::to_vec(value).map_err(io::Error::other)?;
        self.append_raw(&bytes)
    }

    /// Append pre-serialized JSON bytes as one element.
    pub fn append_raw(&self, json: &[u8]) -> io::Result<()> {
        if self.failed.load(Ordering::Relaxed) {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "sink failed earlier",
            ));
        }
        let mut state = self.state.lock().map_err(|_| poisoned())?;
        let result = write_element(&mut state, json);
        if result.is_err() {
            self.failed.store(true, Ordering::Relaxed);
        } else {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Elements written so far
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> &Path {
        &self.final_path
    }

    /// Whether a write has failed; the document is then never published.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    /// Close the array, flush, and atomically rename tmp → final.
    ///
    /// Returns the element count. After a failed write the `.tmp` file is
    /// left in place and an error is returned.
    pub fn finish(self) -> io::Result<u64> {
        if self.has_failed() {
            return Err(failed_earlier(&self.tmp_path));
        }
        let count = self.count();
        let mut state = self.state.into_inner().map_err(|_| poisoned())?;
        state.writer.write_all(b"]")?;
        state.writer.flush()?;
        drop(state);
        fs::rename(&self.tmp_path, &self.final_path)?;
        Ok(count)
    }
}

fn write_element(state: &mut ArrayState, json: &[u8]) -> io::Result<()> {
    if !state.first {
        state.writer.write_all(b",")?;
    }
    state.writer.write_all(json)?;
    state.writer.write_all(b"\n")?;
    state.first = false;
    Ok(())
}

/// Line-oriented text file: header block, then records.
///
/// A group of lines is written under one lock acquisition so groups from
/// different producers stay contiguous.
pub struct LineSink {
    writer: Mutex<BufWriter<File>>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    lines: AtomicU64,
    failed: AtomicBool,
}

impl std::fmt::Debug for LineSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineSink")
            .field("final_path", &self.final_path)
            .field("lines", &self.lines())
            .finish_non_exhaustive()
    }
}

impl LineSink {
    /// Open `<path>.tmp` and write `header` verbatim.
    pub fn create(path: &Path, header: &str) -> io::Result<Self> {
        let (mut writer, tmp_path) = create_tmp(path)?;
        writer.write_all(header.as_bytes())?;
        Ok(Self {
            writer: Mutex::new(writer),
            tmp_path,
            final_path: path.to_path_buf(),
            lines: AtomicU64::new(0),
            failed: AtomicBool::new(false),
        })
    }

    /// Write each line followed by `\n`.
    pub fn write_group<S: AsRef<str>>(&self, lines: &[S]) -> io::Result<()> {
        if lines.is_empty() {
            return Ok(());
        }
        if self.has_failed() {
            return Err(failed_earlier(&self.tmp_path));
        }
        let mut w = self.writer.lock().map_err(|_| poisoned())?;
        let result = lines.iter().try_for_each(|line| {
            w.write_all(line.as_ref().as_bytes())?;
            w.write_all(b"\n")
        });
        if result.is_ok() {
            self.lines.fetch_add(lines.len() as u64, Ordering::Relaxed);
        } else {
            self.failed.store(true, Ordering::Relaxed);
        }
        result
    }

    /// Whether a write has failed; the file is then never published.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    /// Record lines written (header excluded)
    pub fn lines(&self) -> u64 {
        self.lines.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> &Path {
        &self.final_path
    }

    /// Flush and atomically rename tmp → final. Returns the record count.
    ///
    /// After a failed write the `.tmp` file is left in place.
    pub fn finish(self) -> io::Result<u64> {
        if self.has_failed() {
            return Err(failed_earlier(&self.tmp_path));
        }
        let lines = self.lines();
        let mut w = self.writer.into_inner().map_err(|_| poisoned())?;
        w.flush()?;
        drop(w);
        fs::rename(&self.tmp_path, &self.final_path)?;
        Ok(lines)
    }
}

/// Remove stale .tmp files in the output directory
pub fn cleanup_tmp_files(output_dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(output_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "tmp") {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn empty_array_is_valid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        let sink = JsonArraySink::create(&path).unwrap();
        assert_eq!(sink.finish().unwrap(), 0);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "[]");
        assert!(!dir.path().join("out.json.tmp").exists());
    }

    #[test]
    fn elements_are_newline_separated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        let sink = JsonArraySink::create(&path).unwrap();
        sink.append(&serde_json::json!({"id": "1"})).unwrap();
        sink.append(&serde_json::json!({"id": "2"})).unwrap();
        assert_eq!(sink.finish().unwrap(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "[{\"id\":\"1\"}\n,{\"id\":\"2\"}\n]");
    }

    #[test]
    fn tmp_file_until_finish() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        let sink = JsonArraySink::create(&path).unwrap();
        assert!(dir.path().join("out.json.tmp").exists());
        assert!(!path.exists());
        sink.finish().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn creates_missing_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/out.json");
        JsonArraySink::create(&path).unwrap().finish().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn concurrent_appends_stay_well_formed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        let sink = Arc::new(JsonArraySink::create(&path).unwrap());

        std::thread::scope(|s| {
            for t in 0..8 {
                let sink = sink.clone();
                s.spawn(move || {
                    for i in 0..250 {
                        let v = serde_json::json!({"thread": t, "i": i, "pad": "x".repeat(i % 50)});
                        sink.append(&v).unwrap();
                    }
                });
            }
        });

        let sink = Arc::into_inner(sink).unwrap();
        assert_eq!(sink.finish().unwrap(), 2000);

        let parsed: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.len(), 2000);
    }

    #[test]
    fn line_sink_writes_header_and_groups() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("beacon.txt");
        let sink = LineSink::create(&path, "#FORMAT: BEACON\n").unwrap();
        sink.write_group(&["a||b", "c||b"]).unwrap();
        sink.write_group::<&str>(&[]).unwrap();
        sink.write_group(&[String::from("d||e")]).unwrap();
        assert_eq!(sink.finish().unwrap(), 3);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "#FORMAT: BEACON\na||b\nc||b\nd||e\n");
    }

    #[test]
    fn failed_array_is_not_published() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        let sink = JsonArraySink::create(&path).unwrap();
        sink.append(&serde_json::json!({"id": "1"})).unwrap();
        sink.failed.store(true, Ordering::Relaxed);

        assert!(sink.append(&serde_json::json!({"id": "2"})).is_err());
        assert_eq!(sink.count(), 1);
        assert!(sink.finish().is_err());
        assert!(!path.exists());
        assert!(dir.path().join("out.json.tmp").exists());
    }

    #[test]
    fn failed_line_sink_is_not_published() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("beacon.txt");
        let sink = LineSink::create(&path, "#FORMAT: BEACON\n").unwrap();
        sink.write_group(&["a||b"]).unwrap();
        sink.failed.store(true, Ordering::Relaxed);

        assert!(sink.write_group(&["c||d"]).is_err());
        assert_eq!(sink.lines(), 1);
        assert!(sink.finish().is_err());
        assert!(!path.exists());
        assert!(dir.path().join("beacon.txt.tmp").exists());
    }

    #[test]
    fn stale_tmp_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("beacon.txt");
        std::fs::write(dir.path().join("beacon.txt.tmp"), "junk").unwrap();

        let sink = LineSink::create(&path, "").unwrap();
        sink.finish().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn cleanup_tmp_files_removes_only_tmp() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.tmp"), b"stale").unwrap();
        std::fs::write(dir.path().join("b.json"), b"keep").unwrap();
        std::fs::write(dir.path().join("c.tmp"), b"stale2").unwrap();

        cleanup_tmp_files(dir.path()).unwrap();

        assert!(!dir.path().join("a.tmp").exists());
        assert!(dir.path().join("b.json").exists());
        assert!(!dir.path().join("c.tmp").exists());
    }
}
