//! Log Follower
//!
//! Yields complete lines from a growing log file, like `tail -f`. Lines are
//! raw bytes; text validation belongs to the decoder.
//! Waits on filesystem notifications (with a poll timeout as fallback) when
//! it reaches the end of the file, and starts over when the file is
//! truncated or replaced.

use log::{debug, info, warn};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs::{self, File, Metadata};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone)]
pub struct FollowOptions {
    /// Read existing content instead of starting at the end
    pub from_start: bool,
    /// Keep waiting for new data at end of file
    pub follow: bool,
    /// Upper bound on how long to wait for a change notification
    pub poll_interval: Duration,
}

impl Default for FollowOptions {
    fn default() -> Self {
        Self {
            from_start: false,
            follow: true,
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Device and inode, used to spot a rotated file
type FileIdentity = Option<(u64, u64)>;

#[cfg(unix)]
fn file_identity(meta: &Metadata) -> FileIdentity {
    use std::os::unix::fs::MetadataExt;
    Some((meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn file_identity(_meta: &Metadata) -> FileIdentity {
    None
}

struct ChangeWatch {
    // Dropping the watcher stops notifications
    _watcher: RecommendedWatcher,
    events: Receiver<notify::Result<Event>>,
}

impl ChangeWatch {
    fn new(path: &Path) -> notify::Result<Self> {
        let (tx, events) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(tx)?;

        // Watch the directory so a replaced file is noticed too
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            events,
        })
    }
}

pub struct LogFollower {
    path: PathBuf,
    reader: BufReader<File>,
    /// Bytes consumed from the current file
    offset: u64,
    identity: FileIdentity,
    /// Bytes of a line whose newline has not arrived yet
    pending: Vec<u8>,
    options: FollowOptions,
    stop: Arc<AtomicBool>,
    watch: Option<ChangeWatch>,
    finished: bool,
}

impl LogFollower {
    pub fn open(
        path: impl AsRef<Path>,
        options: FollowOptions,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source: io::Error| SourceError::Open {
            path: path.clone(),
            source,
        };

        let mut file = File::open(&path).map_err(open_err)?;
        let identity = file_identity(&file.metadata().map_err(open_err)?);
        let offset = if options.from_start {
            0
        } else {
            file.seek(SeekFrom::End(0)).map_err(open_err)?
        };

        let watch = if options.follow {
            match ChangeWatch::new(&path) {
                Ok(w) => Some(w),
                Err(e) => {
                    warn!("File notifications unavailable ({}), polling every {:?}", e, options.poll_interval);
                    None
                }
            }
        } else {
            None
        };

        info!(
            "Reading {} from {} ({})",
            path.display(),
            if options.from_start { "start" } else { "end" },
            if options.follow { "following" } else { "one pass" }
        );

        Ok(Self {
            path,
            reader: BufReader::new(file),
            offset,
            identity,
            pending: Vec::new(),
            options,
            stop,
            watch,
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_err(&self, source: io::Error) -> SourceError {
        SourceError::Read {
            path: self.path.clone(),
            source,
        }
    }

    fn next_line(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        loop {
            if self.stop.load(Ordering::Relaxed) {
                debug!("Stop requested, ending stream");
                return Ok(None);
            }

            let n = match self.reader.read_until(b'\n', &mut self.pending) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.read_err(e)),
            };

            if n > 0 {
                self.offset += n as u64;
                if self.pending.last() == Some(&b'\n') {
                    return Ok(Some(self.take_pending()));
                }
                // Partial line; the next read reports EOF
                continue;
            }

            if !self.options.follow {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_pending()));
            }

            if !self.check_replaced()? {
                self.wait_for_change();
            }
        }
    }

    fn take_pending(&mut self) -> Vec<u8> {
        let mut bytes = std::mem::take(&mut self.pending);
        if bytes.last() == Some(&b'\n') {
            bytes.pop();
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
        }
        bytes
    }

    /// Returns true when reading restarted on a truncated or new file
    fn check_replaced(&mut self) -> Result<bool, SourceError> {
        let meta = match fs::metadata(&self.path) {
            Ok(meta) => meta,
            // Mid-rotation; wait for the new file to appear
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(self.read_err(e)),
        };

        let identity = file_identity(&meta);
        if identity != self.identity {
            info!("{} was replaced, reopening", self.path.display());
            let file = File::open(&self.path).map_err(|e| self.read_err(e))?;
            self.reader = BufReader::new(file);
            self.identity = identity;
        } else if meta.len() < self.offset {
            warn!(
                "{} truncated ({} < {} bytes), reading from start",
                self.path.display(),
                meta.len(),
                self.offset
            );
            self.reader
                .seek(SeekFrom::Start(0))
                .map_err(|e| self.read_err(e))?;
        } else {
            return Ok(false);
        }

        if !self.pending.is_empty() {
            warn!("Discarding {} bytes of an unterminated line", self.pending.len());
            self.pending.clear();
        }
        self.offset = 0;
        Ok(true)
    }

    fn wait_for_change(&mut self) {
        let poll = self.options.poll_interval;
        let outcome = match &self.watch {
            Some(watch) => watch.events.recv_timeout(poll),
            None => {
                std::thread::sleep(poll);
                return;
            }
        };

        match outcome {
            Ok(Ok(event)) => debug!("File event: {:?}", event.kind),
            Ok(Err(e)) => warn!("File watch error: {}", e),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                warn!("File watcher stopped, falling back to polling");
                self.watch = None;
                return;
            }
        }

        // Collapse a burst of events into one wake-up
        if let Some(watch) = &self.watch {
            while watch.events.try_recv().is_ok() {}
        }
    }
}

impl Iterator for LogFollower {
    type Item = Result<Vec<u8>, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
