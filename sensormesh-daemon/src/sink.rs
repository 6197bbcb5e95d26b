//! Local append-only, newline-delimited mirror of the shared log.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{io_err, sink_err, DaemonError};

const TAIL_CHUNK: usize = 4096;

/// Opened once at setup, written only by the consumer, closed once at shutdown.
#[derive(Debug)]
pub struct LocalSink {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: u64,
    last_line: Option<Vec<u8>>,
}

impl LocalSink {
    /// Open `path` in create-or-append mode (0644), creating parent directories.
    pub fn open(path: &Path) -> Result<Self, DaemonError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }

        let last_line = read_last_line(path).map_err(|e| io_err(path, e))?;

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        let file = options.open(path).map_err(|e| io_err(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            lines: 0,
            last_line,
        })
    }

    /// Write `payload` as one line, trailing line terminators stripped.
    pub fn write_entry(&mut self, payload: &[u8]) -> Result<(), DaemonError> {
        let line = trim_line_endings(payload);
        self.writer
            .write_all(line)
            .and_then(|()| self.writer.write_all(b"\n"))
            .and_then(|()| self.writer.flush())
            .map_err(|e| sink_err(&self.path, e))?;
        self.lines += 1;
        Ok(())
    }

    /// Last non-empty line the file held when it was opened, so a restarted
    /// consumer knows what it mirrored before.
    pub fn last_line(&self) -> Option<&[u8]> {
        self.last_line.as_deref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines written through this handle.
    pub fn lines_written(&self) -> u64 {
        self.lines
    }

    /// Flush and fsync, then release the handle.
    pub fn close(mut self) -> Result<(), DaemonError> {
        self.writer.flush().map_err(|e| sink_err(&self.path, e))?;
        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| sink_err(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), lines = self.lines, "local sink closed");
        Ok(())
    }
}

pub fn trim_line_endings(payload: &[u8]) -> &[u8] {
    let end = payload
        .iter()
        .rposition(|b| *b != b'\n' && *b != b'\r')
        .map_or(0, |i| i + 1);
    &payload[..end]
}

/// Scan backwards from the end of `path` for its last non-empty line.
fn read_last_line(path: &Path) -> io::Result<Option<Vec<u8>>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    let mut pos = file.metadata()?.len();
    let mut tail: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; TAIL_CHUNK];
    loop {
        let body = trim_line_endings(&tail);
        if let Some(newline) = body.iter().rposition(|b| *b == b'\n') {
            return Ok(Some(body[newline + 1..].to_vec()));
        }
        if pos == 0 {
            return Ok((!body.is_empty()).then(|| body.to_vec()));
        }

        let step = pos.min(TAIL_CHUNK as u64) as usize;
        pos -= step as u64;
        file.seek(SeekFrom::Start(pos))?;
        file.read_exact(&mut chunk[..step])?;
        tail.splice(0..0, chunk[..step].iter().copied());
    }
}
