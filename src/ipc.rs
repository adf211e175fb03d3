use std::{
    env,
    io::{self, BufRead, BufReader, Read, Write},
    os::unix::net::UnixStream,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// Longest reply accepted from the request socket.
pub const MAX_REPLY_LEN: usize = 16 * 1024;

/// Longest event line accepted from the event socket.
pub const MAX_EVENT_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("{0} is not set, is Hyprland running?")]
    MissingEnv(&'static str),
    #[error("failed to connect to {path}")]
    Connect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("reply to {0:?} exceeds {MAX_REPLY_LEN} bytes")]
    ReplyTooLong(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Locations of the Hyprland request and event sockets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyprSockets {
    pub request: PathBuf,
    pub events: PathBuf,
}

impl HyprSockets {
    pub fn new(runtime_dir: impl AsRef<Path>, signature: &str) -> Self {
        let dir = runtime_dir.as_ref().join("hypr").join(signature);
        Self {
            request: dir.join(".socket.sock"),
            events: dir.join(".socket2.sock"),
        }
    }

    pub fn from_env() -> Result<Self, IpcError> {
        let runtime_dir =
            env::var_os("XDG_RUNTIME_DIR").ok_or(IpcError::MissingEnv("XDG_RUNTIME_DIR"))?;
        let signature = env::var("HYPRLAND_INSTANCE_SIGNATURE")
            .map_err(|_| IpcError::MissingEnv("HYPRLAND_INSTANCE_SIGNATURE"))?;
        Ok(Self::new(runtime_dir, &signature))
    }

    /// Sends one command on a fresh request connection and reads the whole reply.
    pub fn request(&self, command: &str) -> Result<String, IpcError> {
        let mut stream = connect(&self.request)?;
        stream.write_all(command.as_bytes())?;
        stream.flush()?;

        let reply = read_capped(stream, MAX_REPLY_LEN)
            .ok_or_else(|| IpcError::ReplyTooLong(command.to_string()))??;
        log::trace!("{command} -> {reply:?}");
        Ok(reply)
    }

    pub fn events(&self) -> Result<UnixStream, IpcError> {
        connect(&self.events)
    }
}

fn connect(path: &Path) -> Result<UnixStream, IpcError> {
    UnixStream::connect(path).map_err(|source| IpcError::Connect {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads to EOF. `None` when the input is longer than `limit`.
fn read_capped(reader: impl Read, limit: usize) -> Option<io::Result<String>> {
    let mut buf = Vec::new();
    if let Err(err) = reader.take(limit as u64 + 1).read_to_end(&mut buf) {
        return Some(Err(err));
    }
    if buf.len() > limit {
        return None;
    }
    Some(Ok(String::from_utf8_lossy(&buf).into_owned()))
}

/// Splits the event stream into lines, skipping lines longer than [`MAX_EVENT_LEN`].
pub struct EventReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: Read> EventReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::with_capacity(MAX_EVENT_LEN),
        }
    }

    /// The next complete line without its terminator, or `None` at end of stream.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            self.buf.clear();
            let read = (&mut self.reader)
                .take(MAX_EVENT_LEN as u64 + 1)
                .read_until(b'\n', &mut self.buf)?;
            if read == 0 {
                return Ok(None);
            }

            if self.buf.last() != Some(&b'\n') && read > MAX_EVENT_LEN {
                self.skip_line()?;
                log::debug!("dropped event longer than {MAX_EVENT_LEN} bytes");
                continue;
            }

            let line = String::from_utf8_lossy(&self.buf);
            return Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()));
        }
    }

    fn skip_line(&mut self) -> io::Result<()> {
        loop {
            self.buf.clear();
            let read = (&mut self.reader)
                .take(MAX_EVENT_LEN as u64)
                .read_until(b'\n', &mut self.buf)?;
            if read == 0 || self.buf.last() == Some(&b'\n') {
                return Ok(());
            }
        }
    }
}
