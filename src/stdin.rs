use std::{
    fs::File,
    io::{self, ErrorKind, Read},
    os::fd::AsFd,
};

use smithay_client_toolkit::reexports::calloop::{Interest, Mode, generic::Generic};

/// Partial lines longer than this are discarded.
const MAX_LINE_LEN: usize = 64 * 1024;

const READ_CHUNK: usize = 4096;

/// Accumulates bytes and keeps only the newest complete line.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    /// Set after an oversized line was dropped; bytes are skipped up to its newline.
    discarding: bool,
}

impl LineBuffer {
    /// Appends `bytes`. Returns the last line they completed, if any.
    pub fn push(&mut self, mut bytes: &[u8]) -> Option<String> {
        if self.discarding {
            let end = bytes.iter().position(|&b| b == b'\n')?;
            self.discarding = false;
            bytes = &bytes[end + 1..];
        }
        self.pending.extend_from_slice(bytes);

        let line = self.pending.iter().rposition(|&b| b == b'\n').map(|end| {
            let complete: Vec<u8> = self.pending.drain(..=end).collect();
            let complete = &complete[..end];
            let line = match complete.iter().rposition(|&b| b == b'\n') {
                Some(prev) => &complete[prev + 1..],
                None => complete,
            };
            String::from_utf8_lossy(line).trim_end_matches('\r').to_string()
        });

        if self.pending.len() > MAX_LINE_LEN {
            log::warn!("stdin line exceeds {MAX_LINE_LEN} bytes, discarding");
            self.pending.clear();
            self.discarding = true;
        }

        line
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum StdinEvent {
    Line(String),
    Partial,
    Closed,
}

/// Performs one read and feeds it to `lines`.
pub fn read_once(reader: &mut impl Read, lines: &mut LineBuffer) -> io::Result<StdinEvent> {
    let mut chunk = [0; READ_CHUNK];
    let read = match reader.read(&mut chunk) {
        Ok(0) => return Ok(StdinEvent::Closed),
        Ok(read) => read,
        Err(err) if matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {
            return Ok(StdinEvent::Partial);
        }
        Err(err) => return Err(err),
    };

    Ok(match lines.push(&chunk[..read]) {
        Some(line) => StdinEvent::Line(line),
        None => StdinEvent::Partial,
    })
}

/// Level-triggered event source over a duplicate of the process's standard input.
pub fn source() -> io::Result<Generic<File>> {
    let fd = io::stdin().as_fd().try_clone_to_owned()?;
    Ok(Generic::new(File::from(fd), Interest::READ, Mode::Level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_lines_wait_for_newline() {
        let mut lines = LineBuffer::default();
        assert_eq!(lines.push(b"12:00"), None);
        assert_eq!(lines.push(b" PM\n").as_deref(), Some("12:00 PM"));
    }

    #[test]
    fn only_the_latest_complete_line_is_kept() {
        let mut lines = LineBuffer::default();
        assert_eq!(lines.push(b"one\ntwo\nthr").as_deref(), Some("two"));
        assert_eq!(lines.push(b"ee\n").as_deref(), Some("three"));
    }

    #[test]
    fn separators_survive() {
        let mut lines = LineBuffer::default();
        assert_eq!(
            lines.push(b"a\x1fb\x1fc\n").as_deref(),
            Some("a\x1fb\x1fc")
        );
    }

    #[test]
    fn eof_closes() {
        let mut lines = LineBuffer::default();
        let mut input: &[u8] = b"last\n";
        assert_eq!(
            read_once(&mut input, &mut lines).unwrap(),
            StdinEvent::Line("last".into())
        );
        assert_eq!(read_once(&mut input, &mut lines).unwrap(), StdinEvent::Closed);
    }

    #[test]
    fn oversized_line_is_dropped_up_to_its_newline() {
        let mut lines = LineBuffer::default();
        assert_eq!(lines.push(&vec![b'x'; MAX_LINE_LEN + 1]), None);
        assert_eq!(lines.push(&vec![b'x'; 100]), None);
        assert_eq!(lines.push(b"TAIL\n"), None);
        assert_eq!(lines.push(b"ok\n").as_deref(), Some("ok"));
    }

    #[test]
    fn line_completed_in_the_same_chunk_as_an_oversized_one_survives() {
        let mut lines = LineBuffer::default();
        let mut chunk = b"keep\n".to_vec();
        chunk.extend(vec![b'x'; MAX_LINE_LEN + 1]);
        assert_eq!(lines.push(&chunk).as_deref(), Some("keep"));
        assert_eq!(lines.push(b"TAIL\nnext\n").as_deref(), Some("next"));
    }

    #[test]
    fn oversized_input_read_in_chunks_never_leaks_its_tail() {
        let mut input = vec![b'x'; MAX_LINE_LEN + 8192];
        input.extend_from_slice(b"TAIL\nnext\n");
        let mut reader = input.as_slice();
        let mut lines = LineBuffer::default();

        let mut published = Vec::new();
        loop {
            match read_once(&mut reader, &mut lines).unwrap() {
                StdinEvent::Line(line) => published.push(line),
                StdinEvent::Partial => {}
                StdinEvent::Closed => break,
            }
        }
        assert_eq!(published, ["next"]);
    }
}
