//! Anonymous OS pipes.
//!
//! Both ends are created close-on-exec (non-inheritable). An end only
//! reaches a child when it is taken out of the pipe and handed to the
//! spawned command's stdio.

use std::io::{self, BufRead, BufReader, PipeReader, PipeWriter, Write};

use tokio::io::AsyncRead;

use crate::error::{Result, SupervisorError};
use crate::severity::strip_terminator;

/// Boxed async reader over a pipe's read end.
pub type AsyncPipeReader = Box<dyn AsyncRead + Send + Unpin>;

/// A unidirectional byte channel with a read end and a write end.
#[derive(Debug)]
pub struct Pipe {
    reader: Option<BufReader<PipeReader>>,
    writer: Option<PipeWriter>,
}

impl Pipe {
    /// Creates a pipe with both ends valid.
    ///
    /// # Errors
    /// Fails when the OS is out of descriptors or handles.
    pub fn create() -> Result<Self> {
        let (reader, writer) =
            io::pipe().map_err(|e| SupervisorError::pipe(format!("failed to create pipe: {e}")))?;
        Ok(Self {
            reader: Some(BufReader::new(reader)),
            writer: Some(writer),
        })
    }

    /// Returns true while at least one end is still owned by the pipe.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.reader.is_some() || self.writer.is_some()
    }

    /// Hands over the read end. Returns `None` if it was already taken or closed.
    pub fn take_reader(&mut self) -> Option<PipeReader> {
        self.reader.take().map(BufReader::into_inner)
    }

    /// Hands over the write end. Returns `None` if it was already taken or closed.
    pub fn take_writer(&mut self) -> Option<PipeWriter> {
        self.writer.take()
    }

    /// Blocks until a full line is available.
    ///
    /// Returns `Ok(None)` at end of stream, which happens once every copy of
    /// the write end is closed. A final line without a terminator is still
    /// returned.
    ///
    /// # Errors
    /// Fails if the read end is gone or the read itself fails.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| SupervisorError::pipe("read end is closed"))?;
        let mut buf = Vec::new();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(strip_terminator(&String::from_utf8_lossy(&buf)).to_string()))
    }

    /// Writes `text` followed by a newline.
    ///
    /// The write is blocking but says nothing about whether the peer read it.
    ///
    /// # Errors
    /// Fails if the write end is gone or the peer has closed its read end.
    pub fn write_line(&mut self, text: &str) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| SupervisorError::pipe("write end is closed"))?;
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Closes whatever ends are still owned. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.reader = None;
        self.writer = None;
    }
}

/// Converts a pipe read end into a tokio reader.
///
/// Must be called from inside a tokio runtime.
///
/// # Errors
/// Fails if the descriptor cannot be registered with the reactor.
#[cfg(unix)]
pub fn into_async_reader(reader: PipeReader) -> Result<AsyncPipeReader> {
    use std::os::fd::OwnedFd;

    let receiver = tokio::net::unix::pipe::Receiver::from_owned_fd(OwnedFd::from(reader))
        .map_err(|e| SupervisorError::pipe(format!("failed to register pipe: {e}")))?;
    Ok(Box::new(receiver))
}

/// Converts a pipe read end into a tokio reader.
///
/// Reads run on tokio's blocking pool, so the runtime needs the `fs` feature.
///
/// # Errors
/// Never fails on this platform.
#[cfg(windows)]
pub fn into_async_reader(reader: PipeReader) -> Result<AsyncPipeReader> {
    use std::os::windows::io::OwnedHandle;

    let file = std::fs::File::from(OwnedHandle::from(reader));
    Ok(Box::new(tokio::fs::File::from_std(file)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_is_valid() {
        let pipe = Pipe::create().unwrap();
        assert!(pipe.is_valid());
    }

    #[test]
    fn test_line_round_trip() {
        let mut pipe = Pipe::create().unwrap();
        pipe.write_line("q").unwrap();
        pipe.write_line("info: second").unwrap();
        assert_eq!(pipe.read_line().unwrap().as_deref(), Some("q"));
        assert_eq!(pipe.read_line().unwrap().as_deref(), Some("info: second"));
    }

    #[test]
    fn test_end_of_stream_after_writer_closes() {
        let mut pipe = Pipe::create().unwrap();
        let mut writer = pipe.take_writer().unwrap();
        writer.write_all(b"last line without newline").unwrap();
        drop(writer);

        assert_eq!(
            pipe.read_line().unwrap().as_deref(),
            Some("last line without newline")
        );
        assert_eq!(pipe.read_line().unwrap(), None);
    }

    #[test]
    fn test_double_close_is_noop() {
        let mut pipe = Pipe::create().unwrap();
        pipe.close();
        pipe.close();
        assert!(!pipe.is_valid());
    }

    #[test]
    fn test_operations_after_close_fail() {
        let mut pipe = Pipe::create().unwrap();
        pipe.close();
        assert!(pipe.write_line("q").is_err());
        assert!(pipe.read_line().is_err());
        assert!(pipe.take_reader().is_none());
    }

    #[test]
    fn test_write_after_reader_dropped_fails() {
        let mut pipe = Pipe::create().unwrap();
        drop(pipe.take_reader());
        assert!(pipe.write_line("q").is_err());
    }

    #[test]
    fn test_take_ends_once() {
        let mut pipe = Pipe::create().unwrap();
        assert!(pipe.take_reader().is_some());
        assert!(pipe.take_reader().is_none());
        assert!(pipe.is_valid());
        assert!(pipe.take_writer().is_some());
        assert!(!pipe.is_valid());
    }

    #[tokio::test]
    async fn test_async_reader_sees_lines() {
        use tokio::io::AsyncBufReadExt;

        let mut pipe = Pipe::create().unwrap();
        let reader = into_async_reader(pipe.take_reader().unwrap()).unwrap();
        pipe.write_line("debug: tick").unwrap();
        pipe.close();

        let mut lines = tokio::io::BufReader::new(reader).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("debug: tick"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }
}
