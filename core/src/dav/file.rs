//! Stream handle returned by [`RemoteFolder::open_file`](super::RemoteFolder::open_file).

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use tracing::debug;

use crate::error::DavError;
use crate::types::OpenMode;

use super::transport::{DavTransport, RemoteStream};
use super::Result;

/// A remote file bound to the transport that serves its bytes.
pub struct DavFile {
    path: String,
    mode: OpenMode,
    transport: Arc<dyn DavTransport>,
    stream: Option<Box<dyn RemoteStream>>,
}

impl DavFile {
    pub fn new(path: impl Into<String>, mode: OpenMode, transport: Arc<dyn DavTransport>) -> Self {
        Self { path: path.into(), mode, transport, stream: None }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Ask the transport for the underlying stream. Opening twice is a no-op.
    pub fn open(&mut self) -> Result<()> {
        if self.stream.is_none() {
            debug!(path = %self.path, mode = ?self.mode, "opening remote file");
            self.stream = Some(self.transport.open_stream(&self.path, self.mode)?);
        }
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            if self.mode.can_write() {
                stream.flush().map_err(|err| DavError::Stream(err.to_string()))?;
            }
        }
        Ok(())
    }

    fn stream_for(&mut self, allowed: bool, action: &str) -> io::Result<&mut Box<dyn RemoteStream>> {
        if !allowed {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} opened as {:?} does not allow {action}", self.path, self.mode),
            ));
        }
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "remote file is not open"))
    }
}

impl Read for DavFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let allowed = self.mode.can_read();
        self.stream_for(allowed, "reading")?.read(buf)
    }
}

impl Write for DavFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let allowed = self.mode.can_write();
        self.stream_for(allowed, "writing")?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stream.as_mut() {
            Some(stream) => stream.flush(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for DavFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DavFile")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("open", &self.stream.is_some())
            .finish()
    }
}
