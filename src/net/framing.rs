//! Length-prefixed framing for TCP streams.
//!
//! ```text
//! +-------------------+--------------------+
//! | length (4 bytes)  |   payload          |
//! | u32 big-endian    |   (length bytes)   |
//! +-------------------+--------------------+
//! ```
//!
//! The length does not include the prefix itself. A stream that ends before a
//! frame is complete is reported as [`FrameError::ConnectionClosed`], the same
//! as a clean disconnect between frames.

use std::io::{self, ErrorKind, Read, Write};

/// Largest payload either side accepts. A full chunk is well under 2 KiB.
pub const MAX_FRAME_LEN: u32 = 1 << 20;

const PREFIX_LEN: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge { size: u64, max: u32 },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error)
}

/// Fill `buf` completely, or report the peer going away.
pub fn read_exact_or_closed<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), FrameError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => FrameError::ConnectionClosed,
        _ => FrameError::Io(e)
    })
}

/// Blocking read of one frame.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut len_buf = [0u8; PREFIX_LEN];
    read_exact_or_closed(reader, &mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(FrameError::PayloadTooLarge { size: len as u64, max: MAX_FRAME_LEN });
    }

    let mut payload = vec![0u8; len as usize];
    read_exact_or_closed(reader, &mut payload)?;
    Ok(payload)
}

/// Prefix and payload go out in a single write so concurrent writers that
/// share a lock never interleave partial frames.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    if payload.len() as u64 > MAX_FRAME_LEN as u64 {
        return Err(FrameError::PayloadTooLarge { size: payload.len() as u64, max: MAX_FRAME_LEN });
    }

    let mut frame = Vec::with_capacity(PREFIX_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}

/// Buffers bytes across reads so a read timeout in the middle of a frame
/// means "nothing yet" rather than a corrupted stream.
pub struct FrameReader<R> {
    inner: R,
    buffer: Vec<u8>
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> FrameReader<R> {
        FrameReader { inner, buffer: Vec::new() }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Returns `Ok(None)` when the underlying read timed out before a whole
    /// frame was available.
    pub fn poll_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(frame) = self.take_buffered()? {
                return Ok(Some(frame));
            }

            match self.inner.read(&mut chunk) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => return Ok(None),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(FrameError::Io(e))
            }
        }
    }

    /// Waits for the next complete frame regardless of read timeouts.
    pub fn next_frame(&mut self) -> Result<Vec<u8>, FrameError> {
        loop {
            if let Some(frame) = self.poll_frame()? {
                return Ok(frame);
            }
        }
    }

    fn take_buffered(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        if self.buffer.len() < PREFIX_LEN {
            return Ok(None);
        }

        let mut len_buf = [0u8; PREFIX_LEN];
        len_buf.copy_from_slice(&self.buffer[..PREFIX_LEN]);
        let len = u32::from_be_bytes(len_buf);
        if len > MAX_FRAME_LEN {
            return Err(FrameError::PayloadTooLarge { size: len as u64, max: MAX_FRAME_LEN });
        }

        let end = PREFIX_LEN + len as usize;
        if self.buffer.len() < end {
            return Ok(None);
        }
        let frame = self.buffer[PREFIX_LEN..end].to_vec();
        self.buffer.drain(..end);
        Ok(Some(frame))
    }
}
