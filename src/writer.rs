//! Buffered writer that turns arbitrary writes into 32KB blocks.

use std::fmt;
use std::io::{self, Write};

use crate::deflate::{Deflate, MAX_BLOCK_SIZE};
use crate::device::Accelerator;
use crate::error::Result;
use crate::gzip::Gzip;
use crate::mem::AlignedBuf;

/// A stream that compresses whole blocks.
pub trait BlockWriter {
    type Sink: Write;

    /// Compress one block of at most 32KB
    fn write_block(&mut self, block: &[u8], last: bool) -> Result<usize>;

    /// Start over on a new sink, returning the previous one
    fn reset(&mut self, sink: Self::Sink) -> Self::Sink;

    fn close(&mut self) -> Result<()>;
}

/// [`Write`] adapter collecting data into 32KB blocks for a [`BlockWriter`].
///
/// `flush` emits the buffered data as a non-final block; `close` must be
/// called to emit the final block.
pub struct BufWriter<B: BlockWriter> {
    buffer: AlignedBuf,
    offset: usize,
    inner: B,
}

impl<B: BlockWriter> BufWriter<B> {
    pub fn new(inner: B) -> Self {
        Self {
            buffer: AlignedBuf::new(MAX_BLOCK_SIZE),
            offset: 0,
            inner,
        }
    }

    pub fn get_ref(&self) -> &B {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut B {
        &mut self.inner
    }

    pub fn into_inner(self) -> B {
        self.inner
    }

    /// Drop buffered data and restart the block writer on `sink`
    pub fn reset(&mut self, sink: B::Sink) -> B::Sink {
        self.offset = 0;
        self.inner.reset(sink)
    }

    /// Emit the buffered data as the final block and close the block writer
    pub fn close(&mut self) -> Result<()> {
        let written = self.inner.write_block(&self.buffer[..self.offset], true);
        self.offset = 0;
        let closed = self.inner.close();
        written?;
        closed
    }
}

impl<B: BlockWriter> Write for BufWriter<B> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let size = data.len();
        let mut data = data;
        while self.offset + data.len() >= MAX_BLOCK_SIZE {
            let take = MAX_BLOCK_SIZE - self.offset;
            self.buffer[self.offset..].copy_from_slice(&data[..take]);
            data = &data[take..];
            self.offset = 0;
            self.inner.write_block(&self.buffer, false)?;
        }
        self.buffer[self.offset..self.offset + data.len()].copy_from_slice(data);
        self.offset += data.len();
        Ok(size)
    }

    fn flush(&mut self) -> io::Result<()> {
        let result = self.inner.write_block(&self.buffer[..self.offset], false);
        self.offset = 0;
        result?;
        Ok(())
    }
}

impl<B: BlockWriter + fmt::Debug> fmt::Debug for BufWriter<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufWriter")
            .field("buffered", &self.offset)
            .field("inner", &self.inner)
            .finish()
    }
}

/// Buffered DEFLATE writer over `sink`
pub fn new_deflate_writer<W: Write>(accel: &Accelerator, sink: W) -> BufWriter<Deflate<W>> {
    BufWriter::new(Deflate::new(accel, sink))
}

/// Buffered GZIP writer over `sink`
pub fn new_gzip_writer<W: Write>(accel: &Accelerator, sink: W) -> BufWriter<Gzip<W>> {
    BufWriter::new(Gzip::new(accel, sink))
}
