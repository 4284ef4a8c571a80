//! Streaming zstd decode with multi-byte boundary recovery.
//!
//! Dump files are zstd frames over UTF-8 text. A fixed-size read can end in
//! the middle of a multi-byte character, so each decode attempt that fails is
//! retried with more bytes appended, up to a byte budget per chunk.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Byte budgets for the streaming decoder.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Bytes requested from the decompressor per read attempt.
    pub chunk_size_bytes: usize,
    /// Budget within which one chunk must become valid UTF-8.
    pub max_window_size_bytes: u64,
    /// zstd frame window cap handed to the decompressor.
    pub zst_max_window_size_bytes: u64,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            chunk_size_bytes: 1 << 27,
            max_window_size_bytes: 1 << 30,
            zst_max_window_size_bytes: 1 << 31,
        }
    }
}

/// Error from decoding one chunk of a dump stream.
#[derive(Debug)]
pub enum DecodeError {
    /// The chunk could not become valid UTF-8 within the byte budget.
    WindowExceeded { bytes_read: u64 },
    Io(io::Error),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WindowExceeded { bytes_read } => {
                write!(f, "unable to decode frame after reading {bytes_read} bytes")
            }
            Self::Io(e) => write!(f, "IO: {e}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Shared count of compressed bytes consumed, for progress tracking.
pub type ByteCounter = Arc<AtomicU64>;

/// Reader wrapper that tracks bytes read.
pub struct CountingReader<R> {
    inner: R,
    count: ByteCounter,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Decompressed byte source for an on-disk dump file.
pub type DumpReader = zstd::stream::read::Decoder<'static, BufReader<CountingReader<File>>>;

/// Lazy sequence of decoded text chunks over a byte source.
///
/// Each `next()` reads `chunk_size_bytes` and retries with more bytes while
/// the accumulated buffer is not valid UTF-8 — an explicit loop, so a
/// pathological stream cannot grow the call stack. The running byte counter
/// charges a full chunk per read attempt; crossing `max_window_size_bytes`
/// fails the chunk with [`DecodeError::WindowExceeded`]. Trailing bytes are
/// never dropped to force an early success.
pub struct ChunkDecoder<R> {
    reader: R,
    chunk_size: usize,
    max_window: u64,
    eof: bool,
}

impl<R: Read> ChunkDecoder<R> {
    pub fn new(reader: R, opts: &ReadOptions) -> Self {
        Self {
            reader,
            chunk_size: opts.chunk_size_bytes,
            max_window: opts.max_window_size_bytes,
            eof: false,
        }
    }
}

impl ChunkDecoder<DumpReader> {
    /// Open a `.zst` dump file. Also returns the counter of compressed bytes
    /// consumed so far, which callers can poll for progress.
    pub fn open_zst(path: &Path, opts: &ReadOptions) -> io::Result<(Self, ByteCounter)> {
        let file = File::open(path)?;
        let counter: ByteCounter = Arc::new(AtomicU64::new(0));
        let counting = CountingReader {
            inner: file,
            count: counter.clone(),
        };
        let mut decoder = zstd::stream::read::Decoder::new(counting)?;
        decoder.window_log_max(window_log(opts.zst_max_window_size_bytes))?;
        Ok((Self::new(decoder, opts), counter))
    }
}

impl<R: Read> Iterator for ChunkDecoder<R> {
    type Item = Result<String, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.eof {
            return None;
        }
        let mut pending: Vec<u8> = Vec::new();
        let mut bytes_read: u64 = 0;
        loop {
            let n = match read_up_to(&mut self.reader, &mut pending, self.chunk_size) {
                Ok(n) => n,
                Err(e) => {
                    self.eof = true;
                    return Some(Err(DecodeError::Io(e)));
                }
            };
            // The budget charges a full chunk per attempt, even short reads.
            bytes_read += self.chunk_size as u64;
            if n == 0 && pending.is_empty() {
                self.eof = true;
                return None;
            }
            match String::from_utf8(std::mem::take(&mut pending)) {
                Ok(text) => return Some(Ok(text)),
                Err(e) => {
                    pending = e.into_bytes();
                    if bytes_read > self.max_window {
                        self.eof = true;
                        return Some(Err(DecodeError::WindowExceeded { bytes_read }));
                    }
                }
            }
        }
    }
}

/// Append up to `want` bytes from `reader` onto `buf`, stopping at EOF.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut Vec<u8>, want: usize) -> io::Result<usize> {
    let start = buf.len();
    buf.resize(start + want, 0);
    let mut filled = 0;
    while filled < want {
        match reader.read(&mut buf[start + filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                buf.truncate(start + filled);
                return Err(e);
            }
        }
    }
    buf.truncate(start + filled);
    Ok(filled)
}

/// zstd wants the window cap as a log2 distance.
fn window_log(bytes: u64) -> u32 {
    bytes.max(1).ilog2()
}
