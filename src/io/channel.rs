use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

use crate::io::codec::StreamDecoder;

const READ_CHUNK: usize = 8192;

/// Chunks the reader thread may queue ahead of the caller. Once full, the
/// thread stops reading and the child blocks on a full PTY buffer.
const OUTPUT_QUEUE_CHUNKS: usize = 64;

/// Consecutive `WouldBlock` writes tolerated before giving up.
const MAX_WRITE_STALLS: u32 = 5000;
const WRITE_STALL_BACKOFF: Duration = Duration::from_millis(1);

/// How long a read may wait for output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Wait until output arrives or the process side hangs up.
    Blocking,
    /// Return immediately with whatever is already buffered.
    NonBlocking,
    /// Wait at most this long. Elapsing with no data is an empty read.
    Timeout(Duration),
}

type Chunk = io::Result<Vec<u8>>;

/// Byte pipe to and from a PTY master.
///
/// A dedicated thread pumps the blocking master reader into a bounded
/// channel so reads can honour [`ReadMode`] bounds. Bytes beyond a read's
/// `max_bytes` stay buffered for the next read.
pub struct IoChannel {
    writer: Option<Box<dyn Write + Send>>,
    output: Receiver<Chunk>,
    pending: Vec<u8>,
    failure: Option<io::Error>,
    eof: bool,
    decoder: StreamDecoder,
    reader_thread: Option<thread::JoinHandle<()>>,
}

impl IoChannel {
    pub fn new(reader: Box<dyn Read + Send>, writer: Box<dyn Write + Send>) -> io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel(OUTPUT_QUEUE_CHUNKS);
        let reader_thread = thread::Builder::new()
            .name("pty-reader".to_string())
            .spawn(move || pump(reader, tx))?;

        Ok(Self {
            writer: Some(writer),
            output: rx,
            pending: Vec::new(),
            failure: None,
            eof: false,
            decoder: StreamDecoder::new(),
            reader_thread: Some(reader_thread),
        })
    }

    /// Write once and report how many bytes the PTY accepted.
    ///
    /// May be fewer than `bytes.len()`; see [`IoChannel::write_all`].
    pub fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "pty writer closed"))?;
        let written = writer.write(bytes)?;
        writer.flush()?;
        Ok(written)
    }

    /// Write the whole payload, looping over partial writes.
    pub fn write_all(&mut self, bytes: &[u8]) -> io::Result<usize> {
        let mut written = 0;
        let mut stalls = 0u32;
        while written < bytes.len() {
            match self.write(&bytes[written..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "pty accepted no bytes",
                    ));
                }
                Ok(count) => {
                    written += count;
                    stalls = 0;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    stalls += 1;
                    if stalls > MAX_WRITE_STALLS {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "pty write buffer stayed full",
                        ));
                    }
                    thread::sleep(WRITE_STALL_BACKOFF);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    /// Read up to `max_bytes` of output.
    ///
    /// An empty result means nothing arrived within the mode's bound, or
    /// the process side has hung up ([`IoChannel::is_eof`]). Neither is an
    /// error.
    pub fn read(&mut self, max_bytes: usize, mode: ReadMode) -> io::Result<Vec<u8>> {
        if max_bytes == 0 {
            return Ok(Vec::new());
        }

        if self.pending.is_empty() && self.failure.is_none() && !self.eof {
            match mode {
                ReadMode::Blocking => match self.output.recv() {
                    Ok(chunk) => self.accept(chunk),
                    Err(_) => self.eof = true,
                },
                ReadMode::NonBlocking => {}
                ReadMode::Timeout(bound) => match self.output.recv_timeout(bound) {
                    Ok(chunk) => self.accept(chunk),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => self.eof = true,
                },
            }
        }
        self.drain_ready(max_bytes);

        if self.pending.is_empty() {
            if let Some(err) = self.failure.take() {
                return Err(err);
            }
            return Ok(Vec::new());
        }

        let take = max_bytes.min(self.pending.len());
        let rest = self.pending.split_off(take);
        Ok(std::mem::replace(&mut self.pending, rest))
    }

    /// [`IoChannel::read`], decoded. Characters split across reads are
    /// held back until complete.
    ///
    /// A blocking read keeps reading until at least one character is
    /// decoded, so it returns `""` only at end of stream. With a timeout or
    /// non-blocking read, `""` may also mean the bytes that did arrive are
    /// the start of a character still in flight.
    pub fn read_text(&mut self, max_bytes: usize, mode: ReadMode) -> io::Result<String> {
        loop {
            let bytes = self.read(max_bytes, mode)?;
            let mut text = self.decoder.decode(&bytes);
            if self.is_eof() {
                text.push_str(&self.decoder.finish());
            }
            if !text.is_empty() || bytes.is_empty() || mode != ReadMode::Blocking {
                return Ok(text);
            }
        }
    }

    /// True once the reader has hung up and everything buffered was read.
    pub fn is_eof(&self) -> bool {
        self.eof && self.pending.is_empty()
    }

    /// Drop the writer and detach or join the reader thread.
    pub fn close(&mut self) {
        self.writer = None;
        if let Some(handle) = self.reader_thread.take() {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                // Still blocked in read(); it exits on hangup.
                debug!("pty reader still running at close, detaching");
            }
        }
    }

    fn accept(&mut self, chunk: Chunk) {
        match chunk {
            Ok(bytes) => self.pending.extend_from_slice(&bytes),
            Err(err) => self.failure = Some(err),
        }
    }

    fn drain_ready(&mut self, max_bytes: usize) {
        while self.pending.len() < max_bytes && self.failure.is_none() && !self.eof {
            match self.output.try_recv() {
                Ok(chunk) => self.accept(chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.eof = true,
            }
        }
    }
}

impl Drop for IoChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn pump(mut reader: Box<dyn Read + Send>, tx: SyncSender<Chunk>) {
    let mut buffer = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(count) => {
                trace!(bytes = count, "pty output");
                if tx.send(Ok(buffer[..count].to_vec())).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if is_hangup(&e) => break,
            Err(e) => {
                let _ = tx.send(Err(e));
                break;
            }
        }
    }
    debug!("pty reader finished");
}

/// EIO on a master fd means every slave fd is closed, i.e. the child side
/// is gone. Treat it as end of stream.
fn is_hangup(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(libc::EIO)
    }
    #[cfg(not(unix))]
    {
        err.kind() == io::ErrorKind::BrokenPipe
    }
}
