// crates/systems/oxid_palm/src/transport.rs
//! Byte-stream plumbing between host I/O threads and the emulated UART.
//!
//! Host-side readers run on their own threads and push into a
//! mutex-guarded [`ByteQueue`]; the emulation thread polls it with
//! `bytes_in_buffer` / `read` and never blocks.

use crate::error::TransportError;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

const READ_CHUNK: usize = 256;

// ============================================================================
//  BYTE QUEUE
// ============================================================================

#[derive(Debug, Default)]
pub struct ByteQueue {
    bytes: Mutex<VecDeque<u8>>,
}

impl ByteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, data: &[u8]) {
        self.bytes.lock().extend(data.iter().copied());
    }

    pub fn pop(&self) -> Option<u8> {
        self.bytes.lock().pop_front()
    }

    /// Moves up to `buf.len()` bytes out; 0 when empty.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let mut bytes = self.bytes.lock();
        let n = buf.len().min(bytes.len());
        for (slot, b) in buf.iter_mut().zip(bytes.drain(..n)) {
            *slot = b;
        }
        n
    }

    pub fn bytes_in_buffer(&self) -> usize {
        self.bytes.lock().len()
    }

    pub fn clear(&self) {
        self.bytes.lock().clear();
    }

    pub fn drain(&self) -> Vec<u8> {
        self.bytes.lock().drain(..).collect()
    }
}

// ============================================================================
//  TRANSPORT CONTRACT
// ============================================================================

/// A host byte stream the emulated serial port talks through.
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;
    fn open(&self) -> Result<(), TransportError>;
    fn close(&self) -> Result<(), TransportError>;
    fn is_open(&self) -> bool;

    /// Bytes received and not yet read.
    fn bytes_in_buffer(&self) -> usize;

    /// Non-blocking receive; returns how many bytes were copied.
    fn read(&self, buf: &mut [u8]) -> usize;

    fn write(&self, data: &[u8]) -> Result<usize, TransportError>;

    fn read_byte(&self) -> Option<u8> {
        let mut b = [0u8; 1];
        (self.read(&mut b) == 1).then_some(b[0])
    }
}

// ============================================================================
//  IN-MEMORY TRANSPORT
// ============================================================================

/// Both directions are plain queues. The host side feeds receive data
/// with [`feed`](Self::feed) and collects what the device sent with
/// [`take_sent`](Self::take_sent).
#[derive(Debug)]
pub struct QueueTransport {
    name: String,
    rx: ByteQueue,
    tx: ByteQueue,
    open: AtomicBool,
}

impl QueueTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rx: ByteQueue::new(),
            tx: ByteQueue::new(),
            open: AtomicBool::new(false),
        }
    }

    pub fn feed(&self, data: &[u8]) {
        self.rx.push(data);
    }

    pub fn take_sent(&self) -> Vec<u8> {
        self.tx.drain()
    }
}

impl Transport for QueueTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<(), TransportError> {
        if self.open.swap(true, Ordering::SeqCst) {
            return Err(TransportError::AlreadyOpen(self.name.clone()));
        }
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Err(TransportError::NotOpen(self.name.clone()));
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn bytes_in_buffer(&self) -> usize {
        self.rx.bytes_in_buffer()
    }

    fn read(&self, buf: &mut [u8]) -> usize {
        self.rx.read(buf)
    }

    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen(self.name.clone()));
        }
        self.tx.push(data);
        Ok(data.len())
    }
}

// ============================================================================
//  STREAM TRANSPORT (background reader thread)
// ============================================================================

type Source = Box<dyn Read + Send>;
type Sink = Box<dyn Write + Send>;

/// Wraps a host reader/writer pair. `open` spawns a thread that copies the
/// reader into the receive queue until end of stream or error.
pub struct StreamTransport {
    name: String,
    rx: Arc<ByteQueue>,
    source: Mutex<Option<Source>>,
    sink: Mutex<Option<Sink>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    open: AtomicBool,
}

impl StreamTransport {
    pub fn new(name: impl Into<String>, source: impl Read + Send + 'static, sink: impl Write + Send + 'static) -> Self {
        Self {
            name: name.into(),
            rx: Arc::new(ByteQueue::new()),
            source: Mutex::new(Some(Box::new(source))),
            sink: Mutex::new(Some(Box::new(sink))),
            reader: Mutex::new(None),
            open: AtomicBool::new(false),
        }
    }

    /// Blocks until the reader thread has hit end of stream.
    pub fn wait_reader(&self) {
        if let Some(handle) = self.reader.lock().take() {
            if handle.join().is_err() {
                tracing::warn!("{}: reader thread panicked", self.name);
            }
        }
    }
}

impl Transport for StreamTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<(), TransportError> {
        if self.open.swap(true, Ordering::SeqCst) {
            return Err(TransportError::AlreadyOpen(self.name.clone()));
        }
        let Some(mut source) = self.source.lock().take() else {
            // reader already ran once; the stream is spent
            return Ok(());
        };
        let rx = Arc::clone(&self.rx);
        let name = self.name.clone();
        let handle = std::thread::Builder::new()
            .name(format!("serial-{name}"))
            .spawn(move || {
                let mut chunk = [0u8; READ_CHUNK];
                loop {
                    match source.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => rx.push(&chunk[..n]),
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            tracing::warn!("{name}: read failed: {e}");
                            break;
                        }
                    }
                }
                tracing::debug!("{name}: reader finished");
            })?;
        *self.reader.lock() = Some(handle);
        tracing::debug!("{}: opened", self.name);
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Err(TransportError::NotOpen(self.name.clone()));
        }
        if let Some(mut sink) = self.sink.lock().take() {
            sink.flush()?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn bytes_in_buffer(&self) -> usize {
        self.rx.bytes_in_buffer()
    }

    fn read(&self, buf: &mut [u8]) -> usize {
        self.rx.read(buf)
    }

    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        let mut sink = self.sink.lock();
        match sink.as_mut() {
            Some(s) if self.is_open() => {
                s.write_all(data)?;
                Ok(data.len())
            }
            _ => Err(TransportError::NotOpen(self.name.clone())),
        }
    }
}

// ============================================================================
//  REGISTRY
// ============================================================================

/// Open transports by identifying key (port name, socket address...).
#[derive(Default)]
pub struct TransportRegistry {
    open: Mutex<HashMap<String, Arc<dyn Transport>>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `transport` under `key`. A key can only be open once.
    pub fn open(&self, key: &str, transport: Arc<dyn Transport>) -> Result<Arc<dyn Transport>, TransportError> {
        let mut open = self.open.lock();
        if open.contains_key(key) {
            return Err(TransportError::AlreadyOpen(key.to_string()));
        }
        transport.open()?;
        open.insert(key.to_string(), Arc::clone(&transport));
        tracing::info!("transport {key} open");
        Ok(transport)
    }

    pub fn close(&self, key: &str) -> Result<(), TransportError> {
        let transport = self
            .open
            .lock()
            .remove(key)
            .ok_or_else(|| TransportError::NotOpen(key.to_string()))?;
        transport.close()
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Transport>> {
        self.open.lock().get(key).cloned()
    }

    pub fn is_open(&self, key: &str) -> bool {
        self.open.lock().contains_key(key)
    }
}
