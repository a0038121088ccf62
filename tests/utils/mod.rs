// Shared mock collaborators for integration tests

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use detrace::binder::{CallListener, Callbacks, Interceptor};
use detrace::error::TraceError;
use detrace::event::Event;
use detrace::memory::MemoryReader;
use detrace::resolver::SymbolResolver;
use detrace::value::{Address, RawWord};

/// Byte-addressable fake process memory with a read counter.
#[derive(Default)]
pub struct MockMemory {
    bytes: HashMap<Address, u8>,
    reads: AtomicUsize,
}

impl MockMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map_bytes(&mut self, address: Address, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            self.bytes.insert(address + i as u64, *byte);
        }
    }

    /// Map a little-endian pointer-sized word.
    pub fn map_pointer(&mut self, address: Address, value: RawWord) {
        self.map_bytes(address, &value.to_le_bytes());
    }

    /// Map a NUL-terminated UTF-8 string.
    pub fn map_utf8(&mut self, address: Address, text: &str) {
        self.map_bytes(address, text.as_bytes());
        self.bytes.insert(address + text.len() as u64, 0);
    }

    /// Map a NUL-terminated UTF-16 string.
    pub fn map_utf16(&mut self, address: Address, text: &str) {
        let mut offset = address;
        for unit in text.encode_utf16() {
            self.map_bytes(offset, &unit.to_le_bytes());
            offset += 2;
        }
        self.map_bytes(offset, &[0, 0]);
    }

    /// Total collaborator calls observed so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn byte_at(&self, address: Address) -> Result<u8> {
        match self.bytes.get(&address) {
            Some(byte) => Ok(*byte),
            None => bail!("unmapped address {address:#x}"),
        }
    }

    fn span(&self, address: Address, len: usize) -> Result<Vec<u8>> {
        (0..len as u64).map(|i| self.byte_at(address + i)).collect()
    }
}

impl MemoryReader for MockMemory {
    fn read_pointer(&self, address: Address) -> Result<RawWord> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(RawWord::from_le_bytes(
            self.span(address, 8)?.try_into().unwrap(),
        ))
    }

    fn read_u8(&self, address: Address) -> Result<u8> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.byte_at(address)
    }

    fn read_u16(&self, address: Address) -> Result<u16> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(u16::from_le_bytes(
            self.span(address, 2)?.try_into().unwrap(),
        ))
    }

    fn read_i32(&self, address: Address) -> Result<i32> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(i32::from_le_bytes(
            self.span(address, 4)?.try_into().unwrap(),
        ))
    }

    fn read_bytes(&self, address: Address, len: usize) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.span(address, len)
    }

    fn read_utf8(&self, address: Address, len: Option<usize>) -> Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let bytes = match len {
            Some(len) => self.span(address, len)?,
            None => {
                let mut bytes = Vec::new();
                let mut offset = address;
                loop {
                    let byte = self.byte_at(offset)?;
                    if byte == 0 {
                        break;
                    }
                    bytes.push(byte);
                    offset += 1;
                }
                bytes
            }
        };
        Ok(String::from_utf8(bytes)?)
    }

    fn read_utf16(&self, address: Address, len: Option<usize>) -> Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mut units = Vec::new();
        let mut offset = address;
        loop {
            if let Some(len) = len {
                if units.len() == len {
                    break;
                }
            }
            let unit = u16::from_le_bytes(self.span(offset, 2)?.try_into().unwrap());
            if len.is_none() && unit == 0 {
                break;
            }
            units.push(unit);
            offset += 2;
        }
        Ok(String::from_utf16(&units)?)
    }
}

/// Export table backed by a map of `module!function` to address.
#[derive(Default)]
pub struct MapResolver {
    exports: HashMap<(String, String), Address>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn export(mut self, module: &str, function: &str, address: Address) -> Self {
        self.exports
            .insert((module.to_string(), function.to_string()), address);
        self
    }
}

impl SymbolResolver for MapResolver {
    fn resolve_export(&self, module: &str, function: &str) -> Option<Address> {
        self.exports
            .get(&(module.to_string(), function.to_string()))
            .copied()
    }
}

/// Interception mechanism that records listeners and lets tests drive
/// synthetic invocations through them.
#[derive(Default)]
pub struct MockInterceptor {
    listeners: Mutex<HashMap<Address, Arc<dyn CallListener>>>,
}

impl MockInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attached(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> =
            self.listeners.lock().unwrap().keys().copied().collect();
        addresses.sort_unstable();
        addresses
    }

    /// Simulate one complete call at `address`; returns false if nothing is
    /// attached there.
    pub fn invoke(&self, address: Address, raw_args: &[RawWord], raw_return: RawWord) -> bool {
        let listener = self.listeners.lock().unwrap().get(&address).cloned();
        match listener {
            Some(listener) => {
                let invocation = listener.enter(raw_args);
                listener.exit(invocation, raw_return);
                true
            }
            None => false,
        }
    }
}

impl Interceptor for MockInterceptor {
    fn attach(&self, address: Address, listener: Arc<dyn CallListener>) -> Result<()> {
        let mut listeners = self.listeners.lock().unwrap();
        if listeners.contains_key(&address) {
            bail!("listener already attached at {address:#x}");
        }
        listeners.insert(address, listener);
        Ok(())
    }

    fn detach(&self, address: Address) -> Result<()> {
        self.listeners.lock().unwrap().remove(&address);
        Ok(())
    }
}

/// Thread-safe collectors for delivered events and reported errors.
pub fn collectors() -> (
    Callbacks,
    Arc<Mutex<Vec<Event>>>,
    Arc<Mutex<Vec<TraceError>>>,
) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let event_sink = events.clone();
    let error_sink = errors.clone();
    let callbacks = Callbacks::new(
        move |event| event_sink.lock().unwrap().push(event),
        move |error| error_sink.lock().unwrap().push(error),
    );
    (callbacks, events, errors)
}
