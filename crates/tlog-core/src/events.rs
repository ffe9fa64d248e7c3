//! Host-owned event buffers
//!
//! The host allocates a fixed set of writer slots per batch and hands them to
//! a source instance. The instance fills a prefix of the slots and reports
//! how many it wrote. Later the host wraps any stored event in an
//! [`EventReader`] for extraction or display.

use crate::plugins::{PluginError, PluginResult};

/// Default number of slots in a batch
pub const DEFAULT_BATCH_SIZE: usize = 128;

/// Default maximum payload size of a single event, in bytes
pub const DEFAULT_EVENT_SIZE: usize = 256 * 1024;

/// A single writable event slot
#[derive(Debug, Clone)]
pub struct EventWriter {
    timestamp_ns: u64,
    data: Vec<u8>,
    max_size: usize,
}

impl EventWriter {
    pub fn new(max_size: usize) -> Self {
        Self {
            timestamp_ns: 0,
            data: Vec::new(),
            max_size,
        }
    }

    /// Set the event timestamp in nanoseconds since the Unix epoch
    pub fn set_timestamp(&mut self, timestamp_ns: u64) {
        self.timestamp_ns = timestamp_ns;
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp_ns
    }

    /// Replace the slot payload.
    ///
    /// Fails without touching the slot if the payload does not fit.
    pub fn write(&mut self, payload: &[u8]) -> PluginResult<()> {
        if payload.len() > self.max_size {
            return Err(PluginError::BufferOverflow {
                size: payload.len(),
                capacity: self.max_size,
            });
        }
        self.data.clear();
        self.data.extend_from_slice(payload);
        Ok(())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Clear payload and timestamp so the slot can be reused
    pub fn reset(&mut self) {
        self.timestamp_ns = 0;
        self.data.clear();
    }

    /// Borrow the slot contents as a readable event
    pub fn reader(&self, num: u64) -> EventReader<'_> {
        EventReader::new(num, self.timestamp_ns, &self.data)
    }
}

/// A fixed-capacity set of event slots for one batch
#[derive(Debug, Clone)]
pub struct EventWriters {
    slots: Vec<EventWriter>,
}

impl EventWriters {
    /// Create `capacity` slots using the default event size
    pub fn new(capacity: usize) -> Self {
        Self::with_event_size(capacity, DEFAULT_EVENT_SIZE)
    }

    pub fn with_event_size(capacity: usize, max_size: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| EventWriter::new(max_size)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EventWriter> {
        self.slots.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut EventWriter> {
        self.slots.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventWriter> {
        self.slots.iter()
    }

    /// Reset every slot before handing the set to a new batch
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.reset();
        }
    }
}

impl Default for EventWriters {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

/// Read-only view of a stored event
#[derive(Debug, Clone, Copy)]
pub struct EventReader<'a> {
    num: u64,
    timestamp_ns: u64,
    data: &'a [u8],
}

impl<'a> EventReader<'a> {
    pub fn new(num: u64, timestamp_ns: u64, data: &'a [u8]) -> Self {
        Self {
            num,
            timestamp_ns,
            data,
        }
    }

    /// Sequence number assigned by the host
    pub fn num(&self) -> u64 {
        self.num
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp_ns
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }
}
