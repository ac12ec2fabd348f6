//! Hardware trigger output.
//!
//! The stimulator, TENS unit, and context cue lines hang off a single
//! byte-wide output port. The engine treats the port as an opaque
//! fire-and-forget sink: one writer is active at a time, every non-zero
//! trigger is followed by an explicit zero, and the port is force-zeroed on
//! every trial boundary and on abort.
//!
//! Three implementations:
//! - [`HardwarePort`]: pokes the data byte at an I/O base address
//! - [`NullPort`]: no-op sink for offline development (absent device)
//! - [`RecordingPort`]: captures every write, used by tests

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};

use crate::errors::{Result, RigError};

/// Byte-wide trigger output. Fire-and-forget: no read-back, no error
/// surface. Write failures on real hardware are logged and swallowed so a
/// flaky port cannot take down a running session.
pub trait OutputPort {
    fn write(&mut self, value: u8);
}

/// No-op sink. Selected once at startup when no device is configured;
/// nothing downstream branches on port presence again.
#[derive(Debug, Default)]
pub struct NullPort;

impl OutputPort for NullPort {
    fn write(&mut self, _value: u8) {}
}

/// Parallel-port data register reached through `/dev/port`.
///
/// The base address comes from the device manager on the acquisition
/// machine (e.g. `0x3ff8`). Requires read/write access to `/dev/port`.
pub struct HardwarePort {
    dev: File,
    base: u64,
}

impl HardwarePort {
    pub fn open(base: u16) -> Result<Self> {
        let dev = OpenOptions::new()
            .write(true)
            .open("/dev/port")
            .map_err(|e| RigError::Port(format!("cannot open /dev/port: {e}")))?;
        Ok(Self {
            dev,
            base: u64::from(base),
        })
    }
}

impl OutputPort for HardwarePort {
    fn write(&mut self, value: u8) {
        let res = self
            .dev
            .seek(SeekFrom::Start(self.base))
            .and_then(|_| self.dev.write_all(&[value]));
        if let Err(e) = res {
            tracing::error!(target: "painrig::port", value, error = %e, "port write failed");
        } else {
            tracing::trace!(target: "painrig::port", value, "port write");
        }
    }
}

/// Test sink that remembers every byte written, in order.
#[derive(Debug, Default)]
pub struct RecordingPort {
    pub writes: Vec<u8>,
}

impl RecordingPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last byte written, if any.
    pub fn last(&self) -> Option<u8> {
        self.writes.last().copied()
    }
}

impl OutputPort for RecordingPort {
    fn write(&mut self, value: u8) {
        self.writes.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_port_keeps_order() {
        let mut port = RecordingPort::new();
        port.write(128);
        port.write(0);
        port.write(1);
        port.write(0);
        assert_eq!(port.writes, vec![128, 0, 1, 0]);
        assert_eq!(port.last(), Some(0));
    }

    #[test]
    fn null_port_accepts_writes() {
        let mut port = NullPort;
        port.write(255);
        port.write(0);
    }
}
