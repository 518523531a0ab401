//! Transport front ends
//!
//! Serial, CAN and MQTT all carry the same command text. This module turns
//! each transport's raw bytes into `&str` lines for [`crate::parse`]:
//!
//! - [`LineAssembler`]: newline-terminated serial byte stream
//! - [`CanCommandFilter`]: CAN payloads, dropping our own J1939 source address
//! - [`payload_text`]: MQTT (and CAN) payloads with trailing NUL padding

use heapless::{String, Vec};

/// Maximum accepted command line length in bytes
pub const MAX_LINE_LEN: usize = 96;

/// Errors from line assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineError {
    /// Line exceeded [`MAX_LINE_LEN`]; the rest of it is discarded
    Overflow,
    /// Line was not valid UTF-8
    InvalidUtf8,
}

/// Byte-at-a-time line assembler for the serial console
///
/// Carriage returns are ignored so both `\n` and `\r\n` terminated input work.
#[derive(Debug, Clone, Default)]
pub struct LineAssembler {
    buffer: Vec<u8, MAX_LINE_LEN>,
    discarding: bool,
}

impl LineAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            discarding: false,
        }
    }

    /// Feed a single byte
    ///
    /// Returns `Ok(Some(line))` when a newline completes a line. An overflow
    /// is reported once, on the byte that did not fit, and the remainder of
    /// that line is dropped.
    pub fn feed(&mut self, byte: u8) -> Result<Option<String<MAX_LINE_LEN>>, LineError> {
        match byte {
            b'\r' => Ok(None),
            b'\n' => {
                if self.discarding {
                    self.discarding = false;
                    self.buffer.clear();
                    return Ok(None);
                }
                let bytes = core::mem::take(&mut self.buffer);
                String::from_utf8(bytes)
                    .map(Some)
                    .map_err(|_| LineError::InvalidUtf8)
            }
            _ if self.discarding => Ok(None),
            _ => {
                if self.buffer.push(byte).is_err() {
                    self.buffer.clear();
                    self.discarding = true;
                    return Err(LineError::Overflow);
                }
                Ok(None)
            }
        }
    }

    /// Drop any partial line
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    /// Number of bytes buffered for the current line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Decode a message payload as command text
///
/// Trailing NUL bytes (fixed-size CAN frames, C-string MQTT publishers) are
/// trimmed. Returns `None` for non-UTF-8 payloads.
pub fn payload_text(payload: &[u8]) -> Option<&str> {
    let end = payload
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |idx| idx + 1);
    core::str::from_utf8(&payload[..end]).ok()
}

/// Filter for commands received over CAN
///
/// Frames are addressed J1939 style: the source address is the low byte of
/// the 29-bit identifier. Frames from `excluded_source` (normally our own
/// address echoed back) are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanCommandFilter {
    /// Source address to ignore, `None` to accept everything
    pub excluded_source: Option<u8>,
}

impl CanCommandFilter {
    /// Create a filter that drops one source address
    pub const fn excluding(source: u8) -> Self {
        Self {
            excluded_source: Some(source),
        }
    }

    /// Create a filter that accepts all frames
    pub const fn accept_all() -> Self {
        Self {
            excluded_source: None,
        }
    }

    /// J1939 source address of a frame identifier
    pub const fn source_address(id: u32) -> u8 {
        (id & 0xFF) as u8
    }

    /// Return the command text of a frame, or `None` if it should be ignored
    pub fn accept<'a>(&self, id: u32, payload: &'a [u8]) -> Option<&'a str> {
        if self.excluded_source == Some(Self::source_address(id)) {
            return None;
        }
        payload_text(payload)
    }
}

impl Default for CanCommandFilter {
    fn default() -> Self {
        Self::excluding(0x80)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(asm: &mut LineAssembler, bytes: &[u8]) -> Option<String<MAX_LINE_LEN>> {
        let mut last = None;
        for &b in bytes {
            if let Ok(Some(line)) = asm.feed(b) {
                last = Some(line);
            }
        }
        last
    }

    #[test]
    fn test_assembles_line() {
        let mut asm = LineAssembler::new();
        let line = feed_all(&mut asm, b"G28\n").unwrap();
        assert_eq!(line.as_str(), "G28");
        assert_eq!(asm.pending(), 0);
    }

    #[test]
    fn test_ignores_carriage_return() {
        let mut asm = LineAssembler::new();
        let line = feed_all(&mut asm, b"G0 Y100\r\n").unwrap();
        assert_eq!(line.as_str(), "G0 Y100");
    }

    #[test]
    fn test_partial_line_is_pending() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.feed(b'M'), Ok(None));
        assert_eq!(asm.feed(b'5'), Ok(None));
        assert_eq!(asm.pending(), 2);
    }

    #[test]
    fn test_overflow_discards_rest_of_line() {
        let mut asm = LineAssembler::new();

        for _ in 0..MAX_LINE_LEN {
            assert_eq!(asm.feed(b'Y'), Ok(None));
        }
        assert_eq!(asm.feed(b'Y'), Err(LineError::Overflow));
        // Further bytes on the same line are silently dropped
        assert_eq!(asm.feed(b'Y'), Ok(None));
        assert_eq!(asm.feed(b'\n'), Ok(None));

        // Next line is unaffected
        let line = feed_all(&mut asm, b"M5\n").unwrap();
        assert_eq!(line.as_str(), "M5");
    }

    #[test]
    fn test_invalid_utf8() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.feed(0xFF), Ok(None));
        assert_eq!(asm.feed(b'\n'), Err(LineError::InvalidUtf8));
        assert_eq!(asm.pending(), 0);
    }

    #[test]
    fn test_payload_text_trims_nul() {
        assert_eq!(payload_text(b"M5\0\0\0\0\0\0"), Some("M5"));
        assert_eq!(payload_text(b"G28"), Some("G28"));
        assert_eq!(payload_text(b"\0\0"), Some(""));
        assert_eq!(payload_text(&[0xC3, 0x28]), None);
    }

    #[test]
    fn test_can_source_address() {
        assert_eq!(CanCommandFilter::source_address(0x18EF_2080), 0x80);
        assert_eq!(CanCommandFilter::source_address(0x0000_0012), 0x12);
    }

    #[test]
    fn test_can_filter_drops_excluded_source() {
        let filter = CanCommandFilter::default();
        assert_eq!(filter.accept(0x18EF_2080, b"M5"), None);
        assert_eq!(filter.accept(0x18EF_2081, b"M5"), Some("M5"));
    }

    #[test]
    fn test_can_filter_accept_all() {
        let filter = CanCommandFilter::accept_all();
        assert_eq!(filter.accept(0x18EF_2080, b"M5"), Some("M5"));
    }
}
