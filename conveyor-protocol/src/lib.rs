//! PCB Conveyor Command Protocol
//!
//! This crate defines the text protocol spoken by the conveyor controller.
//! The same line format arrives over the serial console, CAN and MQTT, and
//! is decoded here into a typed [`Command`] before it reaches the sequencer.
//!
//! # Protocol Overview
//!
//! One command per line, words are a letter followed by a number:
//! ```text
//! G28                 ; home the width axis
//! G0 Y120.5           ; move the axis to 120.5 mm
//! M3 S1500            ; run the conveyor right at speed 1500
//! M56 S900 P10        ; unload a board, wait 10 s, repeat
//! ```
//!
//! Everything after `;` is a comment. Status text goes back out as
//! newline-terminated lines built from [`StatusEvent`].

#![no_std]
#![deny(unsafe_code)]

pub mod gcode;
pub mod status;
pub mod transport;

pub use gcode::{parse, strip_comment, Command, CommandKind, Words};
pub use status::{StatusEvent, MAX_STATUS_LEN};
pub use transport::{payload_text, CanCommandFilter, LineAssembler, LineError, MAX_LINE_LEN};
