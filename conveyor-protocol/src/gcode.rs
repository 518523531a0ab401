//! G-code/M-code line decoding
//!
//! A line is split into words (a letter followed by an optional number) by
//! [`Words`]. [`parse`] then picks the command kind from the `G` or `M` word
//! and the parameters from the `Y`, `S` and `P` words.
//!
//! Decoding never fails: anything that is not a recognized command becomes
//! [`CommandKind::Unknown`], and a malformed number is treated as if the
//! letter had not been supplied.

use core::fmt;

use heapless::Vec;

/// Maximum number of words kept from a single line
pub const MAX_WORDS: usize = 16;

/// Start of a trailing comment
pub const COMMENT_CHAR: char = ';';

/// Remove a trailing `;` comment and surrounding whitespace
pub fn strip_comment(line: &str) -> &str {
    let code = match line.find(COMMENT_CHAR) {
        Some(idx) => &line[..idx],
        None => line,
    };
    code.trim()
}

/// A single letter/value pair
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Word {
    /// Upper-case letter code
    pub letter: char,
    /// Numeric value, `None` when missing or malformed
    pub value: Option<f32>,
}

/// Letter to value mapping for one line
///
/// A word starts at every ASCII letter, so `G0 Y100` and `G0Y100` decode the
/// same way. When a letter appears twice the first occurrence is kept.
#[derive(Debug, Clone, Default)]
pub struct Words {
    words: Vec<Word, MAX_WORDS>,
}

impl Words {
    /// Tokenize a line (comments should already be stripped)
    pub fn parse(code: &str) -> Self {
        let mut words: Vec<Word, MAX_WORDS> = Vec::new();
        let bytes = code.as_bytes();
        let mut i = 0;

        while i < bytes.len() {
            if !bytes[i].is_ascii_alphabetic() {
                i += 1;
                continue;
            }

            let letter = bytes[i].to_ascii_uppercase() as char;
            i += 1;

            // Allow "Y 100" as well as "Y100"
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }

            let start = i;
            while i < bytes.len()
                && !bytes[i].is_ascii_alphabetic()
                && !bytes[i].is_ascii_whitespace()
            {
                i += 1;
            }

            let value = code[start..i]
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite());

            if words.iter().any(|w| w.letter == letter) {
                continue;
            }
            if words.push(Word { letter, value }).is_err() {
                break;
            }
        }

        Self { words }
    }

    /// Look up the word for a letter (case-insensitive)
    pub fn get(&self, letter: char) -> Option<&Word> {
        let letter = letter.to_ascii_uppercase();
        self.words.iter().find(|w| w.letter == letter)
    }

    /// Numeric value for a letter, `None` if absent or malformed
    pub fn value(&self, letter: char) -> Option<f32> {
        self.get(letter).and_then(|w| w.value)
    }

    /// Check whether the letter appeared at all
    pub fn contains(&self, letter: char) -> bool {
        self.get(letter).is_some()
    }

    /// Number of distinct letters on the line
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if the line carried no words
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Iterate over words in line order
    pub fn iter(&self) -> impl Iterator<Item = &Word> {
        self.words.iter()
    }
}

/// Recognized command kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandKind {
    /// G28: home the width axis
    Home,
    /// G0: move the width axis to `Y`
    MoveTo,
    /// M5: stop the conveyor
    SpindleStop,
    /// M4: run the conveyor left
    SpindleLeft,
    /// M3: run the conveyor right
    SpindleRight,
    /// M50: load a board to the middle position now
    LoadToMiddleNow,
    /// M51: load a board to the middle once upstream is ready
    LoadToMiddle,
    /// M52: load a board through to the exit sensor now
    LoadToEndNow,
    /// M53: move a board already on the conveyor to the exit sensor
    MoveToEnd,
    /// M54: unload the board now
    UnloadNow,
    /// M55: unload the board once downstream is ready
    Unload,
    /// M56: unload, pause `P` seconds, repeat
    UnloadTimed,
    /// M57: buffer boards between upstream and downstream
    Buffer,
    /// M58: buffer boards, releasing one every `P` seconds
    BufferTimed,
    /// Anything else
    Unknown,
}

impl CommandKind {
    /// Map a `G` code
    pub fn from_g(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::MoveTo),
            28 => Some(Self::Home),
            _ => None,
        }
    }

    /// Map an `M` code
    pub fn from_m(code: u16) -> Option<Self> {
        match code {
            3 => Some(Self::SpindleRight),
            4 => Some(Self::SpindleLeft),
            5 => Some(Self::SpindleStop),
            50 => Some(Self::LoadToMiddleNow),
            51 => Some(Self::LoadToMiddle),
            52 => Some(Self::LoadToEndNow),
            53 => Some(Self::MoveToEnd),
            54 => Some(Self::UnloadNow),
            55 => Some(Self::Unload),
            56 => Some(Self::UnloadTimed),
            57 => Some(Self::Buffer),
            58 => Some(Self::BufferTimed),
            _ => None,
        }
    }

    /// Wire letter and number for this kind
    pub fn code(self) -> Option<(char, u16)> {
        let code = match self {
            Self::MoveTo => ('G', 0),
            Self::Home => ('G', 28),
            Self::SpindleRight => ('M', 3),
            Self::SpindleLeft => ('M', 4),
            Self::SpindleStop => ('M', 5),
            Self::LoadToMiddleNow => ('M', 50),
            Self::LoadToMiddle => ('M', 51),
            Self::LoadToEndNow => ('M', 52),
            Self::MoveToEnd => ('M', 53),
            Self::UnloadNow => ('M', 54),
            Self::Unload => ('M', 55),
            Self::UnloadTimed => ('M', 56),
            Self::Buffer => ('M', 57),
            Self::BufferTimed => ('M', 58),
            Self::Unknown => return None,
        };
        Some(code)
    }

    /// Direct conveyor control (M3/M4/M5)
    pub fn is_spindle(self) -> bool {
        matches!(
            self,
            Self::SpindleStop | Self::SpindleLeft | Self::SpindleRight
        )
    }

    /// Board transport sequences (M50-M58)
    pub fn is_transport(self) -> bool {
        matches!(
            self,
            Self::LoadToMiddleNow
                | Self::LoadToMiddle
                | Self::LoadToEndNow
                | Self::MoveToEnd
                | Self::UnloadNow
                | Self::Unload
                | Self::UnloadTimed
                | Self::Buffer
                | Self::BufferTimed
        )
    }
}

/// A decoded command line
///
/// Parameters are `None` when the line did not supply them. The sequencer
/// substitutes prior or default values; a missing parameter is never zero.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    /// What to do
    pub kind: CommandKind,
    /// `Y`: axis target in mm
    pub position: Option<f32>,
    /// `S`: conveyor speed
    pub speed: Option<u16>,
    /// `P`: pause in seconds
    pub pause: Option<f32>,
}

impl Command {
    /// Create a command with no parameters
    pub const fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            position: None,
            speed: None,
            pause: None,
        }
    }

    /// Set the `Y` parameter
    pub fn with_position(mut self, mm: f32) -> Self {
        self.position = Some(mm);
        self
    }

    /// Set the `S` parameter
    pub fn with_speed(mut self, speed: u16) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Set the `P` parameter
    pub fn with_pause(mut self, seconds: f32) -> Self {
        self.pause = Some(seconds);
        self
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        if let Some((letter, code)) = self.kind.code() {
            write!(f, "{}{}", letter, code)?;
            sep = " ";
        }
        if let Some(y) = self.position {
            write!(f, "{}Y{}", sep, y)?;
            sep = " ";
        }
        if let Some(s) = self.speed {
            write!(f, "{}S{}", sep, s)?;
            sep = " ";
        }
        if let Some(p) = self.pause {
            write!(f, "{}P{}", sep, p)?;
        }
        Ok(())
    }
}

/// Convert a `G`/`M` value to a code number, rejecting fractional codes
fn integral_code(value: f32) -> Option<u16> {
    if !(0.0..=u16::MAX as f32).contains(&value) {
        return None;
    }
    let code = value as u16;
    if code as f32 == value {
        Some(code)
    } else {
        None
    }
}

/// Decode one command line
///
/// A recognized `G` code takes precedence over an `M` code on the same line.
pub fn parse(line: &str) -> Command {
    let words = Words::parse(strip_comment(line));

    let kind = words
        .value('G')
        .and_then(integral_code)
        .and_then(CommandKind::from_g)
        .or_else(|| {
            words
                .value('M')
                .and_then(integral_code)
                .and_then(CommandKind::from_m)
        })
        .unwrap_or(CommandKind::Unknown);

    Command {
        kind,
        position: words.value('Y'),
        // Saturating cast so that out-of-range speeds still reach validation
        speed: words.value('S').map(|s| s as u16),
        pause: words.value('P'),
    }
}
