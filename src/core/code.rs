//! Mapping code decoding.
//!
//! A code looks like `F9-PC-09-PENPLACONTOT` or `SA-PC-02-IIUBTICTYMYE3`:
//! form marker, return kind, an optional section, and the field name. The
//! field name is always the last hyphen segment.

use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

static CODE_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<form>[^-]+)-(?P<kind>[^-]+)-(?:.*-)?(?P<name>[^-]*)$")
        .expect("code pattern is valid")
});

/// Which return a code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnKind {
    /// Form 990 (public charity)
    Pc,
    /// Form 990-EZ
    Ez,
    /// Form 990-PF
    Pf,
}

impl ReturnKind {
    fn parse(marker: &str) -> Option<Self> {
        match marker.to_ascii_uppercase().as_str() {
            "PC" => Some(Self::Pc),
            "EZ" => Some(Self::Ez),
            "PF" => Some(Self::Pf),
            _ => None,
        }
    }
}

/// Schedules attached to a return, `SA` through `SR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScheduleKind {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
}

impl ScheduleKind {
    const ALL: [ScheduleKind; 18] = [
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::G,
        Self::H,
        Self::I,
        Self::J,
        Self::K,
        Self::L,
        Self::M,
        Self::N,
        Self::O,
        Self::P,
        Self::Q,
        Self::R,
    ];

    fn from_letter(letter: char) -> Option<Self> {
        let offset = (letter as u32).checked_sub('A' as u32)?;
        Self::ALL.get(offset as usize).copied()
    }

    pub fn letter(self) -> char {
        (b'A' + self as u8) as char
    }
}

/// The marker used in codes and in the record's `type` field, e.g. `SA`.
impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.letter())
    }
}

impl Serialize for ScheduleKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The form a code's field lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormKind {
    /// `F9`: the main 990, 990-EZ or 990-PF form.
    Main,
    Schedule(ScheduleKind),
}

impl FormKind {
    pub fn parse(marker: &str) -> Option<Self> {
        let marker = marker.to_ascii_uppercase();
        if marker == "F9" {
            return Some(Self::Main);
        }
        let mut chars = marker.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some('S'), Some(letter), None) => ScheduleKind::from_letter(letter).map(Self::Schedule),
            _ => None,
        }
    }
}

/// A mapping code split into its routing parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCode {
    pub form: FormKind,
    pub kind: ReturnKind,
    /// Last hyphen segment with non-ASCII characters removed.
    pub name: String,
}

impl DecodedCode {
    /// `None` when the code does not have the `<FORM>-<TYPE>-...-<NAME>` shape
    /// or names a form marker outside the known set.
    pub fn parse(code: &str) -> Option<Self> {
        let captures = CODE_SHAPE.captures(code)?;
        let form = FormKind::parse(&captures["form"])?;
        let kind = ReturnKind::parse(&captures["kind"])?;
        let name = strip_non_ascii(&captures["name"]);
        if name.is_empty() {
            return None;
        }
        Some(Self { form, kind, name })
    }
}

/// Field name used inside group rows: the final hyphen segment of a code with
/// at least three segments.
pub fn field_name(code: &str) -> Option<String> {
    let mut segments = code.rsplit('-');
    let name = segments.next()?;
    if segments.count() < 2 {
        return None;
    }
    Some(strip_non_ascii(name))
}

fn strip_non_ascii(raw: &str) -> String {
    raw.chars().filter(char::is_ascii).collect()
}
