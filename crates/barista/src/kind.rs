//! Item kinds and per-kind storage.
//!
//! Every counter in the café is tracked per [`Kind`]. [`PerKind`] is the
//! fixed-size map used for those counters, for per-kind configuration, and for
//! parsed order quantities.

use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// One of the two item categories the café prepares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Tea,
    Coffee,
}

impl Kind {
    /// Both kinds, in a stable order.
    pub const ALL: [Kind; 2] = [Kind::Tea, Kind::Coffee];

    /// Lower-case singular name, as used in commands and summaries.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Tea => "tea",
            Kind::Coffee => "coffee",
        }
    }

    /// Capitalised name for the start of a notice.
    pub fn label(self) -> &'static str {
        match self {
            Kind::Tea => "Tea",
            Kind::Coffee => "Coffee",
        }
    }

    /// Recognise a single command word as a kind.
    ///
    /// Accepts the singular and plural forms, ignoring case and any
    /// surrounding punctuation (`"Teas,"` is tea).
    pub fn from_word(word: &str) -> Option<Kind> {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric());
        let singular = word.strip_suffix(['s', 'S']).unwrap_or(word);
        Kind::ALL.into_iter().find(|kind| {
            word.eq_ignore_ascii_case(kind.name()) || singular.eq_ignore_ascii_case(kind.name())
        })
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value for each [`Kind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerKind<T> {
    pub tea: T,
    pub coffee: T,
}

impl<T> PerKind<T> {
    pub const fn new(tea: T, coffee: T) -> Self {
        Self { tea, coffee }
    }

    /// Build a map by evaluating `f` once per kind.
    pub fn from_fn(mut f: impl FnMut(Kind) -> T) -> Self {
        Self {
            tea: f(Kind::Tea),
            coffee: f(Kind::Coffee),
        }
    }

    /// Iterate `(kind, &value)` pairs in [`Kind::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Kind, &T)> {
        Kind::ALL.into_iter().map(move |kind| (kind, &self[kind]))
    }
}

impl PerKind<u32> {
    /// Sum across kinds.
    pub fn total(&self) -> u32 {
        self.tea.saturating_add(self.coffee)
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl<T> Index<Kind> for PerKind<T> {
    type Output = T;

    fn index(&self, kind: Kind) -> &T {
        match kind {
            Kind::Tea => &self.tea,
            Kind::Coffee => &self.coffee,
        }
    }
}

impl<T> IndexMut<Kind> for PerKind<T> {
    fn index_mut(&mut self, kind: Kind) -> &mut T {
        match kind {
            Kind::Tea => &mut self.tea,
            Kind::Coffee => &mut self.coffee,
        }
    }
}

/// Renders counts the way status lines show them: `"2 tea(s), 1 coffee(s)"`.
impl fmt::Display for PerKind<u32> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} tea(s), {} coffee(s)", self.tea, self.coffee)
    }
}
