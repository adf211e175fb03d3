use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::field::Field;

/// Separates the start, center and end segments of a status line.
pub const SEPARATOR: char = '\x1f';

/// Joins fields that share one position.
const FIELD_GAP: &str = "  ";

/// Which fields are shown at the start, center and end of the bar.
///
/// An empty layout means passthrough: standard input is the status, verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub start: Vec<Field>,
    pub center: Vec<Field>,
    pub end: Vec<Field>,
}

impl Layout {
    pub fn is_passthrough(&self) -> bool {
        self.start.is_empty() && self.center.is_empty() && self.end.is_empty()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields().any(|f| f == field)
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.start
            .iter()
            .chain(&self.center)
            .chain(&self.end)
            .copied()
    }

    /// Whether lines read from standard input end up on the bar.
    pub fn reads_stdin(&self) -> bool {
        self.is_passthrough() || self.contains(Field::Stdin)
    }
}

#[derive(Debug, Default)]
struct State {
    raw: Arc<str>,
    fields: HashMap<Field, String>,
}

/// The shared status text.
///
/// Producers write from their own threads; the dispatch thread takes a snapshot once per render
/// pass. The lock is only held to copy text in or out.
#[derive(Debug, Default)]
pub struct ContentModel {
    layout: Layout,
    state: Mutex<State>,
}

impl ContentModel {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            state: Mutex::default(),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Stores a line received on standard input.
    pub fn set_status(&self, raw: &str) {
        if self.layout.is_passthrough() {
            self.lock().raw = Arc::from(raw);
        } else {
            self.publish(Field::Stdin, raw);
        }
    }

    /// Stores the text of one field. Separators inside it become spaces so it stays in its segment.
    pub fn publish(&self, field: Field, text: impl Into<String>) {
        let mut text = text.into();
        if text.contains(SEPARATOR) {
            text = text.replace(SEPARATOR, " ");
        }
        self.lock().fields.insert(field, text);
    }

    /// The status line as it should be drawn right now.
    pub fn status(&self) -> Arc<str> {
        let state = self.lock();
        if self.layout.is_passthrough() {
            return Arc::clone(&state.raw);
        }

        let compose = |fields: &[Field]| {
            fields
                .iter()
                .filter_map(|field| state.fields.get(field))
                .filter(|text| !text.is_empty())
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(FIELD_GAP)
        };

        let status = [
            compose(&self.layout.start),
            compose(&self.layout.center),
            compose(&self.layout.end),
        ]
        .join(&*SEPARATOR.to_string());

        Arc::from(status)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Splits a status line into at most three segments.
///
/// The third segment stops at any further separator; whatever follows it is dropped.
pub fn split_segments(status: &str) -> Vec<&str> {
    let mut segments = Vec::with_capacity(3);
    let mut rest = Some(status);

    while let Some(text) = rest {
        if segments.len() == 3 {
            break;
        }
        match text.split_once(SEPARATOR) {
            Some((segment, tail)) => {
                segments.push(segment);
                rest = Some(tail);
            }
            None => {
                segments.push(text);
                rest = None;
            }
        }
    }

    segments
}
