use bytes::Bytes;
use serde::Serialize;

/// A file handed over by the picker surface, already read into memory.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl SelectedFile {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// How one entry's pipeline ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Done { id: String, url: String },
    Failed { id: String, error: String },
    /// The entry was removed before its pipeline settled.
    Vanished { id: String },
}

/// Summary of one selection once every entry has settled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub done: Vec<String>,
    pub failed: Vec<String>,
    pub vanished: Vec<String>,
}

impl BatchReport {
    pub fn from_outcomes(outcomes: Vec<EntryOutcome>) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            match outcome {
                EntryOutcome::Done { id, .. } => report.done.push(id),
                EntryOutcome::Failed { id, .. } => report.failed.push(id),
                EntryOutcome::Vanished { id } => report.vanished.push(id),
            }
        }
        report
    }

    pub fn len(&self) -> usize {
        self.done.len() + self.failed.len() + self.vanished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
