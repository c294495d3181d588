use std::collections::VecDeque;

use crate::record::ImageRecord;

pub const HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Stored as the newest entry; cursor moved onto it.
    Appended,
    /// Forward neighbour was the same image; cursor moved onto it instead.
    Advanced,
    /// Same image as the live edge; nothing changed.
    Duplicate,
}

/// Previously shown images plus a cursor. Oldest entries fall off the front.
#[derive(Default)]
pub struct HistoryNavigator {
    entries: VecDeque<ImageRecord>,
    cursor: Option<usize>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&ImageRecord> {
        self.cursor.and_then(|c| self.entries.get(c))
    }

    /// 1-based position of the cursor and the history length.
    pub fn position(&self) -> Option<(usize, usize)> {
        self.cursor.map(|c| (c + 1, self.entries.len()))
    }

    pub fn can_go_back(&self) -> bool {
        matches!(self.cursor, Some(c) if c > 0)
    }

    pub fn go_back(&mut self) -> Option<&ImageRecord> {
        if !self.can_go_back() {
            return None;
        }
        let c = self.cursor? - 1;
        self.cursor = Some(c);
        self.entries.get(c)
    }

    pub fn can_go_forward(&self) -> bool {
        matches!(self.cursor, Some(c) if c + 1 < self.entries.len())
    }

    pub fn go_forward(&mut self) -> Option<&ImageRecord> {
        if !self.can_go_forward() {
            return None;
        }
        let c = self.cursor? + 1;
        self.cursor = Some(c);
        self.entries.get(c)
    }

    /// Record a freshly shown image.
    pub fn record_new(&mut self, record: ImageRecord) -> RecordOutcome {
        if let Some(c) = self.cursor {
            if let Some(next) = self.entries.get(c + 1) {
                if next.source_url() == record.source_url() {
                    self.cursor = Some(c + 1);
                    return RecordOutcome::Advanced;
                }
                // Forward history was never revisited; drop it.
                self.entries.truncate(c + 1);
            } else if self.entries[c].source_url() == record.source_url() {
                return RecordOutcome::Duplicate;
            }
        }

        self.entries.push_back(record);
        self.cursor = Some(self.entries.len() - 1);

        let mut evicted = 0;
        while self.entries.len() > HISTORY_CAPACITY {
            self.entries.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            self.cursor = self.cursor.map(|c| c.saturating_sub(evicted));
        }
        RecordOutcome::Appended
    }
}
