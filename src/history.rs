//! Per-console command history ring.

/// Longest line a console buffers.
pub const MAX_LINE: usize = 64;

/// Number of remembered lines per console.
pub const MAX_HISTORY: usize = 4;

pub type Line = heapless::Vec<u8, MAX_LINE>;

/// Ring of recently entered lines with an up/down recall cursor.
///
/// The cursor points one past the entry that [History::older] will show
/// next.
#[derive(Debug, Default)]
pub struct History {
    entries: [Line; MAX_HISTORY],
    len: usize,
    /// Slot the next new line is written to.
    next: usize,
    cursor: usize,
}

impl History {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored lines, at most [MAX_HISTORY].
    pub fn len(&self) -> usize {
        self.len
    }

    /// Nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remember a submitted line.
    ///
    /// A line already present (ignoring ASCII case) is not stored again;
    /// the cursor is moved so that [History::older] returns it.
    pub fn record(&mut self, line: &[u8]) {
        if let Some(index) = self.entries[..self.len]
            .iter()
            .position(|entry| entry.eq_ignore_ascii_case(line))
        {
            self.cursor = index + 1;
            return;
        }

        if self.next >= MAX_HISTORY {
            self.next = 0;
        }
        let slot = &mut self.entries[self.next];
        slot.clear();
        let _ = slot.extend_from_slice(&line[..line.len().min(MAX_LINE)]);

        self.next += 1;
        self.len = (self.len + 1).min(MAX_HISTORY);
        self.cursor = self.next;
    }

    /// Step back one entry, wrapping to the newest slot.
    pub fn older(&mut self) -> Option<&[u8]> {
        if self.is_empty() {
            return None;
        }
        if self.cursor == 0 {
            self.cursor = self.len;
        }
        self.cursor -= 1;
        Some(&self.entries[self.cursor])
    }

    /// Step forward one entry, wrapping to the first slot.
    pub fn newer(&mut self) -> Option<&[u8]> {
        if self.is_empty() {
            return None;
        }
        self.cursor += 1;
        if self.cursor >= self.len {
            self.cursor = 0;
        }
        Some(&self.entries[self.cursor])
    }
}
