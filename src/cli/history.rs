//! Newest-first command history packed into a fixed buffer.
//!
//! Entries are stored back-to-back as a length prefix plus raw bytes, newest
//! at offset zero. Pushing shifts old entries back and silently drops those
//! that no longer fit. The navigation index counts recalls: 0 means no entry
//! is recalled, `entries` means the oldest.

use super::cursor::Cursor;

pub struct History<const N: usize> {
    buf: [u8; N],
    entries: u8,
    index: u8,
}

impl<const N: usize> History<N> {
    pub fn new() -> Self {
        Self {
            buf: [0; N],
            entries: 0,
            index: 0,
        }
    }

    pub fn reset_index(&mut self) {
        self.index = 0;
    }

    pub fn has_prev(&self) -> bool {
        self.index < self.entries
    }

    pub fn has_next(&self) -> bool {
        self.index > 0
    }

    /// Record a line as the newest entry and reset navigation.
    pub fn push(&mut self, line: &str) {
        if N == 0 {
            return;
        }
        // Clamp the entry to the buffer, excluding its prefix byte
        let size = line.len().min(N - 1);
        let available = N - (size + 1);

        // Count how many old entries survive the shift
        let mut old_size = 0;
        for entry in 0..self.entries {
            let entry_size = 1 + self.buf[old_size] as usize;
            if old_size + entry_size > available {
                self.entries = entry;
                break;
            }
            old_size += entry_size;
        }

        self.buf.copy_within(0..old_size, size + 1);
        self.buf[0] = size as u8;
        self.buf[1..1 + size].copy_from_slice(&line.as_bytes()[..size]);
        self.entries += 1;
        self.reset_index();
    }

    fn copy_entry<const M: usize>(&self, entry: u8, cursor: &mut Cursor<M>) {
        if entry >= self.entries {
            return;
        }
        let mut offset = 0;
        for _ in 0..entry {
            offset += 1 + self.buf[offset] as usize;
        }
        let size = self.buf[offset] as usize;
        let bytes = &self.buf[offset + 1..offset + 1 + size];
        cursor.clear();
        cursor.insert_str(std::str::from_utf8(bytes).expect("history holds printable ASCII"));
    }

    /// Recall the next-older entry into `cursor`.
    pub fn copy_prev<const M: usize>(&mut self, cursor: &mut Cursor<M>) {
        if self.index < self.entries {
            self.copy_entry(self.index, cursor);
            self.index += 1;
        }
    }

    /// Recall the next-newer entry into `cursor`; at index 0 the line is left
    /// cleared by the caller.
    pub fn copy_next<const M: usize>(&mut self, cursor: &mut Cursor<M>) {
        if self.index > 0 {
            self.index -= 1;
            if self.index > 0 {
                self.copy_entry(self.index - 1, cursor);
            }
        }
    }
}

impl<const N: usize> Default for History<N> {
    fn default() -> Self {
        Self::new()
    }
}
