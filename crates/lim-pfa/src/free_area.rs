//! Per-order free lists
//!
//! Each `FreeArea` is the head of an intrusive doubly-linked list of free
//! block heads plus its length. Pushes and pops happen at the head.

use crate::frame::FrameDescriptor;

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct FreeArea {
    pub head: Option<usize>,
    pub nr_free: u64,
}

impl FreeArea {
    pub const fn new() -> Self {
        Self {
            head: None,
            nr_free: 0,
        }
    }

    pub fn push(&mut self, frames: &mut [FrameDescriptor], idx: usize) {
        frames[idx].prev = None;
        frames[idx].next = self.head;
        if let Some(old) = self.head {
            frames[old].prev = Some(idx);
        }
        self.head = Some(idx);
        self.nr_free += 1;
    }

    pub fn pop(&mut self, frames: &mut [FrameDescriptor]) -> Option<usize> {
        let idx = self.head?;
        self.remove(frames, idx);
        Some(idx)
    }

    /// Unlink `idx`, which must be on this list.
    pub fn remove(&mut self, frames: &mut [FrameDescriptor], idx: usize) {
        let (prev, next) = (frames[idx].prev, frames[idx].next);
        match prev {
            Some(p) => frames[p].next = next,
            None => self.head = next,
        }
        if let Some(n) = next {
            frames[n].prev = prev;
        }
        frames[idx].prev = None;
        frames[idx].next = None;
        self.nr_free -= 1;
    }

    /// Iterate the list from the head.
    pub fn iter<'a>(&self, frames: &'a [FrameDescriptor]) -> FreeListIter<'a> {
        FreeListIter {
            frames,
            cursor: self.head,
        }
    }
}

pub(crate) struct FreeListIter<'a> {
    frames: &'a [FrameDescriptor],
    cursor: Option<usize>,
}

impl Iterator for FreeListIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let idx = self.cursor?;
        self.cursor = self.frames.get(idx).and_then(|f| f.next);
        Some(idx)
    }
}
