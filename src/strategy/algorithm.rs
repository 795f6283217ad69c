// src/strategy/algorithm.rs
use crate::backend::{Item, Status};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Selects the item that serves the next request.
///
/// Selection may move an Unalive item whose cooldown expired into Checking
/// and hand it out as a canary; every other call only reads item state.
pub trait Strategy: Send + Sync {
    /// Never inspects more than `len(items)` entries; `None` if nothing is eligible.
    fn next(&self) -> Option<Arc<Item>>;

    fn name(&self) -> &'static str;
}

/// Rotation cursor shared by the strategies. Wraps modulo the pool size.
#[derive(Debug, Default)]
pub struct Cursor {
    position: AtomicUsize,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(position: usize) -> Self {
        Self {
            position: AtomicUsize::new(position),
        }
    }

    /// Index to inspect next; advances the cursor by one.
    pub fn advance(&self, len: usize) -> usize {
        self.position.fetch_add(1, Ordering::Relaxed) % len
    }

    pub fn position(&self) -> usize {
        self.position.load(Ordering::Relaxed)
    }
}

/// What a sweep may do with one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Candidate {
    Alive,
    /// This caller moved the item into Checking and owns the probe.
    Canary,
    Skip,
}

pub(crate) fn classify(item: &Item, cooldown: Duration) -> Candidate {
    let (status, changed_at) = item.status();
    match status {
        Status::Alive => Candidate::Alive,
        Status::Unalive if changed_at.elapsed() > cooldown => {
            // Re-checked under the item's write lock; another caller may win.
            if item.try_begin_canary(cooldown) {
                Candidate::Canary
            } else {
                Candidate::Skip
            }
        }
        Status::Unalive | Status::Checking => Candidate::Skip,
    }
}
