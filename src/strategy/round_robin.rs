// src/strategy/round_robin.rs
use super::algorithm::{classify, Candidate, Cursor, Strategy};
use crate::backend::Item;
use std::sync::Arc;
use std::time::Duration;

/// Rotates through the pool, returning the first Alive item or canary.
#[derive(Debug)]
pub struct RoundRobin {
    items: Arc<[Arc<Item>]>,
    cursor: Cursor,
    cooldown: Duration,
}

impl RoundRobin {
    pub fn new(items: Arc<[Arc<Item>]>, cooldown: Duration) -> Self {
        Self::with_cursor(items, cooldown, Cursor::new())
    }

    pub fn with_cursor(items: Arc<[Arc<Item>]>, cooldown: Duration, cursor: Cursor) -> Self {
        Self {
            items,
            cursor,
            cooldown,
        }
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }
}

impl Strategy for RoundRobin {
    fn next(&self) -> Option<Arc<Item>> {
        let len = self.items.len();
        if len == 0 {
            return None;
        }

        for _ in 0..len {
            let item = &self.items[self.cursor.advance(len)];
            match classify(item, self.cooldown) {
                Candidate::Alive | Candidate::Canary => return Some(item.clone()),
                Candidate::Skip => continue,
            }
        }
        None
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}
