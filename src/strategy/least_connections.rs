// src/strategy/least_connections.rs
use super::algorithm::{classify, Candidate, Cursor, Strategy};
use crate::backend::Item;
use std::sync::Arc;
use std::time::Duration;

/// Sweeps the whole pool and picks the Alive item with the fewest in-flight
/// calls. A canary found during the sweep is returned immediately.
///
/// Ties go to the first item seen from the cursor position.
#[derive(Debug)]
pub struct LeastConnections {
    items: Arc<[Arc<Item>]>,
    cursor: Cursor,
    cooldown: Duration,
}

impl LeastConnections {
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

impl Strategy for LeastConnections {
    fn next(&self) -> Option<Arc<Item>> {
        let len = self.items.len();
        if len == 0 {
            return None;
        }

        let mut best: Option<(&Arc<Item>, i64)> = None;
        for _ in 0..len {
            let item = &self.items[self.cursor.advance(len)];
            match classify(item, self.cooldown) {
                Candidate::Canary => return Some(item.clone()),
                Candidate::Skip => continue,
                Candidate::Alive => {
                    let conns = item.connections();
                    if best.map_or(true, |(_, min)| conns < min) {
                        best = Some((item, conns));
                    }
                }
            }
        }
        best.map(|(item, _)| item.clone())
    }

    fn name(&self) -> &'static str {
        "least_connections"
    }
}
