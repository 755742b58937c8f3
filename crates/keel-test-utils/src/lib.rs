//! Test utilities and mock types for Keel development.
//!
//! Provides a grid-backed [`MockMap`] implementing
//! [`MapQuery`](keel_sim::MapQuery), reusable behaviors in [`fixtures`],
//! and proptest strategies in [`strategies`].

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod strategies;

pub use fixtures::{builder_and_site, medic_and_patient, FailingBehavior, TouchBehavior};

use keel_sim::MapQuery;

/// Map parsed from ASCII rows: `.` is walkable, anything else blocks.
///
/// Rows shorter than the widest one are padded with blocked cells.
#[derive(Clone, Debug, Default)]
pub struct MockMap {
    width: u32,
    cells: Vec<Vec<bool>>,
}

impl MockMap {
    pub fn from_rows(rows: &[&str]) -> Self {
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as u32;
        let cells = rows
            .iter()
            .map(|r| r.chars().map(|c| c == '.').collect())
            .collect();
        Self { width, cells }
    }

    /// A fully walkable `width` x `height` map.
    pub fn open(width: u32, height: u32) -> Self {
        Self {
            width,
            cells: vec![vec![true; width as usize]; height as usize],
        }
    }
}

impl MapQuery for MockMap {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.cells.len() as u32)
    }

    fn is_walkable(&self, x: u32, y: u32) -> bool {
        self.cells
            .get(y as usize)
            .and_then(|row| row.get(x as usize))
            .copied()
            .unwrap_or(false)
    }
}
