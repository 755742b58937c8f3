//! Derived map data computed off the simulation thread.
//!
//! A [`TerrainWorker`] reads a [`MapQuery`] on a background thread and
//! sends back an immutable [`TerrainSummary`] over a bounded channel. The
//! worker never sees the heap: the simulation thread polls for the result
//! and registers it with [`Scenario::attach_terrain`](crate::Scenario::attach_terrain),
//! after which it is part of the deterministic state.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::debug;

use keel_core::ObjectId;
use keel_heap::{ArrayField, Constructor, HeapError, HeapObject, ScalarField, SimHeap};

use crate::error::SimError;

/// Read-only access to map terrain.
pub trait MapQuery: Send + Sync {
    /// `(width, height)` in cells.
    fn dimensions(&self) -> (u32, u32);

    /// Whether ground units can enter cell `(x, y)`.
    fn is_walkable(&self, x: u32, y: u32) -> bool;
}

/// Walkable cell counts per map row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerrainSummary {
    width: u32,
    walkable_per_row: Vec<u32>,
}

impl TerrainSummary {
    /// Scan `map` row by row.
    pub fn compute(map: &dyn MapQuery) -> Self {
        let (width, height) = map.dimensions();
        let walkable_per_row = (0..height)
            .map(|y| (0..width).filter(|&x| map.is_walkable(x, y)).count() as u32)
            .collect();
        Self {
            width,
            walkable_per_row,
        }
    }

    /// Map width in cells.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Map height in cells.
    pub fn height(&self) -> u32 {
        self.walkable_per_row.len() as u32
    }

    /// Walkable cells in each row, top to bottom.
    pub fn walkable_per_row(&self) -> &[u32] {
        &self.walkable_per_row
    }

    /// Walkable cells on the whole map.
    pub fn total_walkable(&self) -> u64 {
        self.walkable_per_row.iter().map(|&n| u64::from(n)).sum()
    }
}

/// Background computation of a [`TerrainSummary`].
pub struct TerrainWorker {
    rx: Receiver<TerrainSummary>,
    handle: Option<JoinHandle<()>>,
}

impl TerrainWorker {
    /// Start scanning `map` on a new thread.
    pub fn spawn(map: Arc<dyn MapQuery>) -> Result<Self, SimError> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let handle = thread::Builder::new()
            .name("keel-terrain".into())
            .spawn(move || {
                let summary = TerrainSummary::compute(map.as_ref());
                // The receiver may already be gone; nothing to report to.
                let _ = tx.send(summary);
            })
            .map_err(|e| SimError::WorkerSpawnFailed {
                reason: e.to_string(),
            })?;
        Ok(Self {
            rx,
            handle: Some(handle),
        })
    }

    /// The summary if it is ready, without blocking.
    pub fn poll(&mut self) -> Result<Option<TerrainSummary>, SimError> {
        match self.rx.try_recv() {
            Ok(summary) => {
                self.join();
                Ok(Some(summary))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                self.join();
                Err(SimError::WorkerDisconnected)
            }
        }
    }

    /// Block until the summary is ready.
    pub fn wait(mut self) -> Result<TerrainSummary, SimError> {
        let result = self.rx.recv().map_err(|_| SimError::WorkerDisconnected);
        self.join();
        result
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                debug!("terrain worker panicked");
            }
        }
    }
}

impl Drop for TerrainWorker {
    fn drop(&mut self) {
        self.join();
    }
}

/// A [`TerrainSummary`] registered in the heap.
#[derive(Clone, Copy, Debug)]
pub struct TerrainRecord {
    id: ObjectId,
    width: ScalarField<u32>,
    walkable_per_row: ArrayField<u32>,
}

impl TerrainRecord {
    /// Map width in cells.
    pub fn width(&self, heap: &SimHeap) -> Result<u32, HeapError> {
        self.width.get(heap)
    }

    /// Map height in cells.
    pub fn height(&self) -> usize {
        self.walkable_per_row.len()
    }

    /// Walkable cells in row `y`.
    pub fn walkable_in_row(&self, heap: &SimHeap, y: usize) -> Result<u32, HeapError> {
        self.walkable_per_row.get(heap, y)
    }
}

impl HeapObject for TerrainRecord {
    type Args = TerrainSummary;

    fn construct(ctor: &mut Constructor<'_>, summary: TerrainSummary) -> Result<Self, HeapError> {
        Ok(Self {
            id: ctor.owner(),
            width: ctor.field_with("width", summary.width)?,
            walkable_per_row: ctor.array_field_with("walkable_per_row", &summary.walkable_per_row)?,
        })
    }

    fn object_id(&self) -> ObjectId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_heap::HeapConfig;

    /// Walkable wherever `x >= y`.
    struct Triangle(u32);

    impl MapQuery for Triangle {
        fn dimensions(&self) -> (u32, u32) {
            (self.0, self.0)
        }

        fn is_walkable(&self, x: u32, y: u32) -> bool {
            x >= y
        }
    }

    #[test]
    fn summary_counts_rows() {
        let summary = TerrainSummary::compute(&Triangle(4));
        assert_eq!(summary.walkable_per_row(), [4, 3, 2, 1]);
        assert_eq!(summary.total_walkable(), 10);
        assert_eq!((summary.width(), summary.height()), (4, 4));
    }

    #[test]
    fn worker_delivers_summary() {
        let worker = TerrainWorker::spawn(Arc::new(Triangle(3))).unwrap();
        let summary = worker.wait().unwrap();
        assert_eq!(summary.walkable_per_row(), [3, 2, 1]);
    }

    #[test]
    fn poll_eventually_returns_summary() {
        let mut worker = TerrainWorker::spawn(Arc::new(Triangle(2))).unwrap();
        let summary = loop {
            if let Some(s) = worker.poll().unwrap() {
                break s;
            }
            thread::yield_now();
        };
        assert_eq!(summary.total_walkable(), 3);
    }

    #[test]
    fn record_stores_summary_in_heap() {
        let mut heap = SimHeap::new(HeapConfig::default()).unwrap();
        let record: TerrainRecord = heap
            .construct(TerrainSummary::compute(&Triangle(3)))
            .unwrap();
        assert_eq!(record.width(&heap).unwrap(), 3);
        assert_eq!(record.height(), 3);
        assert_eq!(record.walkable_in_row(&heap, 1).unwrap(), 2);
        assert!(matches!(
            record.walkable_in_row(&heap, 3),
            Err(HeapError::IndexOutOfBounds { .. })
        ));
    }
}
