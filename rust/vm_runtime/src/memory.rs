//! Memory subsystem for the VM runtime.
//!
//! Memory is a flat, zero-indexed array of `i64` cells whose capacity is fixed
//! when an execution is launched. It never grows and never wraps: any access
//! outside `0..capacity` is reported as a [`MemoryError`] which the interpreter
//! surfaces as a runtime error. Every load and store made by an instruction
//! flows through here so the execution trace can account for memory traffic.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Zero cells appended after the argument block when the caller does not
/// choose a size.
pub const DEFAULT_MEMORY_CELLS: usize = 100_000;

/// Memory traffic snapshot emitted as part of the execution trace.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub loads: u64,
    pub stores: u64,
    /// One past the highest address written so far.
    pub high_water: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    cells: Vec<i64>,
    metrics: MemoryMetrics,
}

impl Memory {
    /// Zero-filled memory with `capacity` cells.
    pub fn new(capacity: usize) -> Self {
        Self::from_cells(vec![0; capacity])
    }

    /// Memory initialised from explicit contents; capacity is `cells.len()`.
    pub fn from_cells(cells: Vec<i64>) -> Self {
        Self {
            cells,
            metrics: MemoryMetrics::default(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    pub fn metrics(&self) -> MemoryMetrics {
        self.metrics
    }

    pub fn cells(&self) -> &[i64] {
        &self.cells
    }

    pub fn load(&mut self, address: i64) -> Result<i64, MemoryError> {
        let index = self.index(address)?;
        self.metrics.loads += 1;
        Ok(self.cells[index])
    }

    pub fn store(&mut self, address: i64, value: i64) -> Result<(), MemoryError> {
        let index = self.index(address)?;
        self.cells[index] = value;
        self.metrics.stores += 1;
        self.metrics.high_water = self.metrics.high_water.max(index + 1);
        Ok(())
    }

    /// Read a cell without accounting it as program traffic.
    pub fn peek(&self, address: i64) -> Option<i64> {
        usize::try_from(address)
            .ok()
            .and_then(|index| self.cells.get(index).copied())
    }

    /// Cells `start..end`, clamped to memory bounds and to at most `limit` cells.
    pub fn window(&self, start: i64, end: i64, limit: usize) -> &[i64] {
        let clamp = |address: i64| address.clamp(0, self.capacity() as i64) as usize;
        let start = clamp(start);
        let end = clamp(end).max(start).min(start.saturating_add(limit));
        &self.cells[start..end]
    }

    fn index(&self, address: i64) -> Result<usize, MemoryError> {
        usize::try_from(address)
            .ok()
            .filter(|index| *index < self.cells.len())
            .ok_or(MemoryError::OutOfBounds {
                address,
                capacity: self.cells.len(),
            })
    }
}

/// Memory level errors bubbled up to the interpreter.
#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("memory address {address} is outside 0..{capacity}")]
    OutOfBounds { address: i64, capacity: usize },
}
