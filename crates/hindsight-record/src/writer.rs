//! Whitespace-delimited text output for trajectories and worlds.
//!
//! The trajectory format is one state per line in width-13 left-aligned
//! fields, with the initial and goal states written before the rollout so a
//! plotting script can pick them off the first two lines. The world format
//! is whatever the world type's `Display` impl emits (bounding box, then
//! one obstacle per line).

use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::SVector;

use crate::error::RecordError;

/// Field width for trajectory files.
const PRINT_WIDTH: usize = 13;

// ---------------------------------------------------------------------------
// TrajectoryWriter
// ---------------------------------------------------------------------------

/// Streaming writer for a trajectory file.
///
/// Call [`finish`](Self::finish) to flush; dropping without it is
/// best-effort, like any buffered writer.
pub struct TrajectoryWriter {
    writer: BufWriter<File>,
}

impl TrajectoryWriter {
    /// Create (truncating) the file at `path`.
    ///
    /// # Errors
    ///
    /// Any underlying IO failure.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
        })
    }

    /// Write one state as a line of width-13 left-aligned fields.
    ///
    /// # Errors
    ///
    /// Any underlying IO failure.
    pub fn write_state<const XDIM: usize>(
        &mut self,
        state: &SVector<f64, XDIM>,
    ) -> Result<(), RecordError> {
        for value in state.iter() {
            write!(self.writer, "{value:<PRINT_WIDTH$} ")?;
        }
        writeln!(self.writer)?;
        Ok(())
    }

    /// Flush and close.
    ///
    /// # Errors
    ///
    /// Any underlying IO failure.
    pub fn finish(mut self) -> Result<(), RecordError> {
        self.writer.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Convenience entry points
// ---------------------------------------------------------------------------

/// Write `x0`, the goal state, and then the rollout states to `path`.
///
/// # Errors
///
/// Any underlying IO failure.
pub fn states_to_file<const XDIM: usize>(
    path: impl AsRef<Path>,
    x0: &SVector<f64, XDIM>,
    goal: &SVector<f64, XDIM>,
    states: &[SVector<f64, XDIM>],
) -> Result<(), RecordError> {
    let mut writer = TrajectoryWriter::create(path)?;
    writer.write_state(x0)?;
    writer.write_state(goal)?;
    for state in states {
        writer.write_state(state)?;
    }
    writer.finish()
}

/// Write the world's `Display` form to `path`.
///
/// # Errors
///
/// Any underlying IO failure.
pub fn world_to_file(path: impl AsRef<Path>, world: &impl Display) -> Result<(), RecordError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write!(writer, "{world}")?;
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
