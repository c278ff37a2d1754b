//! Plain-text artifacts for the demo drivers: rollout trajectories and
//! obstacle worlds, in the whitespace-delimited format the plotting
//! scripts consume.

pub mod error;
pub mod writer;

pub use error::RecordError;
pub use writer::{states_to_file, world_to_file, TrajectoryWriter};
