//! Trajectory planner and segment buffer.
//!
//! The planner turns requested poses into [`Block`]s, appends them to the
//! [`SegmentBuffer`] and re-optimises the speeds of every block the step
//! generator has not claimed yet.

mod block;
mod buffer;
pub mod junction;
pub mod lookahead;
mod move_planner;
pub mod trapezoid;

pub use block::{AdvanceLead, Block, BlockFlags};
pub use buffer::SegmentBuffer;
pub use move_planner::Planner;
