//! Machine module: the owned motion context and its sharing wrapper.

mod builder;
mod context;
mod shared;

pub use builder::MotionContextBuilder;
pub use context::{HomingStatus, MotionContext, MotionStatus};
pub use shared::SharedMotion;
