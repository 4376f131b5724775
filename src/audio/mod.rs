pub mod queue;
pub mod registry;
pub mod session;
pub mod standby;

pub use queue::{LoopMode, Track, TrackQueue};
pub use registry::SessionRegistry;
pub use session::{
    CommandOutcome, Placement, SessionCommand, SessionHandle, SessionSnapshot, SessionState,
};
pub use standby::StandbyTimer;
