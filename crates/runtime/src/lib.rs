pub mod event_bus;
pub mod readiness;
pub mod slot;
pub mod timer;

pub use event_bus::*;
pub use readiness::*;
pub use slot::*;
pub use timer::*;
