//! Configuration-side types: identifier domains, timers, the parallel
//! tables, the configuration surface and the startup validator.

mod config;
mod ids;
mod macros;
mod table;
mod timer;
mod validate;

pub use config::MachineConfig;
pub use ids::{EventTag, NoEvent, StateTag};
pub use table::{Callback, IgnoredEventCallback, InnerTransition, Labels};
pub use timer::{DurationUnit, TimerEvent};
pub use validate::{ValidationReport, Warning};

pub(crate) use validate::run_checks;
