pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod error;
pub mod observer;
pub mod shared;
pub mod simulation;
pub mod visualizer;

pub use circuit_breaker::{CircuitBreaker, Outcome, Settings, Snapshot, State};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::{CallError, Rejection, SettingsError};
pub use observer::{Event, NoopObserver, Observer, TracingObserver};
pub use shared::{Permit, SharedCircuitBreaker};
