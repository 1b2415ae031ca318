//! Shared data model and persistence layer for the captain/sailor fleet.

pub mod coerce;
pub mod duration;
pub mod error;
pub mod model;
pub mod store;
pub mod time;

pub use duration::parse_duration_secs;
pub use error::{CoreError, CoreResult};
pub use model::{
    CancelSource, Chore, ChoreMap, ChoreStatus, CrewMap, GpuSpec, Resources, Sailor,
    SailorStatus, User, UserMap, ALIVE_THRESHOLD_SECS,
};
pub use store::JsonStore;
pub use time::now_secs;
