//! Meridian core: registry model types, semantic equality, and the
//! in-process event bus.
//!
//! Everything here is shared between the control-plane service and any
//! embedder that wants to speak the registry's data model. The crate is
//! deliberately free of I/O: persistence lives in `meridian-state`, wiring
//! and HTTP in `meridian-control`.

#![forbid(unsafe_code)]

pub mod bus;
pub mod compare;
pub mod inject;
pub mod model;

pub use bus::{Event, EventBus, EventHandler, HandlerError, PublishOutcome};
pub use compare::{
    env_maps_equal, slices_any, slices_cover, slices_equal, string_maps_equal, DeepEquals,
};
pub use inject::{resolve_string, ValueInjections};
