//! Fabric convergence engine
//!
//! Pure, I/O-free core of the neolaas switch fabric operator. Given a
//! snapshot of a switch, its neighbor facts, the rest of the switch
//! population and its address pools, the engine computes the next increment
//! of the switch's status:
//!
//! - `hierarchy`: connection level from resolved neighbors
//! - `role` / `direction`: spine/leaf role and north/south interfaces
//! - `addressing`: link blocks, adjacent addresses and loopbacks
//! - `asn`: BGP AS number from the loopback
//! - `pipeline` / `steps`: the ordered, one-increment-per-pass state machine

pub mod addressing;
pub mod asn;
pub mod context;
pub mod direction;
pub mod error;
pub mod hierarchy;
pub mod model;
pub mod pipeline;
pub mod role;
pub mod steps;

#[cfg(test)]
mod simulation;
#[cfg(test)]
mod testing;

pub use context::{EngineSettings, PassContext, PoolEntry, PoolSnapshot, SwitchIdentity, SwitchRecord};
pub use error::{FabricError, ValidationError};
pub use model::{
    AddressFamily, ConfigState, Direction, ManagerState, ManagerType, Nic, PeerType, SwitchRole,
    SwitchState, SwitchStatus, UNRESOLVED_LEVEL,
};
pub use pipeline::{PassOutcome, Pipeline, RequeuePolicy, Step};
pub use steps::standard_pipeline;
