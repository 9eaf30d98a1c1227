//! Convergence steps
//!
//! The standard pipeline, in the order a switch's status is built up:
//! lifecycle bookkeeping, topology (interfaces, peers, level, role,
//! directions), addressing, and finally readiness and configuration hand-off.

mod addresses;
mod lifecycle;
mod topology;

pub use addresses::{Asn, InterfaceAddresses, Loopbacks, SouthSubnets};
pub use lifecycle::{
    is_complete, BeginProcessing, ConfigurationHandoff, ConfigurationLiveness, Initialize,
    MarkReady, SyncConfiguration,
};
pub use topology::{AssignDirections, AssignRole, ResolveLevel, ResolvePeers, SyncInterfaces};

use crate::pipeline::Pipeline;

/// The pipeline every switch is reconciled with.
pub fn standard_pipeline() -> Pipeline {
    Pipeline::new(vec![
        Box::new(Initialize),
        Box::new(SyncConfiguration),
        Box::new(SyncInterfaces),
        Box::new(BeginProcessing),
        Box::new(ResolvePeers),
        Box::new(ResolveLevel),
        Box::new(AssignRole),
        Box::new(AssignDirections),
        Box::new(SouthSubnets),
        Box::new(Loopbacks),
        Box::new(InterfaceAddresses),
        Box::new(Asn),
        Box::new(MarkReady),
        Box::new(ConfigurationHandoff),
        Box::new(ConfigurationLiveness),
    ])
}
