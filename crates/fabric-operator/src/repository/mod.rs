//! Data access for the switch controller.

mod kube;
#[cfg(test)]
pub(crate) mod memory;
mod traits;

pub use self::kube::KubeRepository;
pub use traits::{label_selector, FabricRepository};
