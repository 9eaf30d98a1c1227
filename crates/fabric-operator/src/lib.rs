//! Fabric Operator Library
//!
//! Kubernetes operator around the `fabric-core` convergence engine. Watches
//! Switch resources together with their neighbor facts (Inventory) and
//! address pools (Subnet, Ip), and writes each switch's converged status
//! back one increment at a time.

pub mod config;
pub mod controllers;
pub mod crds;
pub mod error;
pub mod http;
pub mod observability;
pub mod repository;
pub mod version;

pub use config::OperatorConfig;
pub use crds::{Inventory, Ip, Subnet, Switch, SwitchSpec};
pub use error::ReconcileError;
