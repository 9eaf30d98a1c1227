//! Role assignment.

use crate::error::ValidationError;
use crate::model::{PeerType, SwitchRole, SwitchStatus};

/// A switch with at least one machine attached is a leaf, otherwise a spine.
pub fn compute_role(status: &SwitchStatus) -> SwitchRole {
    let has_machine = status
        .interfaces
        .values()
        .filter_map(|iface| iface.peer.as_ref())
        .any(|peer| peer.peer_type == PeerType::Machine);

    if has_machine {
        SwitchRole::Leaf
    } else {
        SwitchRole::Spine
    }
}

/// Check a computed role against the stored one.
///
/// The stored role is cleared whenever peers change, so a stored role that
/// disagrees with unchanged peers is an invariant violation.
pub fn check_role(stored: Option<SwitchRole>, computed: SwitchRole) -> Result<(), ValidationError> {
    match stored {
        Some(stored) if stored != computed => {
            Err(ValidationError::RoleContradiction { stored, computed })
        }
        _ => Ok(()),
    }
}
