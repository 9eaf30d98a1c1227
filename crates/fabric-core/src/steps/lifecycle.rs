//! Lifecycle and configuration hand-off steps.

use crate::context::PassContext;
use crate::error::FabricError;
use crate::model::{AddressFamily, ConfigState, ManagerState, SwitchState, SwitchStatus};
use crate::pipeline::Step;
use tracing::{info, warn};

/// Give a freshly created switch its initial state.
pub struct Initialize;

impl Step for Initialize {
    fn name(&self) -> &'static str {
        "initialize"
    }

    fn is_satisfied(&self, _ctx: &PassContext, status: &SwitchStatus) -> bool {
        status.state.is_some()
    }

    fn advance(&self, _ctx: &PassContext, status: &mut SwitchStatus) -> Result<(), FabricError> {
        status.state = Some(SwitchState::Initial);
        Ok(())
    }
}

/// Mirror the management settings of the switch spec into the status.
pub struct SyncConfiguration;

impl Step for SyncConfiguration {
    fn name(&self) -> &'static str {
        "sync-configuration"
    }

    fn is_satisfied(&self, ctx: &PassContext, status: &SwitchStatus) -> bool {
        status.configuration.managed == ctx.switch.managed
            && status.configuration.manager_type == ctx.switch.manager_type
    }

    fn advance(&self, ctx: &PassContext, status: &mut SwitchStatus) -> Result<(), FabricError> {
        let config = &mut status.configuration;
        if config.managed && !ctx.switch.managed {
            // Hand the switch off again if it becomes managed later.
            config.state = ConfigState::Initial;
        }
        config.managed = ctx.switch.managed;
        config.manager_type = ctx.switch.manager_type;
        Ok(())
    }
}

pub struct BeginProcessing;

impl Step for BeginProcessing {
    fn name(&self) -> &'static str {
        "begin-processing"
    }

    fn is_satisfied(&self, _ctx: &PassContext, status: &SwitchStatus) -> bool {
        status.state != Some(SwitchState::Initial)
    }

    fn advance(&self, _ctx: &PassContext, status: &mut SwitchStatus) -> Result<(), FabricError> {
        status.state = Some(SwitchState::Processing);
        Ok(())
    }
}

/// Whether every piece of the switch's status has been computed.
pub fn is_complete(ctx: &PassContext, status: &SwitchStatus) -> bool {
    if status.state != Some(SwitchState::Processing)
        || ctx.nics.is_none()
        || !status.is_level_resolved()
        || status.role.is_none()
    {
        return false;
    }

    for &family in &ctx.settings.families {
        if status.subnet(family).is_none() || status.loopback(family).is_none() {
            return false;
        }
        let unaddressed = status
            .interfaces
            .values()
            .any(|iface| iface.direction.is_some() && iface.address(family).is_none());
        if unaddressed {
            return false;
        }
    }

    !ctx.settings.has_family(AddressFamily::Ipv4) || status.asn != 0
}

pub struct MarkReady;

impl Step for MarkReady {
    fn name(&self) -> &'static str {
        "mark-ready"
    }

    fn is_satisfied(&self, _ctx: &PassContext, status: &SwitchStatus) -> bool {
        status.is_ready()
    }

    fn advance(&self, ctx: &PassContext, status: &mut SwitchStatus) -> Result<(), FabricError> {
        if is_complete(ctx, status) {
            info!(switch = %ctx.switch.name, level = status.connection_level, "switch converged");
            status.state = Some(SwitchState::Ready);
        }
        Ok(())
    }
}

/// Signal the configuration agent that a managed switch is ready to apply.
pub struct ConfigurationHandoff;

impl Step for ConfigurationHandoff {
    fn name(&self) -> &'static str {
        "configuration-handoff"
    }

    fn is_satisfied(&self, _ctx: &PassContext, status: &SwitchStatus) -> bool {
        !(status.is_ready()
            && status.configuration.managed
            && status.configuration.state == ConfigState::Initial)
    }

    fn advance(&self, _ctx: &PassContext, status: &mut SwitchStatus) -> Result<(), FabricError> {
        status.configuration.state = ConfigState::Pending;
        status.configuration.manager_state = ManagerState::Active;
        Ok(())
    }
}

/// Track whether the configuration agent still reports in.
///
/// The agent writes back a fresh `lastCheck` after every apply. A check older
/// than the threshold marks the manager failed and asks for a re-apply; a
/// fresh check after a re-apply marks it active again. A switch the agent has
/// never reported on is left alone.
pub struct ConfigurationLiveness;

enum Liveness {
    Healthy,
    Stale,
    Recovered,
}

fn liveness(ctx: &PassContext, status: &SwitchStatus) -> Liveness {
    let config = &status.configuration;
    if !status.is_ready() || !config.managed {
        return Liveness::Healthy;
    }
    let Some(last_check) = config.last_check else {
        return Liveness::Healthy;
    };

    let stale = ctx.now - last_check > ctx.settings.liveness_threshold;
    match config.manager_state {
        ManagerState::Active if stale => Liveness::Stale,
        ManagerState::Failed if !stale && config.state == ConfigState::Applied => {
            Liveness::Recovered
        }
        _ => Liveness::Healthy,
    }
}

impl Step for ConfigurationLiveness {
    fn name(&self) -> &'static str {
        "configuration-liveness"
    }

    fn is_satisfied(&self, ctx: &PassContext, status: &SwitchStatus) -> bool {
        matches!(liveness(ctx, status), Liveness::Healthy)
    }

    fn advance(&self, ctx: &PassContext, status: &mut SwitchStatus) -> Result<(), FabricError> {
        match liveness(ctx, status) {
            Liveness::Stale => {
                warn!(
                    switch = %ctx.switch.name,
                    last_check = ?status.configuration.last_check,
                    "configuration agent stopped reporting"
                );
                status.configuration.manager_state = ManagerState::Failed;
                status.configuration.state = ConfigState::Pending;
            }
            Liveness::Recovered => {
                status.configuration.manager_state = ManagerState::Active;
            }
            Liveness::Healthy => {}
        }
        Ok(())
    }
}
