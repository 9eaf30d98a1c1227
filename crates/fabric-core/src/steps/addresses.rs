//! Addressing steps: south subnets, loopbacks, interface addresses and ASN.

use crate::addressing::{
    check_disjoint, desired_addresses, required_south_addresses, select_loopback, select_subnet,
};
use crate::asn::derive_asn;
use crate::context::PassContext;
use crate::error::FabricError;
use crate::model::SwitchStatus;
use crate::pipeline::Step;
use tracing::{debug, warn};

/// Take a south subnet per address family from the switch's subnet pools.
///
/// Pools are never created here; a missing pool is waited for.
pub struct SouthSubnets;

impl Step for SouthSubnets {
    fn name(&self) -> &'static str {
        "south-subnets"
    }

    fn is_satisfied(&self, ctx: &PassContext, status: &SwitchStatus) -> bool {
        ctx.settings
            .families
            .iter()
            .all(|&family| status.subnet(family).is_some())
    }

    fn advance(&self, ctx: &PassContext, status: &mut SwitchStatus) -> Result<(), FabricError> {
        for &family in &ctx.settings.families {
            if status.subnet(family).is_some() {
                continue;
            }
            let required = required_south_addresses(status.interfaces.values(), family);
            match select_subnet(&ctx.pools.south_subnets, family)? {
                Some(subnet) => {
                    let host_bits = family.max_prefix() - subnet.cidr.prefix_len();
                    let capacity = 1u128.checked_shl(u32::from(host_bits)).unwrap_or(u128::MAX);
                    if capacity < required {
                        warn!(
                            switch = %ctx.switch.name,
                            cidr = %subnet.cidr,
                            required,
                            "south subnet is smaller than the active ports need"
                        );
                    }
                    *status.subnet_mut(family) = Some(subnet);
                }
                None => {
                    debug!(switch = %ctx.switch.name, %family, required, "waiting for south subnet pool");
                }
            }
        }
        Ok(())
    }
}

/// Take a loopback address per family. Once stored it is never re-requested.
pub struct Loopbacks;

impl Step for Loopbacks {
    fn name(&self) -> &'static str {
        "loopbacks"
    }

    fn is_satisfied(&self, ctx: &PassContext, status: &SwitchStatus) -> bool {
        ctx.settings
            .families
            .iter()
            .all(|&family| status.loopback(family).is_some())
    }

    fn advance(&self, ctx: &PassContext, status: &mut SwitchStatus) -> Result<(), FabricError> {
        for &family in &ctx.settings.families {
            if status.loopback(family).is_some() {
                continue;
            }
            match select_loopback(&ctx.pools.loopbacks, family)? {
                Some(loopback) => *status.loopback_mut(family) = Some(loopback),
                None => debug!(switch = %ctx.switch.name, %family, "waiting for loopback pool"),
            }
        }
        Ok(())
    }
}

/// Address south interfaces from the own subnet and north interfaces from
/// the peer's persisted link block.
pub struct InterfaceAddresses;

impl Step for InterfaceAddresses {
    fn name(&self) -> &'static str {
        "interface-addresses"
    }

    fn is_satisfied(&self, ctx: &PassContext, status: &SwitchStatus) -> bool {
        ctx.settings.families.iter().all(|&family| {
            match desired_addresses(ctx, status, family) {
                Ok(desired) => desired.iter().all(|(name, address)| {
                    status
                        .interfaces
                        .get(name)
                        .and_then(|iface| iface.address(family))
                        == Some(address)
                }),
                Err(_) => false,
            }
        })
    }

    fn advance(&self, ctx: &PassContext, status: &mut SwitchStatus) -> Result<(), FabricError> {
        for &family in &ctx.settings.families {
            let desired = desired_addresses(ctx, status, family)?;
            for (name, address) in desired {
                if let Some(iface) = status.interfaces.get_mut(&name) {
                    *iface.address_mut(family) = Some(address);
                }
            }
        }
        check_disjoint(status)?;
        Ok(())
    }
}

pub struct Asn;

impl Step for Asn {
    fn name(&self) -> &'static str {
        "asn"
    }

    fn is_satisfied(&self, _ctx: &PassContext, status: &SwitchStatus) -> bool {
        status.asn == derive_asn(status.loopback_v4.as_ref().map(|l| &l.address))
    }

    fn advance(&self, _ctx: &PassContext, status: &mut SwitchStatus) -> Result<(), FabricError> {
        status.asn = derive_asn(status.loopback_v4.as_ref().map(|l| &l.address));
        Ok(())
    }
}
