//! Governance: ownership, restricted zones, and the transfer cap.
//!
//! Governance actions are honoured only from the genesis governor. Entity
//! actions must come from the entity's owner and respect the policy table
//! as it stands before the action.

use lockstep_types::{Action, Subsystem, VetoReason};
use lockstep_world::WorldState;

use super::{ApplyPass, PassContext, PassError, PassOutcome};

/// Enforces and edits the policy table.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyPass;

impl ApplyPass for PolicyPass {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Governance
    }

    fn apply(
        &self,
        draft: &mut WorldState,
        ctx: &mut PassContext<'_>,
    ) -> Result<PassOutcome, PassError> {
        let source = ctx.event.source_id;
        let action = &ctx.event.action;

        if action.is_governance() && source != draft.policy.governor {
            return Ok(PassOutcome::veto(
                VetoReason::PolicyViolation,
                format!("source {source} is not the governor"),
            ));
        }
        if let Some(actor) = action.actor() {
            let owner = draft.entity(actor)?.owner;
            if owner != source {
                return Ok(PassOutcome::veto(
                    VetoReason::PolicyViolation,
                    format!("source {source} does not own entity {actor}"),
                ));
            }
        }

        match action {
            Action::Move { entity, .. } | Action::Forage { entity } => {
                let position = draft.entity(*entity)?.position;
                if let Some(zone) = draft.policy.restricting_zone(position) {
                    return Ok(PassOutcome::veto(
                        VetoReason::PolicyViolation,
                        format!("{position} lies in restricted zone {zone}"),
                    ));
                }
                Ok(PassOutcome::Accept)
            }
            Action::Transfer { amount, .. } => match draft.policy.transfer_cap {
                Some(cap) if *amount > cap => Ok(PassOutcome::veto(
                    VetoReason::PolicyViolation,
                    format!("transfer of {amount} exceeds cap {cap}"),
                )),
                _ => Ok(PassOutcome::Accept),
            },
            Action::RestrictZone { zone, area } => {
                draft.policy.restricted.insert(*zone, *area);
                Ok(PassOutcome::Accept)
            }
            Action::LiftZone { zone } => {
                if draft.policy.restricted.remove(zone).is_some() {
                    Ok(PassOutcome::Accept)
                } else {
                    Ok(PassOutcome::veto(
                        VetoReason::PolicyViolation,
                        format!("zone {zone} is not restricted"),
                    ))
                }
            }
            Action::SetTransferCap { cap } => {
                draft.policy.transfer_cap = Some(*cap);
                Ok(PassOutcome::Accept)
            }
            Action::Plan { .. } | Action::Rest { .. } => Ok(PassOutcome::Accept),
        }
    }
}
