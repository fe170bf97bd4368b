//! The closed set of actions an input event may carry.
//!
//! Every pass matches [`Action`] exhaustively, so adding a variant is a
//! compile error everywhere it must be handled.

use lockstep_hash::{Canonical, CanonicalError, Decoder, Encoder};
use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, ZoneId};

/// An inclusive axis-aligned rectangle of grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Area {
    /// Smallest x coordinate inside the area.
    pub min_x: i64,
    /// Smallest y coordinate inside the area.
    pub min_y: i64,
    /// Largest x coordinate inside the area.
    pub max_x: i64,
    /// Largest y coordinate inside the area.
    pub max_y: i64,
}

impl Area {
    /// Whether `(x, y)` lies inside the area.
    pub const fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Whether the corners are ordered.
    pub const fn is_well_formed(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }
}

impl Canonical for Area {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_i64(self.min_x);
        enc.put_i64(self.min_y);
        enc.put_i64(self.max_x);
        enc.put_i64(self.max_y);
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        Ok(Self {
            min_x: dec.get_i64()?,
            min_y: dec.get_i64()?,
            max_x: dec.get_i64()?,
            max_y: dec.get_i64()?,
        })
    }
}

/// An action submitted by an input producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Step one cell in each axis (`dx` and `dy` in `-1..=1`).
    Move {
        /// The moving entity.
        entity: EntityId,
        /// Horizontal step.
        dx: i64,
        /// Vertical step.
        dy: i64,
    },
    /// Harvest from the resource node under the entity.
    Forage {
        /// The foraging entity.
        entity: EntityId,
    },
    /// Hand stock to an adjacent entity.
    Transfer {
        /// The giving entity.
        from: EntityId,
        /// The receiving entity.
        to: EntityId,
        /// Units of stock moved.
        amount: u64,
    },
    /// Choose a new movement goal.
    Plan {
        /// The planning entity.
        entity: EntityId,
    },
    /// Recover energy.
    Rest {
        /// The resting entity.
        entity: EntityId,
    },
    /// Forbid movement into an area.
    RestrictZone {
        /// Zone identifier.
        zone: ZoneId,
        /// Cells covered by the zone.
        area: Area,
    },
    /// Remove a restricted zone.
    LiftZone {
        /// Zone identifier.
        zone: ZoneId,
    },
    /// Set the maximum stock moved by a single transfer.
    SetTransferCap {
        /// New cap in stock units.
        cap: u64,
    },
}

impl Action {
    /// Short name for logs and diffs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Forage { .. } => "forage",
            Self::Transfer { .. } => "transfer",
            Self::Plan { .. } => "plan",
            Self::Rest { .. } => "rest",
            Self::RestrictZone { .. } => "restrict_zone",
            Self::LiftZone { .. } => "lift_zone",
            Self::SetTransferCap { .. } => "set_transfer_cap",
        }
    }

    /// Whether this action changes the policy table.
    pub const fn is_governance(&self) -> bool {
        matches!(
            self,
            Self::RestrictZone { .. } | Self::LiftZone { .. } | Self::SetTransferCap { .. }
        )
    }

    /// The entity performing the action, if any.
    pub const fn actor(&self) -> Option<EntityId> {
        match self {
            Self::Move { entity, .. }
            | Self::Forage { entity }
            | Self::Plan { entity }
            | Self::Rest { entity } => Some(*entity),
            Self::Transfer { from, .. } => Some(*from),
            Self::RestrictZone { .. } | Self::LiftZone { .. } | Self::SetTransferCap { .. } => None,
        }
    }

    /// Every entity the action refers to.
    pub fn entities(&self) -> Vec<EntityId> {
        match self {
            Self::Transfer { from, to, .. } => vec![*from, *to],
            other => other.actor().into_iter().collect(),
        }
    }

    /// Check the payload for structural problems that need no world state.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn check_structure(&self) -> Result<(), String> {
        match self {
            Self::Move { dx, dy, .. } => {
                if !(-1..=1).contains(dx) || !(-1..=1).contains(dy) {
                    return Err(format!("step ({dx}, {dy}) exceeds one cell"));
                }
                if *dx == 0 && *dy == 0 {
                    return Err("empty step".to_owned());
                }
                Ok(())
            }
            Self::Transfer { from, to, amount } => {
                if from == to {
                    return Err(format!("entity {from} transfers to itself"));
                }
                if *amount == 0 {
                    return Err("zero transfer amount".to_owned());
                }
                Ok(())
            }
            Self::RestrictZone { area, .. } => {
                if area.is_well_formed() {
                    Ok(())
                } else {
                    Err("zone corners are inverted".to_owned())
                }
            }
            Self::Forage { .. }
            | Self::Plan { .. }
            | Self::Rest { .. }
            | Self::LiftZone { .. }
            | Self::SetTransferCap { .. } => Ok(()),
        }
    }
}

impl Canonical for Action {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        match self {
            Self::Move { entity, dx, dy } => {
                enc.put_u8(1);
                entity.encode(enc)?;
                enc.put_i64(*dx);
                enc.put_i64(*dy);
            }
            Self::Forage { entity } => {
                enc.put_u8(2);
                entity.encode(enc)?;
            }
            Self::Transfer { from, to, amount } => {
                enc.put_u8(3);
                from.encode(enc)?;
                to.encode(enc)?;
                enc.put_u64(*amount);
            }
            Self::Plan { entity } => {
                enc.put_u8(4);
                entity.encode(enc)?;
            }
            Self::Rest { entity } => {
                enc.put_u8(5);
                entity.encode(enc)?;
            }
            Self::RestrictZone { zone, area } => {
                enc.put_u8(6);
                zone.encode(enc)?;
                area.encode(enc)?;
            }
            Self::LiftZone { zone } => {
                enc.put_u8(7);
                zone.encode(enc)?;
            }
            Self::SetTransferCap { cap } => {
                enc.put_u8(8);
                enc.put_u64(*cap);
            }
        }
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        let offset = dec.offset();
        let tag = dec.get_u8()?;
        let action = match tag {
            1 => Self::Move {
                entity: EntityId::decode(dec)?,
                dx: dec.get_i64()?,
                dy: dec.get_i64()?,
            },
            2 => Self::Forage {
                entity: EntityId::decode(dec)?,
            },
            3 => Self::Transfer {
                from: EntityId::decode(dec)?,
                to: EntityId::decode(dec)?,
                amount: dec.get_u64()?,
            },
            4 => Self::Plan {
                entity: EntityId::decode(dec)?,
            },
            5 => Self::Rest {
                entity: EntityId::decode(dec)?,
            },
            6 => Self::RestrictZone {
                zone: ZoneId::decode(dec)?,
                area: Area::decode(dec)?,
            },
            7 => Self::LiftZone {
                zone: ZoneId::decode(dec)?,
            },
            8 => Self::SetTransferCap {
                cap: dec.get_u64()?,
            },
            _ => {
                return Err(CanonicalError::UnknownTag {
                    kind: "Action",
                    tag,
                    offset,
                });
            }
        };
        Ok(action)
    }
}
