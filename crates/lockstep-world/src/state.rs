//! The authoritative world state.

use std::collections::BTreeMap;

use lockstep_hash::{Canonical, CanonicalError, Decoder, Encoder};
use lockstep_types::{Area, EntityId, SourceId, ZoneId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::WorldError;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// A grid cell. Ordered by `x`, then `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Column.
    pub x: i64,
    /// Row.
    pub y: i64,
}

impl Position {
    /// Build a position.
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// The cell offset by `(dx, dy)`, or `None` on overflow.
    pub fn offset(self, dx: i64, dy: i64) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add(dx)?,
            y: self.y.checked_add(dy)?,
        })
    }

    /// Whether `other` is this cell or one of its eight neighbours.
    pub fn is_adjacent(self, other: Self) -> bool {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        dx <= 1 && dy <= 1
    }
}

impl core::fmt::Display for Position {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl Canonical for Position {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_i64(self.x);
        enc.put_i64(self.y);
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        Ok(Self {
            x: dec.get_i64()?,
            y: dec.get_i64()?,
        })
    }
}

/// World extent. Valid cells are `0..width` by `0..height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    /// Number of columns.
    pub width: i64,
    /// Number of rows.
    pub height: i64,
}

impl Bounds {
    /// Whether `pos` lies inside the grid.
    pub const fn contains(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }
}

impl Canonical for Bounds {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_i64(self.width);
        enc.put_i64(self.height);
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        Ok(Self {
            width: dec.get_i64()?,
            height: dec.get_i64()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Costs and yields fixed at genesis. Part of the hashed state so two worlds
/// with different rules never share a hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldRules {
    /// Energy spent per move.
    pub move_cost: Decimal,
    /// Energy spent per forage.
    pub forage_cost: Decimal,
    /// Energy spent per plan.
    pub plan_cost: Decimal,
    /// Energy recovered per rest.
    pub rest_gain: Decimal,
    /// Energy ceiling.
    pub max_energy: Decimal,
    /// Upper bound (inclusive) on units harvested by one forage.
    pub forage_max_yield: u64,
    /// Chance per mille that a node below capacity regenerates in a tick.
    pub regen_chance_per_mille: u64,
}

impl Default for WorldRules {
    fn default() -> Self {
        Self {
            move_cost: Decimal::new(5, 1),
            forage_cost: Decimal::ONE,
            plan_cost: Decimal::new(25, 2),
            rest_gain: Decimal::TWO,
            max_energy: Decimal::TEN,
            forage_max_yield: 3,
            regen_chance_per_mille: 500,
        }
    }
}

impl Canonical for WorldRules {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_decimal(self.move_cost);
        enc.put_decimal(self.forage_cost);
        enc.put_decimal(self.plan_cost);
        enc.put_decimal(self.rest_gain);
        enc.put_decimal(self.max_energy);
        enc.put_u64(self.forage_max_yield);
        enc.put_u64(self.regen_chance_per_mille);
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        Ok(Self {
            move_cost: dec.get_decimal()?,
            forage_cost: dec.get_decimal()?,
            plan_cost: dec.get_decimal()?,
            rest_gain: dec.get_decimal()?,
            max_energy: dec.get_decimal()?,
            forage_max_yield: dec.get_u64()?,
            regen_chance_per_mille: dec.get_u64()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Entities and nodes
// ---------------------------------------------------------------------------

/// An entity on the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// The input source allowed to act for this entity.
    pub owner: SourceId,
    /// Current cell.
    pub position: Position,
    /// Current energy, never negative.
    pub energy: Decimal,
    /// Units of carried stock.
    pub stock: u64,
    /// Cell chosen by the last plan, if any.
    pub goal: Option<Position>,
}

impl Canonical for Entity {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        self.owner.encode(enc)?;
        self.position.encode(enc)?;
        enc.put_decimal(self.energy);
        enc.put_u64(self.stock);
        self.goal.encode(enc)
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        Ok(Self {
            owner: SourceId::decode(dec)?,
            position: Position::decode(dec)?,
            energy: dec.get_decimal()?,
            stock: dec.get_u64()?,
            goal: Option::<Position>::decode(dec)?,
        })
    }
}

/// A harvestable resource node occupying one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Units currently available.
    pub amount: u64,
    /// Ceiling for `amount`.
    pub capacity: u64,
    /// Units added by one successful regeneration.
    pub regen: u64,
}

impl Canonical for ResourceNode {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_u64(self.amount);
        enc.put_u64(self.capacity);
        enc.put_u64(self.regen);
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        Ok(Self {
            amount: dec.get_u64()?,
            capacity: dec.get_u64()?,
            regen: dec.get_u64()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Governance state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTable {
    /// The only source whose governance actions are honoured.
    pub governor: SourceId,
    /// Areas entities may not move into.
    pub restricted: BTreeMap<ZoneId, Area>,
    /// Maximum stock moved by one transfer, if capped.
    pub transfer_cap: Option<u64>,
}

impl PolicyTable {
    /// An empty table administered by `governor`.
    pub const fn new(governor: SourceId) -> Self {
        Self {
            governor,
            restricted: BTreeMap::new(),
            transfer_cap: None,
        }
    }

    /// The first restricted zone containing `pos`, in zone order.
    pub fn restricting_zone(&self, pos: Position) -> Option<ZoneId> {
        self.restricted
            .iter()
            .find(|(_, area)| area.contains(pos.x, pos.y))
            .map(|(zone, _)| *zone)
    }
}

impl Canonical for PolicyTable {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        self.governor.encode(enc)?;
        self.restricted.encode(enc)?;
        self.transfer_cap.encode(enc)
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        Ok(Self {
            governor: SourceId::decode(dec)?,
            restricted: BTreeMap::decode(dec)?,
            transfer_cap: Option::<u64>::decode(dec)?,
        })
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The complete authoritative world.
///
/// Persisted only through its canonical encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldState {
    /// Grid extent.
    pub bounds: Bounds,
    /// Genesis rules.
    pub rules: WorldRules,
    /// Entities by id.
    pub entities: BTreeMap<EntityId, Entity>,
    /// Resource nodes by cell.
    pub nodes: BTreeMap<Position, ResourceNode>,
    /// Governance policy.
    pub policy: PolicyTable,
}

impl WorldState {
    /// Borrow an entity.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EntityNotFound`] if absent.
    pub fn entity(&self, id: EntityId) -> Result<&Entity, WorldError> {
        self.entities.get(&id).ok_or(WorldError::EntityNotFound(id))
    }

    /// Mutably borrow an entity.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EntityNotFound`] if absent.
    pub fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity, WorldError> {
        self.entities
            .get_mut(&id)
            .ok_or(WorldError::EntityNotFound(id))
    }

    /// Whether an entity exists.
    pub fn has_entity(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Sum of all carried stock and node amounts.
    pub fn total_stock(&self) -> Option<u64> {
        let carried = self
            .entities
            .values()
            .try_fold(0_u64, |acc, e| acc.checked_add(e.stock))?;
        self.nodes
            .values()
            .try_fold(carried, |acc, n| acc.checked_add(n.amount))
    }
}

impl Canonical for WorldState {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        self.bounds.encode(enc)?;
        self.rules.encode(enc)?;
        self.entities.encode(enc)?;
        self.nodes.encode(enc)?;
        self.policy.encode(enc)
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        Ok(Self {
            bounds: Bounds::decode(dec)?,
            rules: WorldRules::decode(dec)?,
            entities: BTreeMap::decode(dec)?,
            nodes: BTreeMap::decode(dec)?,
            policy: PolicyTable::decode(dec)?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lockstep_hash::{from_canonical_bytes, to_canonical_bytes};

    use super::*;

    fn world() -> WorldState {
        let mut entities = BTreeMap::new();
        entities.insert(
            EntityId(2),
            Entity {
                owner: SourceId(1),
                position: Position::new(1, 1),
                energy: Decimal::new(35, 1),
                stock: 4,
                goal: None,
            },
        );
        entities.insert(
            EntityId(1),
            Entity {
                owner: SourceId(1),
                position: Position::new(0, 0),
                energy: Decimal::TEN,
                stock: 0,
                goal: Some(Position::new(3, 3)),
            },
        );
        let mut nodes = BTreeMap::new();
        nodes.insert(
            Position::new(2, 2),
            ResourceNode {
                amount: 5,
                capacity: 10,
                regen: 1,
            },
        );
        WorldState {
            bounds: Bounds {
                width: 8,
                height: 8,
            },
            rules: WorldRules::default(),
            entities,
            nodes,
            policy: PolicyTable::new(SourceId(99)),
        }
    }

    #[test]
    fn canonical_bytes_decode_to_same_world() {
        let state = world();
        let bytes = to_canonical_bytes(&state).unwrap();
        assert_eq!(from_canonical_bytes::<WorldState>(&bytes).unwrap(), state);
    }

    #[test]
    fn equal_energy_with_different_scale_hashes_equal() {
        let a = world();
        let mut b = world();
        if let Some(e) = b.entities.get_mut(&EntityId(2)) {
            e.energy = Decimal::new(3500, 3);
        }
        assert_eq!(to_canonical_bytes(&a).unwrap(), to_canonical_bytes(&b).unwrap());
    }

    #[test]
    fn adjacency_includes_diagonals() {
        let p = Position::new(2, 2);
        assert!(p.is_adjacent(Position::new(3, 3)));
        assert!(p.is_adjacent(p));
        assert!(!p.is_adjacent(Position::new(4, 2)));
    }

    #[test]
    fn bounds_are_half_open() {
        let bounds = Bounds {
            width: 4,
            height: 2,
        };
        assert!(bounds.contains(Position::new(3, 1)));
        assert!(!bounds.contains(Position::new(4, 1)));
        assert!(!bounds.contains(Position::new(0, -1)));
    }

    #[test]
    fn restricting_zone_lookup() {
        let mut policy = PolicyTable::new(SourceId(1));
        policy.restricted.insert(
            ZoneId(3),
            Area {
                min_x: 0,
                min_y: 0,
                max_x: 1,
                max_y: 1,
            },
        );
        assert_eq!(policy.restricting_zone(Position::new(1, 0)), Some(ZoneId(3)));
        assert_eq!(policy.restricting_zone(Position::new(2, 0)), None);
    }

    #[test]
    fn total_stock_counts_entities_and_nodes() {
        assert_eq!(world().total_stock(), Some(9));
    }
}
