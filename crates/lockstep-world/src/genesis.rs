//! The configuration form of a genesis world.
//!
//! [`WorldSpec`] is what operators write in the `genesis.world` section of
//! the kernel configuration. [`WorldSpec::build`] validates it and produces
//! the tick-0 [`WorldState`].

use std::collections::BTreeMap;

use lockstep_types::{EntityId, SourceId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::WorldError;
use crate::state::{Bounds, Entity, PolicyTable, Position, ResourceNode, WorldRules, WorldState};

/// One genesis entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpec {
    /// Entity id.
    pub id: EntityId,
    /// Owning input source.
    pub owner: SourceId,
    /// Starting column.
    pub x: i64,
    /// Starting row.
    pub y: i64,
    /// Starting energy.
    pub energy: Decimal,
    /// Starting stock.
    #[serde(default)]
    pub stock: u64,
}

/// One genesis resource node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Column.
    pub x: i64,
    /// Row.
    pub y: i64,
    /// Starting amount.
    pub amount: u64,
    /// Capacity ceiling.
    pub capacity: u64,
    /// Units added per successful regeneration.
    #[serde(default = "default_regen")]
    pub regen: u64,
}

const fn default_regen() -> u64 {
    1
}

const fn default_extent() -> i64 {
    16
}

/// A genesis world definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSpec {
    /// Grid columns.
    #[serde(default = "default_extent")]
    pub width: i64,
    /// Grid rows.
    #[serde(default = "default_extent")]
    pub height: i64,
    /// Costs and yields.
    #[serde(default)]
    pub rules: WorldRules,
    /// Starting entities.
    #[serde(default)]
    pub entities: Vec<EntitySpec>,
    /// Starting resource nodes.
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

impl Default for WorldSpec {
    fn default() -> Self {
        Self {
            width: default_extent(),
            height: default_extent(),
            rules: WorldRules::default(),
            entities: Vec::new(),
            nodes: Vec::new(),
        }
    }
}

impl WorldSpec {
    /// Validate the definition and build the tick-0 world.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] for non-positive extents, negative or
    /// oversized energies, duplicates, positions outside the grid, or nodes
    /// holding more than their capacity.
    pub fn build(&self, governor: SourceId) -> Result<WorldState, WorldError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(WorldError::Invalid {
                reason: format!("world extent {}x{} must be positive", self.width, self.height),
            });
        }
        self.check_rules()?;
        let bounds = Bounds {
            width: self.width,
            height: self.height,
        };

        let mut entities = BTreeMap::new();
        for spec in &self.entities {
            let position = Position::new(spec.x, spec.y);
            if !bounds.contains(position) {
                return Err(WorldError::OutOfBounds {
                    what: format!("entity {}", spec.id),
                    x: spec.x,
                    y: spec.y,
                });
            }
            if spec.energy.is_sign_negative() || spec.energy > self.rules.max_energy {
                return Err(WorldError::Invalid {
                    reason: format!(
                        "entity {} energy {} outside 0..={}",
                        spec.id, spec.energy, self.rules.max_energy
                    ),
                });
            }
            let entity = Entity {
                owner: spec.owner,
                position,
                energy: spec.energy.normalize(),
                stock: spec.stock,
                goal: None,
            };
            if entities.insert(spec.id, entity).is_some() {
                return Err(WorldError::DuplicateEntity(spec.id));
            }
        }

        let mut nodes = BTreeMap::new();
        for spec in &self.nodes {
            let position = Position::new(spec.x, spec.y);
            if !bounds.contains(position) {
                return Err(WorldError::OutOfBounds {
                    what: "resource node".to_owned(),
                    x: spec.x,
                    y: spec.y,
                });
            }
            if spec.amount > spec.capacity {
                return Err(WorldError::Invalid {
                    reason: format!(
                        "node at {position} holds {} above capacity {}",
                        spec.amount, spec.capacity
                    ),
                });
            }
            let node = ResourceNode {
                amount: spec.amount,
                capacity: spec.capacity,
                regen: spec.regen,
            };
            if nodes.insert(position, node).is_some() {
                return Err(WorldError::DuplicateNode {
                    x: spec.x,
                    y: spec.y,
                });
            }
        }

        Ok(WorldState {
            bounds,
            rules: self.rules.clone(),
            entities,
            nodes,
            policy: PolicyTable::new(governor),
        })
    }

    fn check_rules(&self) -> Result<(), WorldError> {
        let rules = &self.rules;
        let costs = [
            ("move_cost", rules.move_cost),
            ("forage_cost", rules.forage_cost),
            ("plan_cost", rules.plan_cost),
            ("rest_gain", rules.rest_gain),
            ("max_energy", rules.max_energy),
        ];
        if let Some((name, value)) = costs.iter().find(|(_, v)| v.is_sign_negative()) {
            return Err(WorldError::Invalid {
                reason: format!("rule {name} must not be negative (got {value})"),
            });
        }
        if rules.forage_max_yield == 0 {
            return Err(WorldError::Invalid {
                reason: "forage_max_yield must be at least 1".to_owned(),
            });
        }
        if rules.regen_chance_per_mille > 1000 {
            return Err(WorldError::Invalid {
                reason: "regen_chance_per_mille must be at most 1000".to_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const YAML: &str = r#"
width: 6
height: 4
entities:
  - { id: 1, owner: 1, x: 0, y: 0, energy: "5.0" }
  - { id: 2, owner: 2, x: 5, y: 3, energy: "2.5", stock: 3 }
nodes:
  - { x: 2, y: 2, amount: 4, capacity: 8 }
"#;

    #[test]
    fn parses_and_builds_from_yaml() {
        let spec: WorldSpec = serde_yml::from_str(YAML).unwrap();
        let world = spec.build(SourceId(9)).unwrap();
        assert_eq!(world.entities.len(), 2);
        assert_eq!(world.nodes.len(), 1);
        assert_eq!(world.policy.governor, SourceId(9));
        let node = world.nodes.get(&Position::new(2, 2)).unwrap();
        assert_eq!(node.regen, 1);
    }

    #[test]
    fn rejects_entity_outside_bounds() {
        let mut spec: WorldSpec = serde_yml::from_str(YAML).unwrap();
        if let Some(e) = spec.entities.first_mut() {
            e.x = 6;
        }
        assert!(matches!(
            spec.build(SourceId(1)),
            Err(WorldError::OutOfBounds { x: 6, .. })
        ));
    }

    #[test]
    fn rejects_duplicate_entities() {
        let mut spec: WorldSpec = serde_yml::from_str(YAML).unwrap();
        let first = spec.entities.first().cloned().unwrap();
        spec.entities.push(first);
        assert_eq!(
            spec.build(SourceId(1)),
            Err(WorldError::DuplicateEntity(EntityId(1)))
        );
    }

    #[test]
    fn rejects_overfull_node() {
        let mut spec = WorldSpec::default();
        spec.nodes.push(NodeSpec {
            x: 0,
            y: 0,
            amount: 9,
            capacity: 3,
            regen: 1,
        });
        assert!(spec.build(SourceId(1)).is_err());
    }

    #[test]
    fn rejects_negative_rule() {
        let mut spec = WorldSpec::default();
        spec.rules.move_cost = Decimal::NEGATIVE_ONE;
        assert!(spec.build(SourceId(1)).is_err());
    }
}
