//! Field-level diffs between two world states.
//!
//! Diffs feed observation events only. They are rendered as strings and are
//! never read back into state.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use lockstep_types::DiffEntry;

use crate::state::WorldState;

/// Every field that differs between `before` and `after`, in state order:
/// entities by id, then nodes by cell, then policy.
pub fn diff_states(before: &WorldState, after: &WorldState) -> Vec<DiffEntry> {
    let mut out = Vec::new();

    diff_maps("entity", &before.entities, &after.entities, &mut out, |prefix, b, a, out| {
        push_field(out, prefix, "position", &b.position, &a.position);
        push_field(out, prefix, "energy", &b.energy, &a.energy);
        push_field(out, prefix, "stock", &b.stock, &a.stock);
        push_field(out, prefix, "goal", &render_opt(b.goal), &render_opt(a.goal));
    });

    diff_maps("node", &before.nodes, &after.nodes, &mut out, |prefix, b, a, out| {
        push_field(out, prefix, "amount", &b.amount, &a.amount);
    });

    diff_maps(
        "policy.zone",
        &before.policy.restricted,
        &after.policy.restricted,
        &mut out,
        |prefix, b, a, out| {
            push_field(out, prefix, "area", &fmt_area(b), &fmt_area(a));
        },
    );

    if before.policy.transfer_cap != after.policy.transfer_cap {
        out.push(DiffEntry {
            path: "policy.transfer_cap".to_owned(),
            before: before.policy.transfer_cap.map(|c| c.to_string()),
            after: after.policy.transfer_cap.map(|c| c.to_string()),
        });
    }

    out
}

/// Walk the union of keys. Added and removed keys produce one entry each;
/// changed values are handed to `changed` with the key's path prefix.
fn diff_maps<K, V, F>(
    label: &str,
    before: &BTreeMap<K, V>,
    after: &BTreeMap<K, V>,
    out: &mut Vec<DiffEntry>,
    mut changed: F,
) where
    K: Ord + Display,
    V: PartialEq,
    F: FnMut(&str, &V, &V, &mut Vec<DiffEntry>),
{
    let keys: BTreeSet<&K> = before.keys().chain(after.keys()).collect();
    for key in keys {
        let prefix = format!("{label}.{key}");
        match (before.get(key), after.get(key)) {
            (Some(b), Some(a)) if b != a => changed(&prefix, b, a, out),
            (Some(_), None) => out.push(DiffEntry {
                path: prefix,
                before: Some("present".to_owned()),
                after: None,
            }),
            (None, Some(_)) => out.push(DiffEntry {
                path: prefix,
                before: None,
                after: Some("present".to_owned()),
            }),
            _ => {}
        }
    }
}

fn push_field<T: Display + PartialEq + ?Sized>(
    out: &mut Vec<DiffEntry>,
    prefix: &str,
    field: &str,
    before: &T,
    after: &T,
) {
    if before != after {
        out.push(DiffEntry {
            path: format!("{prefix}.{field}"),
            before: Some(before.to_string()),
            after: Some(after.to_string()),
        });
    }
}

fn render_opt<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| "none".to_owned(), |v| v.to_string())
}

fn fmt_area(area: &lockstep_types::Area) -> String {
    format!(
        "[{}..={}, {}..={}]",
        area.min_x, area.max_x, area.min_y, area.max_y
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lockstep_types::{Area, EntityId, SourceId, ZoneId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::genesis::{EntitySpec, WorldSpec};

    fn world() -> WorldState {
        let spec = WorldSpec {
            entities: vec![EntitySpec {
                id: EntityId(1),
                owner: SourceId(1),
                x: 0,
                y: 0,
                energy: Decimal::TEN,
                stock: 0,
            }],
            ..WorldSpec::default()
        };
        spec.build(SourceId(7)).unwrap()
    }

    #[test]
    fn identical_states_have_empty_diff() {
        let w = world();
        assert!(diff_states(&w, &w.clone()).is_empty());
    }

    #[test]
    fn entity_field_changes_are_listed() {
        let before = world();
        let mut after = before.clone();
        let e = after.entities.get_mut(&EntityId(1)).unwrap();
        e.stock = 2;
        e.energy = Decimal::new(95, 1);
        let paths: Vec<String> = diff_states(&before, &after).into_iter().map(|d| d.path).collect();
        assert_eq!(paths, vec!["entity.1.energy", "entity.1.stock"]);
    }

    #[test]
    fn policy_changes_are_listed() {
        let before = world();
        let mut after = before.clone();
        after.policy.transfer_cap = Some(4);
        after.policy.restricted.insert(
            ZoneId(2),
            Area {
                min_x: 0,
                min_y: 0,
                max_x: 1,
                max_y: 1,
            },
        );
        let diff = diff_states(&before, &after);
        assert_eq!(diff.len(), 2);
        let cap = diff.last().unwrap();
        assert_eq!(cap.path, "policy.transfer_cap");
        assert_eq!(cap.after.as_deref(), Some("4"));
    }
}
