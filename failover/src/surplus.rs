//! Selects the instances to tear down when single mode converges.

use indexmap::IndexMap;

use crate::identity::{InstanceGroupSnapshot, InstanceIdentity};
use crate::metrics_defs::SURPLUS_SELECTED;
use shared::histogram;

/// Instances to delete, keyed by owning group in snapshot order.
pub type DeleteSet<I> = IndexMap<String, Vec<I>>;

/// Every live instance except the validator is surplus.
///
/// Without a validator every live instance is surplus, the cluster is shrunk
/// toward the smallest footprint rather than keeping unidentified extras.
/// Groups with nothing to delete are left out.
pub fn select_surplus<I: InstanceIdentity>(
    groups: &[InstanceGroupSnapshot<I>],
    validator: Option<&I>,
) -> DeleteSet<I> {
    let mut delete_set: DeleteSet<I> = IndexMap::new();

    for group in groups {
        let surplus = group
            .instances
            .iter()
            .filter(|instance| !validator.is_some_and(|v| instance.is_same_instance(v)))
            .cloned();

        let mut surplus = surplus.peekable();
        if surplus.peek().is_some() {
            delete_set
                .entry(group.group.clone())
                .or_default()
                .extend(surplus);
        }
    }

    let selected = surplus_count(&delete_set);
    histogram!(SURPLUS_SELECTED).record(selected as f64);
    tracing::debug!(
        selected,
        groups = delete_set.len(),
        has_validator = validator.is_some(),
        "selected surplus instances"
    );

    delete_set
}

pub fn surplus_count<I>(delete_set: &DeleteSet<I>) -> usize {
    delete_set.values().map(Vec::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{TestInstance, group};

    fn instances(group: &str, ids: &[&str]) -> Vec<TestInstance> {
        ids.iter().map(|id| TestInstance::new(group, id)).collect()
    }

    #[test]
    fn test_keeps_validator() {
        let groups = vec![
            group("A", 0, "Central US", &["id1", "id2"]),
            group("B", 1, "East US", &["id3"]),
        ];
        let validator = TestInstance::new("A", "id1");

        let delete_set = select_surplus(&groups, Some(&validator));

        let expected: DeleteSet<TestInstance> = IndexMap::from([
            ("A".to_string(), instances("A", &["id2"])),
            ("B".to_string(), instances("B", &["id3"])),
        ]);
        assert_eq!(delete_set, expected);
    }

    #[test]
    fn test_no_validator_deletes_everything() {
        let groups = vec![
            group("A", 0, "Central US", &["id1", "id2"]),
            group("B", 1, "East US", &["id3"]),
        ];

        let delete_set = select_surplus(&groups, None);

        let expected: DeleteSet<TestInstance> = IndexMap::from([
            ("A".to_string(), instances("A", &["id1", "id2"])),
            ("B".to_string(), instances("B", &["id3"])),
        ]);
        assert_eq!(delete_set, expected);
        assert_eq!(surplus_count(&delete_set), 3);
    }

    #[test]
    fn test_lone_validator_is_untouched() {
        let groups = vec![
            group("A", 0, "Central US", &["id1"]),
            group("B", 1, "East US", &[]),
        ];
        let validator = TestInstance::new("A", "id1");

        assert!(select_surplus(&groups, Some(&validator)).is_empty());
    }

    #[test]
    fn test_never_deletes_validator_and_always_shrinks() {
        let groups = vec![
            group("A", 0, "Central US", &["id1", "id2"]),
            group("B", 1, "East US", &["id3", "id4"]),
            group("C", 2, "West US", &["id5"]),
        ];

        for validator in groups.iter().flat_map(|g| g.instances.iter()) {
            let delete_set = select_surplus(&groups, Some(validator));
            assert_eq!(surplus_count(&delete_set), 4);
            assert!(
                delete_set
                    .values()
                    .flatten()
                    .all(|instance| instance != validator)
            );
        }
    }

    #[test]
    fn test_validator_in_other_group_with_same_id() {
        // Identity includes the group, an equal id elsewhere is a different instance
        let groups = vec![
            group("A", 0, "Central US", &["id1"]),
            group("B", 1, "East US", &["id1"]),
        ];
        let validator = TestInstance::new("B", "id1");

        let delete_set = select_surplus(&groups, Some(&validator));
        assert_eq!(delete_set.keys().collect::<Vec<_>>(), vec!["A"]);
    }
}
