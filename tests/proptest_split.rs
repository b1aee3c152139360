use std::collections::HashSet;

use labelforge::annotations::render_line;
use labelforge::model::{ClassId, LabelClass, NormalizedBox, VersionId};
use labelforge::registry::LabelRegistry;
use labelforge::split::{partition, Split, SplitCounts, SplitRatios};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(128);
    ProptestConfig {
        cases,
        ..ProptestConfig::default()
    }
}

/// Ratios that sum to one, built from two cut points in `[0, 1]`.
fn arb_ratios() -> impl Strategy<Value = SplitRatios> {
    (0.0f64..=1.0, 0.0f64..=1.0).prop_map(|(a, b)| {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        SplitRatios::new(lo, hi - lo, 1.0 - hi).expect("cut points give a unit sum")
    })
}

fn arb_unit() -> impl Strategy<Value = f64> {
    0.0f64..=1.0
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn counts_always_sum_to_total(total in 0usize..2000, ratios in arb_ratios()) {
        let counts = SplitCounts::for_total(total, &ratios);
        prop_assert_eq!(counts.total(), total);
    }

    #[test]
    fn partition_keeps_every_item_once(
        total in 0usize..200,
        ratios in arb_ratios(),
        seed in any::<u64>(),
    ) {
        let items: Vec<usize> = (0..total).collect();
        let result = partition(items, &ratios, Some(seed));

        prop_assert_eq!(result.assignments.len(), total);
        let seen: HashSet<usize> = result.assignments.iter().map(|(i, _)| *i).collect();
        prop_assert_eq!(seen.len(), total);
        for split in Split::ALL {
            prop_assert_eq!(result.members(split).count(), result.counts.get(split));
        }
    }

    #[test]
    fn rendered_lines_parse_back_within_unit_range(
        class in 0u32..500,
        x in arb_unit(),
        y in arb_unit(),
        w in arb_unit(),
        h in arb_unit(),
    ) {
        let line = render_line(ClassId(class), &NormalizedBox::new(x, y, w, h));
        let fields: Vec<&str> = line.split(' ').collect();
        prop_assert_eq!(fields.len(), 5);
        prop_assert_eq!(fields[0].parse::<u32>().unwrap(), class);

        for (field, original) in fields[1..].iter().zip([x, y, w, h]) {
            let (_, decimals) = field.split_once('.').unwrap();
            prop_assert_eq!(decimals.len(), 6);
            let value: f64 = field.parse().unwrap();
            prop_assert!((0.0..=1.0).contains(&value));
            prop_assert!((value - original).abs() <= 5e-7);
        }
    }

    #[test]
    fn class_ids_increase_from_the_loaded_maximum(
        existing in prop::collection::btree_set(0u32..50, 0..10),
        names in prop::collection::vec("[a-e]{1,2}", 0..30),
    ) {
        let version = VersionId(1);
        let classes: Vec<LabelClass> = existing
            .iter()
            .map(|id| LabelClass {
                class_id: ClassId(*id),
                version_id: version,
                name: format!("existing-{id}"),
            })
            .collect();
        let mut registry = LabelRegistry::from_classes(version, &classes);

        let mut next = existing.iter().next_back().map(|m| m + 1).unwrap_or(0);
        let mut assigned = std::collections::HashMap::new();
        for name in &names {
            let id = registry.resolve(name).class_id();
            match assigned.get(name) {
                Some(previous) => prop_assert_eq!(*previous, id),
                None => {
                    prop_assert_eq!(id, ClassId(next));
                    next += 1;
                    assigned.insert(name.clone(), id);
                }
            }
        }
    }
}
