use proptest::prelude::*;
use rowshape::db::{Config, Facade};
use rowshape::inter::memory::MemoryDriver;
use rowshape::inter::{Portion, RawRow};
use rowshape::layout::{
    layout_list_of, layout_map_of, layout_set_of, row_value_of, ResultBuilder, ResultLayout,
};
use rowshape::primitives::{chop_and_pad_by, chop_by, ArrayBuilder};
use rowshape::types::Value;
use std::collections::{HashMap, HashSet};

fn arb_batches() -> impl Strategy<Value = Vec<Vec<i64>>> {
    prop::collection::vec(prop::collection::vec(-50i64..50, 0..8), 0..10)
}

fn arb_entries() -> impl Strategy<Value = Vec<Vec<(String, i64)>>> {
    prop::collection::vec(
        prop::collection::vec(("[a-e]", any::<i64>()), 0..6),
        0..6,
    )
}

fn rows_portion(batch: &[i64]) -> Portion {
    Portion::Rows(batch.iter().map(|v| RawRow::Value(Value::Int(*v))).collect())
}

proptest! {
    #[test]
    fn prop_list_is_concatenation_of_batches(batches in arb_batches()) {
        let layout = layout_list_of(row_value_of::<i64>());
        let mut builder = layout.make_builder();
        for batch in &batches {
            builder.add(rows_portion(batch)).unwrap();
        }
        let expected: Vec<i64> = batches.iter().flatten().copied().collect();
        prop_assert_eq!(builder.build(), Some(expected));
    }

    #[test]
    fn prop_set_is_deduplicated_concatenation(batches in arb_batches()) {
        let layout = layout_set_of(row_value_of::<i64>());
        let mut builder = layout.make_builder();
        for batch in &batches {
            builder.add(rows_portion(batch)).unwrap();
        }
        let expected: HashSet<i64> = batches.iter().flatten().copied().collect();
        prop_assert_eq!(builder.build(), Some(expected));
    }

    #[test]
    fn prop_map_keeps_last_write(batches in arb_entries()) {
        let layout = layout_map_of::<String, i64>();
        let mut builder = layout.make_builder();
        let mut expected = HashMap::new();
        for batch in &batches {
            let rows = batch
                .iter()
                .map(|(k, v)| RawRow::Entry(Value::from(k.as_str()), Value::Int(*v)))
                .collect();
            builder.add(Portion::Rows(rows)).unwrap();
            for (k, v) in batch {
                expected.insert(k.clone(), *v);
            }
        }
        prop_assert_eq!(builder.build(), Some(expected));
    }

    #[test]
    fn prop_array_builder_size_is_sum_of_batches(batches in arb_batches()) {
        let mut builder = ArrayBuilder::new();
        for batch in &batches {
            builder.add_array(batch.clone());
        }
        let total: usize = batches.iter().map(Vec::len).sum();
        prop_assert_eq!(builder.len(), total);
        prop_assert_eq!(builder.iter().count(), total);
    }

    #[test]
    fn prop_packs_concatenate_to_run(n in 0i64..60, size in 1usize..16) {
        let rows: Vec<Vec<Value>> = (0..n).map(|i| vec![Value::Int(i)]).collect();
        let driver = MemoryDriver::new().with_rows("select n", rows);
        let facade = Facade::new(driver, Config::default());
        let session = facade.open_session().unwrap();
        let mut runner = session
            .query("select n", layout_list_of(row_value_of::<i64>()))
            .unwrap();
        runner.pack_by(size).unwrap();

        let mut packs = 0;
        let mut streamed = Vec::new();
        while let Some(pack) = runner.next_pack().unwrap() {
            prop_assert!(!pack.is_empty() && pack.len() <= size);
            packs += 1;
            streamed.extend(pack);
        }
        prop_assert_eq!(packs, (n as usize).div_ceil(size));
        prop_assert_eq!(Some(streamed), runner.run().unwrap());
    }

    #[test]
    fn prop_chop_preserves_order(items in prop::collection::vec(any::<u16>(), 0..40), size in 1usize..9) {
        let chunks = chop_by(&items, size).unwrap();
        prop_assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= size));
        let flat: Vec<u16> = chunks.into_iter().flatten().collect();
        prop_assert_eq!(&flat, &items);

        let padded = chop_and_pad_by(&items, size).unwrap();
        prop_assert!(padded.iter().all(|c| c.len() == size));
        let flat: Vec<u16> = padded.into_iter().flatten().flatten().collect();
        prop_assert_eq!(flat, items);
    }
}
