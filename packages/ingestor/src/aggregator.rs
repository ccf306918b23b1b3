//! The aggregator: a pure, total function from raw events to counts (C2).
//!
//! No I/O, no async, never fails. Grouping is case-insensitive under an
//! ASCII fold; the representative spelling kept for each group is the
//! first one observed. Output is sorted by that fold key, ties broken
//! by first-observed order (a stable sort gives us this for free).

use std::collections::HashMap;

use crate::domain::RawEvent;

/// One (event type, count) pair emitted by [`aggregate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateRow {
    pub event_type: String,
    pub count: i64,
}

pub fn aggregate(events: &[RawEvent]) -> Vec<AggregateRow> {
    let mut seen_order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (String, i64)> = HashMap::new();

    for event in events {
        let fold_key = event.event_type.to_ascii_lowercase();
        match groups.get_mut(&fold_key) {
            Some((_, count)) => *count += 1,
            None => {
                groups.insert(fold_key.clone(), (event.event_type.clone(), 1));
                seen_order.push(fold_key);
            }
        }
    }

    let mut rows: Vec<AggregateRow> = seen_order
        .into_iter()
        .map(|key| {
            let (representative, count) = groups.remove(&key).expect("key was just inserted");
            AggregateRow {
                event_type: representative,
                count,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        a.event_type
            .to_ascii_lowercase()
            .cmp(&b.event_type.to_ascii_lowercase())
    });

    rows
}
