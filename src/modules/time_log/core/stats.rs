// Duration statistics grouped by category path.
//
// Key rule
// - Categories are paths joined by a caller supplied separator, e.g. "Work/Meetings".
// - Without a filter, entries group by their first path segment.
// - With filter f, only f itself and its descendants count, grouped one level below f.
//
// Durations come from HistoryEntry and are not clipped to the query window.
// An open entry adds nothing to the sum and flags its group as open.

use crate::modules::time_log::core::entry::HistoryEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsEntry {
    pub category: String,
    pub duration: i64,
    pub open: bool,
}

pub fn summarize(entries: &[HistoryEntry], category: &str, separator: &str) -> Vec<StatsEntry> {
    let mut groups: BTreeMap<String, StatsEntry> = BTreeMap::new();
    for history in entries {
        let Some(key) = group_key(&history.entry.category, category, separator) else {
            continue;
        };
        let stats = groups.entry(key.clone()).or_insert_with(|| StatsEntry {
            category: key,
            duration: 0,
            open: false,
        });
        match history.duration {
            Some(duration) => stats.duration = stats.duration.saturating_add(duration),
            None => stats.open = true,
        }
    }
    groups.into_values().collect()
}

fn group_key(category: &str, filter: &str, separator: &str) -> Option<String> {
    if filter.is_empty() {
        return Some(first_segment(category, separator).to_owned());
    }
    if category == filter {
        return Some(filter.to_owned());
    }
    if separator.is_empty() {
        return None;
    }
    let rest = category.strip_prefix(filter)?.strip_prefix(separator)?;
    Some(format!("{filter}{separator}{}", first_segment(rest, separator)))
}

fn first_segment<'a>(category: &'a str, separator: &str) -> &'a str {
    if separator.is_empty() {
        return category;
    }
    category
        .split_once(separator)
        .map_or(category, |(head, _)| head)
}
