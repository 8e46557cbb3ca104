//! Small text helpers shared by the indexer and resolver.

use std::collections::HashSet;
use std::hash::Hash;

use crate::constants::indexer::{EVENT_INDEX_WIDTH, FIELD_JOIN};
use crate::types::{EventId, PageTitle};

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_inline_whitespace<T: AsRef<str>>(text: T) -> String {
    let mut normalized = String::new();
    let mut seen_space = false;
    for ch in text.as_ref().chars() {
        if ch.is_whitespace() {
            if !seen_space {
                normalized.push(' ');
                seen_space = true;
            }
        } else {
            normalized.push(ch);
            seen_space = false;
        }
    }
    normalized.trim().to_string()
}

/// Stable id of the `index`-th event of `page_title`, e.g. `Ada_Lovelace_004`.
pub fn event_id(page_title: &str, index: usize) -> EventId {
    format!(
        "{}_{index:0width$}",
        page_title.replace(' ', "_"),
        width = EVENT_INDEX_WIDTH
    )
}

/// Stored titles may use underscores; output titles use spaces.
pub fn display_title(title: &str) -> PageTitle {
    title.replace('_', " ")
}

/// Drop repeated items, keeping the first occurrence of each.
pub fn dedup_in_order<T, I>(items: I) -> Vec<T>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Join multi-valued fields with `|`.
pub fn join_fields<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(FIELD_JOIN)
}
