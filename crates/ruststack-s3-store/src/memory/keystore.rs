//! Sorted key pagination.
//!
//! Objects and uploads are held in `BTreeMap`s so keys are always sorted,
//! which is what makes cursor-based paging stable. [`page_keys`] applies
//! prefix, delimiter, cursor and max-keys the way a `ListObjectsV2` call does.

use std::collections::BTreeMap;
use std::ops::Bound;

/// One slot of a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Listed<'a, V> {
    /// A key and its value.
    Entry(&'a str, &'a V),
    /// A delimiter-matched common prefix.
    Prefix(String),
}

/// Collect one page from `map`.
///
/// Common prefixes count toward `max_keys` like keys do. When the cursor is
/// itself a common prefix, every key under it is skipped so the next page
/// starts after the whole group. Returns the page and the cursor for the
/// next one.
pub(crate) fn page_keys<'a, V>(
    map: &'a BTreeMap<String, V>,
    prefix: &str,
    delimiter: Option<&str>,
    cursor: Option<&str>,
    max_keys: usize,
) -> (Vec<Listed<'a, V>>, Option<String>) {
    let max_keys = max_keys.max(1);
    let delimiter = delimiter.filter(|d| !d.is_empty());
    let cursor = cursor.filter(|c| !c.is_empty());
    let cursor_is_group = match (cursor, delimiter) {
        (Some(c), Some(d)) => c.len() > prefix.len() && c.ends_with(d),
        _ => false,
    };

    let start = match cursor {
        Some(c) if c > prefix => c,
        _ => prefix,
    };

    let mut slots: Vec<Listed<'a, V>> = Vec::new();
    let mut last_prefix: Option<String> = None;
    let mut truncated = false;

    for (key, value) in map.range::<str, _>((Bound::Included(start), Bound::Unbounded)) {
        if !key.starts_with(prefix) {
            break;
        }

        if let Some(c) = cursor {
            if key.as_str() <= c || (cursor_is_group && key.starts_with(c)) {
                continue;
            }
        }

        let group = delimiter.and_then(|d| {
            let after_prefix = &key[prefix.len()..];
            after_prefix
                .find(d)
                .map(|pos| format!("{prefix}{}{d}", &after_prefix[..pos]))
        });

        // Later keys of an already listed group.
        if group.is_some() && group == last_prefix {
            continue;
        }
        if slots.len() >= max_keys {
            truncated = true;
            break;
        }
        if let Some(cp) = group {
            last_prefix = Some(cp.clone());
            slots.push(Listed::Prefix(cp));
        } else {
            slots.push(Listed::Entry(key, value));
        }
    }

    let next_cursor = if truncated {
        slots.last().map(|slot| match slot {
            Listed::Entry(key, _) => (*key).to_owned(),
            Listed::Prefix(cp) => cp.clone(),
        })
    } else {
        None
    };

    (slots, next_cursor)
}
