//! Identity-aware pairing of array items.
//!
//! Items carrying a `_key` are matched by key regardless of position;
//! items without one are paired by their ordinal among the unkeyed items
//! on each side. Anything left over is added or removed.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;

use crate::value::item_key;

/// A pairing of one item across the two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ItemMatch {
    pub from_index: Option<usize>,
    pub to_index: Option<usize>,
}

/// Pair the items of `from` and `to`.
///
/// The result lists every item of both sides exactly once: `to` items in
/// order, each removed item placed just before the first `to` item matched
/// to a later `from` position.
pub(crate) fn match_items(from: &[Value], to: &[Value]) -> Vec<ItemMatch> {
    let mut from_by_key: HashMap<&str, usize> = HashMap::new();
    for (i, item) in from.iter().enumerate() {
        if let Some(key) = item_key(item) {
            from_by_key.entry(key).or_insert(i);
        }
    }

    let mut from_matched = vec![false; from.len()];
    let mut to_match: Vec<Option<usize>> = vec![None; to.len()];

    // Keyed items first, in `to` order.
    for (j, item) in to.iter().enumerate() {
        let Some(key) = item_key(item) else { continue };
        if let Some(&i) = from_by_key.get(key) {
            if !from_matched[i] {
                from_matched[i] = true;
                to_match[j] = Some(i);
            }
        }
    }

    // Then positional pairing of the unkeyed items.
    let unkeyed_from = from
        .iter()
        .enumerate()
        .filter(|(i, item)| !from_matched[*i] && item_key(item).is_none())
        .map(|(i, _)| i);
    let unkeyed_to = to
        .iter()
        .enumerate()
        .filter(|(j, item)| to_match[*j].is_none() && item_key(item).is_none())
        .map(|(j, _)| j);
    let pairs: Vec<(usize, usize)> = unkeyed_from.zip(unkeyed_to).collect();
    for (i, j) in pairs {
        from_matched[i] = true;
        to_match[j] = Some(i);
    }

    let mut removed: VecDeque<usize> = (0..from.len()).filter(|i| !from_matched[*i]).collect();
    let mut out = Vec::with_capacity(from.len().max(to.len()));
    for (j, matched) in to_match.into_iter().enumerate() {
        if let Some(i) = matched {
            while let Some(&r) = removed.front() {
                if r >= i {
                    break;
                }
                removed.pop_front();
                out.push(ItemMatch {
                    from_index: Some(r),
                    to_index: None,
                });
            }
        }
        out.push(ItemMatch {
            from_index: matched,
            to_index: Some(j),
        });
    }
    out.extend(removed.into_iter().map(|r| ItemMatch {
        from_index: Some(r),
        to_index: None,
    }));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn m(from: Option<usize>, to: Option<usize>) -> ItemMatch {
        ItemMatch {
            from_index: from,
            to_index: to,
        }
    }

    #[test]
    fn keyed_rotation() {
        let a = json!({"_key": "a"});
        let b = json!({"_key": "b"});
        let c = json!({"_key": "c"});
        let out = match_items(&[a.clone(), b.clone(), c.clone()], &[c, a, b]);
        assert_eq!(out, vec![m(Some(2), Some(0)), m(Some(0), Some(1)), m(Some(1), Some(2))]);
    }

    #[test]
    fn keyed_insert_and_remove() {
        let x = json!({"_key": "x"});
        let y = json!({"_key": "y"});
        let z = json!({"_key": "z"});
        let out = match_items(&[x.clone(), y], &[x, z]);
        assert_eq!(out, vec![m(Some(0), Some(0)), m(None, Some(1)), m(Some(1), None)]);
    }

    #[test]
    fn removed_item_interleaved_before_later_match() {
        let a = json!({"_key": "a"});
        let b = json!({"_key": "b"});
        let c = json!({"_key": "c"});
        let out = match_items(&[a.clone(), b, c.clone()], &[a, c]);
        assert_eq!(out, vec![m(Some(0), Some(0)), m(Some(1), None), m(Some(2), Some(1))]);
    }

    #[test]
    fn unkeyed_positional() {
        let out = match_items(&[json!(1), json!(2)], &[json!(1), json!(5), json!(9)]);
        assert_eq!(out, vec![m(Some(0), Some(0)), m(Some(1), Some(1)), m(None, Some(2))]);
    }

    #[test]
    fn duplicate_keys_match_once() {
        let a = json!({"_key": "a", "v": 1});
        let a2 = json!({"_key": "a", "v": 2});
        let out = match_items(&[a.clone()], &[a, a2]);
        assert_eq!(out, vec![m(Some(0), Some(0)), m(None, Some(1))]);
    }

    #[test]
    fn mixed_keyed_and_unkeyed() {
        let k = json!({"_key": "k"});
        let out = match_items(&[json!("s"), k.clone()], &[k, json!("t")]);
        assert_eq!(out, vec![m(Some(1), Some(0)), m(Some(0), Some(1))]);
    }
}
