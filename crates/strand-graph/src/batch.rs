//! Continuation batching: splitting, reparenting and residual merging.
//!
//! The remote resolves at most [`BATCH_CAP`] child ids per request and
//! answers with a flat list in arbitrary order. These functions bound the
//! request, rebuild the tree the answer describes and carry whatever is left
//! into a single residual continuation.

use std::collections::HashMap;

use strand_source::{RawMore, RawThing, RawTree, Request};
use strand_types::{CommentSort, PostRef};

/// Largest number of ids resolved by one batch request.
pub const BATCH_CAP: usize = 100;

/// Path of the batch endpoint.
pub const MORE_CHILDREN_PATH: &str = "/api/morechildren";

/// Split `ids` into the batch to fetch now and the ids left over.
pub fn split_ids(ids: &[String]) -> (&[String], &[String]) {
    ids.split_at(ids.len().min(BATCH_CAP))
}

/// Request resolving `ids` under `link`.
pub fn batch_request(link: &PostRef, ids: &[String], sort: CommentSort) -> Request {
    Request::new(MORE_CHILDREN_PATH)
        .query("link_id", &link.fullname)
        .query("children", ids.join(","))
        .query("sort", sort.as_str())
        .query("api_type", "json")
}

/// Rebuild trees from a flat batch result.
///
/// An entity whose declared parent is in the same batch is nested under it;
/// every other entity is a root. Roots and replies keep source order.
pub fn reparent(things: Vec<RawThing>) -> Vec<RawTree> {
    let index: HashMap<String, usize> = things
        .iter()
        .enumerate()
        .filter(|(_, thing)| !thing.is_more())
        .filter_map(|(i, thing)| thing.name().map(|name| (name.to_string(), i)))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); things.len()];
    let mut roots = Vec::new();
    for (i, thing) in things.iter().enumerate() {
        match thing.parent_id().and_then(|parent| index.get(parent)) {
            Some(&parent) if parent != i => children[parent].push(i),
            _ => roots.push(i),
        }
    }

    let mut slots: Vec<Option<RawThing>> = things.into_iter().map(Some).collect();
    let mut trees: Vec<RawTree> = roots
        .into_iter()
        .filter_map(|i| build(i, &mut slots, &children))
        .collect();
    // Entities caught in a parent cycle are never reached from a root.
    for i in 0..slots.len() {
        if let Some(tree) = build(i, &mut slots, &children) {
            trees.push(tree);
        }
    }
    trees
}

fn build(i: usize, slots: &mut [Option<RawThing>], children: &[Vec<usize>]) -> Option<RawTree> {
    let thing = slots[i].take()?;
    let replies = children[i]
        .iter()
        .filter_map(|&child| build(child, slots, children))
        .collect();
    Some(RawTree { thing, replies })
}

/// Ids the residual continuation must carry, if any remain.
///
/// When the batch result ends with a breadth continuation under the same
/// parent, that stub is removed from `trees` and its ids are appended after
/// `remaining`, so the caller shows one continuation instead of two.
pub fn merge_residual(
    trees: &mut Vec<RawTree>,
    remaining: &[String],
    parent_id: &str,
) -> Option<Vec<String>> {
    if remaining.is_empty() {
        return None;
    }
    let mut ids = remaining.to_vec();
    let trailing = trees
        .last()
        .filter(|tree| tree.thing.is_more() && tree.thing.parent_id() == Some(parent_id))
        .and_then(|tree| tree.thing.parse::<RawMore>().ok())
        .filter(|more| !more.children.is_empty());
    if let Some(more) = trailing {
        trees.pop();
        ids.extend(more.children);
    }
    Some(ids)
}

/// Find the tree rooted at `fullname`, searching depth first.
pub fn find_subtree(trees: Vec<RawTree>, fullname: &str) -> Option<RawTree> {
    for tree in trees {
        if tree.thing.name() == Some(fullname) {
            return Some(tree);
        }
        if let Some(found) = find_subtree(tree.replies, fullname) {
            return Some(found);
        }
    }
    None
}

/// The trees that come after the one named `after`. All of them when
/// `after` is absent or unknown.
pub fn replies_after(trees: Vec<RawTree>, after: Option<&str>) -> Vec<RawTree> {
    match after.and_then(|a| trees.iter().position(|t| t.thing.name() == Some(a))) {
        Some(i) => trees.into_iter().skip(i + 1).collect(),
        None => trees,
    }
}
