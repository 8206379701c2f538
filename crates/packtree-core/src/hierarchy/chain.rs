//! Link validation: rebuild chains from a batch of proposed links and check
//! them against the real tree.
//!
//! Validation runs in three passes:
//!
//! 1. **Sanitize**: at most two links per child, and two only when one of
//!    them is an unlink (moving a package out of one parent into another).
//! 2. **Build chains**: starting from every *terminal child* (a child that is
//!    never a parent in the batch), follow parent links up to a *terminal
//!    parent*. A repeated node is a loop; a chain longer than the maximum
//!    depth is rejected on the spot. Links never reached from a terminal
//!    child can only be part of a cycle.
//! 3. **Validate chains**: each chain is grafted onto the current tree. Its
//!    top must not already be below one of the chain's nodes, and every node
//!    must still fit the depth budget left above the chain.
//!
//! Chains are validated one at a time; two chains landing in the same tree
//! are not checked together.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use super::error::{HierarchyError, HierarchyResult};
use super::store::PackageStore;
use crate::model::{HierarchyLink, PackageId};

/// Proposed chain of packages, terminal child first, terminal parent last.
pub type Chain = Vec<PackageId>;

/// Check a batch of links against the configured maximum depth and the
/// current state of `store`.
pub fn validate_links(links: &[&HierarchyLink], store: &PackageStore) -> HierarchyResult<()> {
    if links.is_empty() {
        return Ok(());
    }
    sanitize(links, store)?;
    let chains = build_chains(links, store)?;

    let unlinked: BTreeSet<PackageId> = links
        .iter()
        .filter(|l| l.is_unlink())
        .map(|l| l.child)
        .collect();
    for chain in &chains {
        validate_chain(chain, &unlinked, store)?;
    }

    debug!(links = links.len(), chains = chains.len(), "links validated");
    Ok(())
}

/// Per-child cardinality check.
pub fn sanitize(links: &[&HierarchyLink], store: &PackageStore) -> HierarchyResult<()> {
    let mut per_child: BTreeMap<PackageId, (usize, usize)> = BTreeMap::new();
    for link in links {
        let entry = per_child.entry(link.child).or_default();
        entry.0 += 1;
        if link.is_unlink() {
            entry.1 += 1;
        }
    }

    for (child, (count, unlinks)) in per_child {
        if count > 2 || (count == 2 && unlinks != 1) {
            warn!(child = %child, count, unlinks, "link cardinality violated");
            return Err(HierarchyError::LinkCardinality {
                child: store.label(child),
            });
        }
    }
    Ok(())
}

/// Rebuild the chains described by the non-unlink links of a sanitized batch.
pub fn build_chains(links: &[&HierarchyLink], store: &PackageStore) -> HierarchyResult<Vec<Chain>> {
    let max_depth = store.config().max_package_depth;

    let edges: Vec<(PackageId, PackageId)> = links
        .iter()
        .filter_map(|l| l.parent.map(|parent| (l.child, parent)))
        .collect();
    let parents: BTreeSet<PackageId> = edges.iter().map(|e| e.1).collect();
    let children: BTreeSet<PackageId> = edges.iter().map(|e| e.0).collect();
    let terminal_parents: BTreeSet<PackageId> = parents.difference(&children).copied().collect();
    let terminal_children: Vec<PackageId> = children.difference(&parents).copied().collect();

    let edge_of_child: BTreeMap<PackageId, usize> = edges
        .iter()
        .enumerate()
        .map(|(idx, e)| (e.0, idx))
        .collect();
    let mut unvisited: BTreeSet<usize> = (0..edges.len()).collect();

    let mut chains = Vec::new();
    for child in terminal_children {
        let mut chain_length = 2;
        let mut nodes = vec![child];
        let Some(mut current) = edge_of_child.get(&child).copied() else {
            continue;
        };

        while chain_length <= max_depth {
            unvisited.remove(&current);
            let parent = edges[current].1;
            if nodes.contains(&parent) {
                nodes.push(parent);
                return Err(loop_error(&nodes, store));
            }
            nodes.push(parent);
            if terminal_parents.contains(&parent) {
                break;
            }
            match edge_of_child.get(&parent) {
                Some(next) => current = *next,
                None => break,
            }
            chain_length += 1;
        }

        if chain_length > max_depth {
            warn!(child = %child, chain_length, max_depth, "chain too long");
            return Err(HierarchyError::DepthExceeded {
                package: store.label(child),
                depth: chain_length,
                max_depth,
            });
        }
        chains.push(nodes);
    }

    if !unvisited.is_empty() {
        let nodes: Vec<PackageId> = unvisited.iter().map(|idx| edges[*idx].0).collect();
        return Err(loop_error(&nodes, store));
    }
    Ok(chains)
}

/// Graft one chain onto the current tree and check loops and depth.
///
/// `unlinked` holds the children of the batch's unlinks: a chain whose top is
/// being detached starts from the root level.
pub fn validate_chain(
    chain: &[PackageId],
    unlinked: &BTreeSet<PackageId>,
    store: &PackageStore,
) -> HierarchyResult<()> {
    let Some(&top) = chain.last() else {
        return Ok(());
    };
    let max_depth = store.config().max_package_depth;

    let current_ancestors = store.ancestors(top);
    if chain.iter().any(|node| current_ancestors.contains(node)) {
        return Err(loop_error(chain, store));
    }

    let length_above = if unlinked.contains(&top) {
        0
    } else {
        u32::try_from(current_ancestors.len()).unwrap_or(u32::MAX)
    };
    let allowed_below = i64::from(max_depth) - i64::from(length_above);

    let len = chain.len();
    for (i, node) in chain.iter().enumerate() {
        let below = i64::try_from(len - i).unwrap_or(i64::MAX) + i64::from(store.depth(*node)) - 1;
        if below > allowed_below {
            let depth = u32::try_from(below + i64::from(length_above)).unwrap_or(u32::MAX);
            warn!(package = %node, depth, max_depth, "chain exceeds depth");
            return Err(HierarchyError::DepthExceeded {
                package: store.label(*node),
                depth,
                max_depth,
            });
        }
    }
    Ok(())
}

fn loop_error(nodes: &[PackageId], store: &PackageStore) -> HierarchyError {
    let mut seen = BTreeSet::new();
    HierarchyError::Loop {
        packages: nodes
            .iter()
            .filter(|id| seen.insert(**id))
            .map(|id| store.label(*id))
            .collect(),
    }
}
