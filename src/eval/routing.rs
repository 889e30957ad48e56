// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Evaluated routing of one tree and fragment categorization

use super::provider::CategoryProvider;
use super::selector::TableFamilySelector;
use crate::csg::{NodeHandle, TreeSnapshot};
use crate::error::{CsgError, CsgResult};
use crate::routing::{Category, RoutingLookup, RoutingRow, RoutingTable};
use ahash::AHashMap;
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;

/// One ancestor's contribution to a brush's routing chain.
///
/// `row` maps the category relative to the subtree below `node` on the path
/// to the origin onto the category relative to `node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteHop {
    pub node: NodeHandle,
    pub row: RoutingRow,
}

impl RouteHop {
    /// Apply a chain of hops to a starting category.
    ///
    /// A uniform hop ignores its input, as categorization skips the subtree.
    pub fn resolve(hops: &[RouteHop], start: Category) -> Category {
        hops.iter().fold(start, |category, hop| {
            if hop.row.is_uniform() {
                hop.row.get(Category::Inside)
            } else {
                hop.row.get(category)
            }
        })
    }
}

/// Routing tables of one evaluated tree
pub struct TreeRouting {
    snapshot: Arc<TreeSnapshot>,
    shared: Arc<RoutingTable>,
    dedicated: AHashMap<NodeHandle, Arc<RoutingTable>>,
    /// Table slot of every snapshot node; identical in every table
    slots: Vec<u32>,
    selector: Arc<dyn TableFamilySelector>,
}

impl TreeRouting {
    pub(crate) fn new(
        snapshot: Arc<TreeSnapshot>,
        shared: Arc<RoutingTable>,
        dedicated: AHashMap<NodeHandle, Arc<RoutingTable>>,
        slots: Vec<u32>,
        selector: Arc<dyn TableFamilySelector>,
    ) -> Self {
        Self {
            snapshot,
            shared,
            dedicated,
            slots,
            selector,
        }
    }

    pub fn tree(&self) -> NodeHandle {
        self.snapshot.tree()
    }

    pub fn snapshot(&self) -> &TreeSnapshot {
        &self.snapshot
    }

    /// Regular table used by every origin without a dedicated one
    pub fn shared_table(&self) -> &Arc<RoutingTable> {
        &self.shared
    }

    /// Table routing fragments of `origin`
    pub fn table_for(&self, origin: NodeHandle) -> &RoutingTable {
        self.dedicated.get(&origin).unwrap_or(&self.shared)
    }

    pub fn has_dedicated(&self, origin: NodeHandle) -> bool {
        self.dedicated.contains_key(&origin)
    }

    pub fn dedicated_count(&self) -> usize {
        self.dedicated.len()
    }

    /// Brushes of the tree in traversal order
    pub fn brushes(&self) -> Vec<NodeHandle> {
        self.snapshot
            .brushes()
            .map(|i| self.snapshot.nodes()[i].handle)
            .collect()
    }

    pub fn slot_of(&self, node: NodeHandle) -> Option<usize> {
        self.snapshot.index_of(node).map(|i| self.slots[i] as usize)
    }

    /// Lookups from the root down to `brush`, in the table for `brush`
    pub fn chain_lookups(&self, brush: NodeHandle) -> Vec<RoutingLookup> {
        let Some(index) = self.snapshot.index_of(brush) else {
            return Vec::new();
        };
        let table = self.table_for(brush);
        let mut path = self.snapshot.ancestors(index);
        path.reverse();
        path.push(index);
        path.into_iter()
            .filter_map(|i| table.lookup(self.slots[i] as usize))
            .collect()
    }

    /// Heap footprint of all tables in bytes
    pub fn memory_bytes(&self) -> usize {
        self.shared.memory_bytes()
            + self
                .dedicated
                .values()
                .map(|table| table.memory_bytes())
                .sum::<usize>()
    }

    fn origin_index(&self, origin: NodeHandle) -> Option<usize> {
        let index = self.snapshot.index_of(origin)?;
        self.snapshot.nodes()[index].is_brush().then_some(index)
    }

    /// Final category of a fragment of `origin`.
    ///
    /// `provider` gives the fragment's category relative to each brush; it is
    /// only consulted for brushes whose row is not already decided. A handle
    /// that is not a brush of this tree contributes nothing: `Outside`.
    pub fn categorize<P: CategoryProvider + ?Sized>(
        &self,
        origin: NodeHandle,
        provider: &P,
    ) -> CsgResult<Category> {
        if self.origin_index(origin).is_none() {
            log::debug!("origin {} is not a brush of tree {}", origin, self.tree());
            return Ok(Category::Outside);
        }
        self.fold_children(self.table_for(origin), 0, provider)
    }

    /// Categorize many fragments in parallel
    pub fn categorize_batch<P: CategoryProvider + Sync>(
        &self,
        fragments: &[(NodeHandle, P)],
    ) -> Vec<CsgResult<Category>> {
        fragments
            .par_iter()
            .map(|(origin, provider)| self.categorize(*origin, provider))
            .collect()
    }

    fn fold_children<P: CategoryProvider + ?Sized>(
        &self,
        table: &RoutingTable,
        parent: usize,
        provider: &P,
    ) -> CsgResult<Category> {
        let mut acc = Category::Outside;
        for child in self.snapshot.children(parent) {
            acc = self.route_node(table, child, acc, provider)?;
        }
        Ok(acc)
    }

    fn route_node<P: CategoryProvider + ?Sized>(
        &self,
        table: &RoutingTable,
        index: usize,
        left: Category,
        provider: &P,
    ) -> CsgResult<Category> {
        let row = table.route(self.slots[index] as usize, left);
        if row.is_uniform() {
            return Ok(row.get(Category::Inside));
        }
        let inner = self.subtree_category(table, index, provider)?;
        Ok(row.get(inner))
    }

    /// Category relative to the subtree at `index` alone
    fn subtree_category<P: CategoryProvider + ?Sized>(
        &self,
        table: &RoutingTable,
        index: usize,
        provider: &P,
    ) -> CsgResult<Category> {
        let node = &self.snapshot.nodes()[index];
        if !node.is_brush() {
            return self.fold_children(table, index, provider);
        }
        if node.mesh.is_none() {
            return Ok(Category::Outside);
        }
        let category = provider.category(node.handle);
        if category.is_valid() {
            Ok(category)
        } else {
            Err(CsgError::InvalidCategory(category as u8))
        }
    }

    /// Per-ancestor rows from `origin` up to the root.
    ///
    /// The first hop is the origin's own row. Resolving the chain from the
    /// provider's category for `origin` gives the same result as
    /// [`TreeRouting::categorize`], and the provider is consulted for the
    /// same brushes along the fragment's own path. Entries no input of this
    /// fragment reaches are `Invalid` when the provider cannot decide them.
    /// Unknown origins yield an empty chain.
    pub fn route_chain<P: CategoryProvider + ?Sized>(
        &self,
        origin: NodeHandle,
        provider: &P,
    ) -> CsgResult<Vec<RouteHop>> {
        let Some(origin_index) = self.origin_index(origin) else {
            log::debug!("origin {} is not a brush of tree {}", origin, self.tree());
            return Ok(Vec::new());
        };
        let table = self.table_for(origin);
        let nodes = self.snapshot.nodes();

        let mut path = self.snapshot.ancestors(origin_index);
        path.reverse();
        path.push(origin_index);

        // Set once an ancestor's row is uniform: categorize never looks below it
        let mut decided = false;
        let mut hops = Vec::with_capacity(path.len());
        for pair in path.windows(2) {
            let (ancestor, below) = (pair[0], pair[1]);
            let mut children = self.snapshot.children(ancestor);

            let mut acc = Category::Outside;
            for child in children.by_ref() {
                if child == below {
                    break;
                }
                acc = if decided {
                    self.route_node_or_invalid(table, child, acc, provider)
                } else {
                    self.route_node(table, child, acc, provider)?
                };
            }

            let mut row = if acc.is_valid() {
                table.route(self.slots[below] as usize, acc)
            } else {
                RoutingRow::uniform(Category::Invalid)
            };
            // Entry categorize follows through the later siblings
            let taken = if decided {
                None
            } else if row.is_uniform() {
                Some(Category::Inside)
            } else {
                Some(self.subtree_category(table, below, provider)?)
            };
            decided |= row.is_uniform();

            for sibling in children {
                row = self.route_row(table, sibling, row, taken, provider)?;
            }
            hops.push(RouteHop {
                node: nodes[ancestor].handle,
                row,
            });
        }

        let own = if nodes[origin_index].mesh.is_some() {
            RoutingRow::IDENTITY
        } else {
            RoutingRow::uniform(Category::Outside)
        };
        hops.push(RouteHop { node: origin, row: own });
        hops.reverse();
        Ok(hops)
    }

    fn route_node_or_invalid<P: CategoryProvider + ?Sized>(
        &self,
        table: &RoutingTable,
        index: usize,
        left: Category,
        provider: &P,
    ) -> Category {
        if !left.is_valid() {
            return Category::Invalid;
        }
        self.route_node(table, index, left, provider)
            .unwrap_or(Category::Invalid)
    }

    /// Route every entry of `acc` through the node at `index`.
    ///
    /// The subtree is only categorized when some entry's row is not uniform.
    /// If that fails, the entries needing it become `Invalid`; the error is
    /// returned only when the `taken` entry needs it.
    fn route_row<P: CategoryProvider + ?Sized>(
        &self,
        table: &RoutingTable,
        index: usize,
        acc: RoutingRow,
        taken: Option<Category>,
        provider: &P,
    ) -> CsgResult<RoutingRow> {
        let slot = self.slots[index] as usize;
        let rows = Category::ALL.map(|input| {
            let left = acc.get(input);
            left.is_valid().then(|| table.route(slot, left))
        });
        let undecided = |row: &Option<RoutingRow>| matches!(row, Some(row) if !row.is_uniform());

        let inner = if rows.iter().any(undecided) {
            match self.subtree_category(table, index, provider) {
                Ok(category) => category,
                Err(err) if taken.is_some_and(|c| undecided(&rows[c.index()])) => return Err(err),
                Err(_) => Category::Invalid,
            }
        } else {
            Category::Inside
        };

        Ok(RoutingRow::from_array(rows.map(|row| match row {
            Some(row) if row.is_uniform() => row.get(Category::Inside),
            Some(row) => row.get(inner),
            None => Category::Invalid,
        })))
    }
}

impl fmt::Debug for TreeRouting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeRouting")
            .field("tree", &self.tree())
            .field("nodes", &self.snapshot.len())
            .field("rows", &self.shared.row_count())
            .field("dedicated", &self.dedicated.len())
            .field("selector", &self.selector.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csg::{BrushMeshId, CsgHierarchy};
    use crate::eval::{FragmentCategories, TreeEvaluator};
    use crate::routing::OperationKind;
    use nalgebra::Matrix4;
    use Category::*;

    fn brush(h: &mut CsgHierarchy, op: OperationKind, mesh: u32) -> NodeHandle {
        h.create_brush(op, Some(BrushMeshId(mesh)), Matrix4::identity())
    }

    #[test]
    fn test_categorize_subtractive_pair() {
        let mut h = CsgHierarchy::new();
        let tree = h.create_tree();
        let a = brush(&mut h, OperationKind::Additive, 1);
        let b = brush(&mut h, OperationKind::Subtractive, 2);
        h.set_children(tree, vec![a, b]).unwrap();
        let routing = TreeEvaluator::new().evaluate(&h, tree).unwrap();

        // Surface of `a` inside `b` is carved away
        let carved = FragmentCategories::new(a).with(b, Inside);
        assert_eq!(routing.categorize(a, &carved).unwrap(), Outside);

        // Surface of `b` inside `a` becomes the cavity wall, flipped
        let wall = FragmentCategories::new(b).with(a, Inside);
        assert_eq!(routing.categorize(b, &wall).unwrap(), ReverseAligned);

        let kept = FragmentCategories::new(a);
        assert_eq!(routing.categorize(a, &kept).unwrap(), Aligned);
    }

    #[test]
    fn test_short_circuit_skips_provider() {
        let mut h = CsgHierarchy::new();
        let tree = h.create_tree();
        let a = brush(&mut h, OperationKind::Additive, 1);
        let b = brush(&mut h, OperationKind::Intersecting, 2);
        h.set_children(tree, vec![a, b]).unwrap();
        let routing = TreeEvaluator::new().evaluate(&h, tree).unwrap();

        // Outside `a` an intersection is decided without asking about `b`
        let provider = |brush: NodeHandle| {
            if brush == a {
                Outside
            } else {
                Invalid
            }
        };
        assert_eq!(routing.categorize(a, &provider).unwrap(), Outside);

        let inside = |brush: NodeHandle| if brush == a { Inside } else { Invalid };
        assert_eq!(
            routing.categorize(a, &inside).unwrap_err(),
            CsgError::InvalidCategory(255)
        );
    }

    #[test]
    fn test_chain_matches_categorize() {
        let mut h = CsgHierarchy::new();
        let tree = h.create_tree();
        let a = brush(&mut h, OperationKind::Additive, 1);
        let branch = h.create_branch(OperationKind::Subtractive);
        let b = brush(&mut h, OperationKind::Additive, 2);
        let c = brush(&mut h, OperationKind::Intersecting, 3);
        h.set_children(tree, vec![a, branch]).unwrap();
        h.set_children(branch, vec![b, c]).unwrap();
        let routing = TreeEvaluator::new().evaluate(&h, tree).unwrap();

        for own in Category::ALL {
            for other in Category::ALL {
                let provider = |brush: NodeHandle| if brush == c { own } else { other };
                let hops = routing.route_chain(c, &provider).unwrap();
                assert_eq!(hops.len(), 3);
                assert_eq!(hops[0].node, c);
                assert_eq!(hops[2].node, tree);
                assert_eq!(
                    RouteHop::resolve(&hops, own),
                    routing.categorize(c, &provider).unwrap()
                );
            }
        }
        assert_eq!(routing.chain_lookups(c).len(), 3);
    }

    #[test]
    fn test_chain_skips_decided_siblings() {
        let mut h = CsgHierarchy::new();
        let tree = h.create_tree();
        let a = brush(&mut h, OperationKind::Additive, 1);
        let b = brush(&mut h, OperationKind::Intersecting, 2);
        h.set_children(tree, vec![a, b]).unwrap();
        let routing = TreeEvaluator::new().evaluate(&h, tree).unwrap();

        // `b` cannot be categorized, but outside `a` its row is uniform
        let provider = |brush: NodeHandle| if brush == a { Outside } else { Invalid };
        let hops = routing.route_chain(a, &provider).unwrap();
        assert_eq!(hops[1].row, RoutingRow::new(Invalid, Invalid, Invalid, Outside));
        assert_eq!(RouteHop::resolve(&hops, Outside), Outside);
        assert_eq!(routing.categorize(a, &provider).unwrap(), Outside);

        // Inside `a` both need `b`
        let inside = |brush: NodeHandle| if brush == a { Inside } else { Invalid };
        assert_eq!(
            routing.route_chain(a, &inside).unwrap_err(),
            CsgError::InvalidCategory(255)
        );
        assert!(routing.categorize(a, &inside).is_err());
    }

    #[test]
    fn test_chain_below_decided_ancestor() {
        let mut h = CsgHierarchy::new();
        let tree = h.create_tree();
        let x = brush(&mut h, OperationKind::Additive, 1);
        let branch = h.create_branch(OperationKind::Intersecting);
        let origin = brush(&mut h, OperationKind::Additive, 2);
        let y = brush(&mut h, OperationKind::Additive, 3);
        h.set_children(tree, vec![x, branch]).unwrap();
        h.set_children(branch, vec![origin, y]).unwrap();
        let routing = TreeEvaluator::new().evaluate(&h, tree).unwrap();

        // Outside `x` the intersecting branch is never entered
        let provider = |brush: NodeHandle| if brush == x { Outside } else { Invalid };
        assert_eq!(routing.categorize(origin, &provider).unwrap(), Outside);

        let hops = routing.route_chain(origin, &provider).unwrap();
        assert_eq!(hops.len(), 3);
        assert_eq!(hops[2].row, RoutingRow::uniform(Outside));
        assert_eq!(RouteHop::resolve(&hops, provider(origin)), Outside);
    }

    #[test]
    fn test_unknown_origin_is_outside() {
        let mut h = CsgHierarchy::new();
        let tree = h.create_tree();
        let a = brush(&mut h, OperationKind::Additive, 1);
        h.add_child(tree, a).unwrap();
        let routing = TreeEvaluator::new().evaluate(&h, tree).unwrap();

        let stranger = NodeHandle::new(42, 1);
        let provider = FragmentCategories::new(stranger);
        assert_eq!(routing.categorize(stranger, &provider).unwrap(), Outside);
        assert_eq!(routing.categorize(tree, &provider).unwrap(), Outside);
        assert!(routing.route_chain(stranger, &provider).unwrap().is_empty());
    }

    #[test]
    fn test_overlap_keeps_last_duplicate() {
        let mut h = CsgHierarchy::new();
        let tree = h.create_tree();
        let first = brush(&mut h, OperationKind::Additive, 5);
        let dup = brush(&mut h, OperationKind::Additive, 5);
        h.set_children(tree, vec![first, dup]).unwrap();
        let routing = TreeEvaluator::new().evaluate(&h, tree).unwrap();

        let coincident = |_: NodeHandle| Aligned;
        assert_eq!(routing.categorize(first, &coincident).unwrap(), Inside);
        assert_eq!(routing.categorize(dup, &coincident).unwrap(), Aligned);
    }
}
