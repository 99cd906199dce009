//! The discrimination tree (C3): a rooted tree of suffixes ("discriminators")
//! whose leaves correspond to hypothesis states.
//!
//! Nodes live in a flat arena (`Vec<DtNode<S, O>>`) and are referred to by
//! [`NodeId`] -- see [`crate::ids`] for why. Every mutating operation here
//! (`sift`, `split`, `finalize_block`) preserves the tree's invariants by
//! construction: a node is only ever converted from leaf to inner in place
//! (preserving the identity ancestors rely on), and finalization reuses or
//! reparents existing nodes wherever the old subtree already distinguishes
//! the states that need distinguishing, falling back to a fresh copy
//! (`project`) only where it doesn't.

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use automata_core::{Symbol, Word};
use indexmap::IndexMap;

use crate::ids::{NodeId, StateId, TransitionId};

#[derive(Clone)]
enum NodeKind<S: Symbol, O> {
    Leaf {
        state: Option<StateId>,
    },
    Inner {
        discriminator: Word<S>,
        children: IndexMap<O, NodeId>,
    },
}

struct DtNode<S: Symbol, O> {
    kind: NodeKind<S, O>,
    /// Whether this is an inner node with a temporary (not yet finalized)
    /// discriminator. Never true for a leaf (I5).
    temp: bool,
    parent: Option<NodeId>,
    parent_edge_label: Option<O>,
    /// Transitions currently sifted to this node. A plain `Vec` rather than
    /// a strictly intrusive linked list -- see DESIGN.md for why this
    /// trades the micro-allocation-avoidance of an intrusive list for
    /// simpler code atop the handle-based arena.
    incoming: Vec<TransitionId>,
}

/// Result of [`DiscriminationTree::finalize_block`]: the bookkeeping the
/// caller (the TTT learner) must apply to the hypothesis.
pub struct FinalizeOutcome {
    /// Every transition that used to point somewhere inside the finalized
    /// block and must be re-sifted (I4).
    pub requeue: Vec<TransitionId>,
    /// Freshly created direct children of the finalized block root that are
    /// themselves inner nodes with temporary discriminators -- new block
    /// roots per the "declare final" step.
    pub new_block_roots: Vec<NodeId>,
}

/// Rooted tree of discriminators over alphabet symbols `S` with observable
/// outputs `O` (`bool` for the DFA instantiation this crate exercises).
pub struct DiscriminationTree<S: Symbol, O> {
    nodes: Vec<DtNode<S, O>>,
    root: NodeId,
    block_list: Vec<NodeId>,
}

impl<S, O> DiscriminationTree<S, O>
where
    S: Symbol,
    O: Clone + Eq + Hash + Debug,
{
    /// A fresh tree: a single, unlinked leaf at the root.
    pub fn new() -> Self {
        Self {
            nodes: vec![DtNode {
                kind: NodeKind::Leaf { state: None },
                temp: false,
                parent: None,
                parent_edge_label: None,
                incoming: Vec::new(),
            }],
            root: NodeId::new(0),
            block_list: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_leaf(&self, node: NodeId) -> bool {
        matches!(self.nodes[node.index()].kind, NodeKind::Leaf { .. })
    }

    pub fn is_temp(&self, node: NodeId) -> bool {
        self.nodes[node.index()].temp
    }

    pub fn discriminator(&self, node: NodeId) -> Option<&Word<S>> {
        match &self.nodes[node.index()].kind {
            NodeKind::Inner { discriminator, .. } => Some(discriminator),
            NodeKind::Leaf { .. } => None,
        }
    }

    pub fn state_at(&self, leaf: NodeId) -> Option<StateId> {
        match &self.nodes[leaf.index()].kind {
            NodeKind::Leaf { state } => *state,
            NodeKind::Inner { .. } => None,
        }
    }

    /// Links `leaf` (which must currently be an unlinked leaf) to `state`.
    pub fn link(&mut self, leaf: NodeId, state: StateId) {
        match &mut self.nodes[leaf.index()].kind {
            NodeKind::Leaf { state: slot } => {
                debug_assert!(slot.is_none(), "leaf already linked to a state");
                *slot = Some(state);
            }
            NodeKind::Inner { .. } => panic!("cannot link a non-leaf DT node to a state"),
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].parent
    }

    /// The label of the edge from `node`'s parent to `node`, if any.
    pub fn parent_edge_label(&self, node: NodeId) -> Option<&O> {
        self.nodes[node.index()].parent_edge_label.as_ref()
    }

    /// Every leaf reachable under `node` (`node` itself if it is a leaf).
    pub fn leaves(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_leaves(node, &mut out);
        out
    }

    pub fn incoming(&self, node: NodeId) -> &[TransitionId] {
        &self.nodes[node.index()].incoming
    }

    pub fn add_incoming(&mut self, node: NodeId, t: TransitionId) {
        self.nodes[node.index()].incoming.push(t);
    }

    /// Removes `t` from `node`'s incoming list (used when a transition is
    /// re-sifted away). No-op if `t` is not present.
    pub fn remove_incoming(&mut self, node: NodeId, t: TransitionId) {
        let list = &mut self.nodes[node.index()].incoming;
        if let Some(pos) = list.iter().position(|&x| x == t) {
            list.swap_remove(pos);
        }
    }

    pub fn block_list(&self) -> &[NodeId] {
        &self.block_list
    }

    /// A node is a block root iff it is temp and either the tree root or
    /// its parent is not temp -- the maximal-temp-subtree definition (I6).
    pub fn is_block_root(&self, node: NodeId) -> bool {
        let n = &self.nodes[node.index()];
        n.temp
            && match n.parent {
                None => true,
                Some(p) => !self.nodes[p.index()].temp,
            }
    }

    fn add_block_root(&mut self, node: NodeId) {
        if !self.block_list.contains(&node) {
            self.block_list.push(node);
        }
    }

    fn remove_block_root(&mut self, node: NodeId) {
        if let Some(pos) = self.block_list.iter().position(|&n| n == node) {
            self.block_list.swap_remove(pos);
        }
    }

    pub fn depth(&self, mut node: NodeId) -> usize {
        let mut d = 0;
        while let Some(p) = self.nodes[node.index()].parent {
            node = p;
            d += 1;
        }
        d
    }

    /// Least common ancestor of `a` and `b` by walking parent pointers.
    pub fn least_common_ancestor(&self, mut a: NodeId, mut b: NodeId) -> NodeId {
        let mut da = self.depth(a);
        let mut db = self.depth(b);
        while da > db {
            a = self.nodes[a.index()].parent.expect("depth/parent mismatch");
            da -= 1;
        }
        while db > da {
            b = self.nodes[b.index()].parent.expect("depth/parent mismatch");
            db -= 1;
        }
        while a != b {
            a = self.nodes[a.index()].parent.expect("no common ancestor");
            b = self.nodes[b.index()].parent.expect("no common ancestor");
        }
        a
    }

    fn alloc(&mut self, node: DtNode<S, O>) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn child_of(&self, node: NodeId, label: &O) -> Option<NodeId> {
        match &self.nodes[node.index()].kind {
            NodeKind::Inner { children, .. } => children.get(label).copied(),
            NodeKind::Leaf { .. } => None,
        }
    }

    fn insert_child(&mut self, node: NodeId, label: O, child: NodeId) {
        match &mut self.nodes[node.index()].kind {
            NodeKind::Inner { children, .. } => {
                children.insert(label, child);
            }
            NodeKind::Leaf { .. } => panic!("cannot attach a child to a leaf"),
        }
    }

    /// Descends from `start`, driving `query` at each inner node's
    /// `access_sequence . discriminator` and following the labelled child,
    /// creating it on demand if absent.
    ///
    /// `hard` sifts keep descending until a leaf is reached; soft sifts
    /// (`hard == false`) stop as soon as the current node is itself a block
    /// root, matching the contract callers rely on when closing transitions
    /// without forcing premature state realization.
    pub fn sift<F>(&mut self, start: NodeId, access_sequence: &Word<S>, mut query: F, hard: bool) -> NodeId
    where
        F: FnMut(&Word<S>) -> O,
    {
        let mut current = start;
        loop {
            if !hard && self.is_block_root(current) {
                return current;
            }
            let discriminator = match &self.nodes[current.index()].kind {
                NodeKind::Leaf { .. } => return current,
                NodeKind::Inner { discriminator, .. } => discriminator.clone(),
            };
            let word = access_sequence.concat(&discriminator);
            let out = query(&word);
            current = match self.child_of(current, &out) {
                Some(c) => c,
                None => {
                    let id = self.alloc(DtNode {
                        kind: NodeKind::Leaf { state: None },
                        temp: false,
                        parent: Some(current),
                        parent_edge_label: Some(out.clone()),
                        incoming: Vec::new(),
                    });
                    self.insert_child(current, out, id);
                    id
                }
            };
        }
    }

    /// Converts `leaf` into an inner node with `discriminator`, splitting
    /// its (possibly linked) state into the `out_old` child and installing a
    /// fresh, unlinked leaf as the `out_new` child. `leaf`'s NodeId, and
    /// therefore everyone's references to it, stays valid (I3).
    ///
    /// Returns `(old_child, new_child)`; `old_child` carries whatever state
    /// `leaf` was linked to (if any).
    pub fn split(&mut self, leaf: NodeId, discriminator: Word<S>, temp: bool, out_old: O, out_new: O) -> (NodeId, NodeId) {
        let relocated_state = match self.nodes[leaf.index()].kind {
            NodeKind::Leaf { state } => state,
            NodeKind::Inner { .. } => panic!("split called on a non-leaf node"),
        };

        let old_child = self.alloc(DtNode {
            kind: NodeKind::Leaf { state: relocated_state },
            temp: false,
            parent: Some(leaf),
            parent_edge_label: Some(out_old.clone()),
            incoming: Vec::new(),
        });
        let new_child = self.alloc(DtNode {
            kind: NodeKind::Leaf { state: None },
            temp: false,
            parent: Some(leaf),
            parent_edge_label: Some(out_new.clone()),
            incoming: Vec::new(),
        });

        let mut children = IndexMap::new();
        children.insert(out_old, old_child);
        children.insert(out_new, new_child);
        self.nodes[leaf.index()].kind = NodeKind::Inner { discriminator, children };
        self.nodes[leaf.index()].temp = temp;

        if temp && self.is_block_root(leaf) {
            self.add_block_root(leaf);
        }
        (old_child, new_child)
    }

    fn collect_leaves(&self, node: NodeId, out: &mut Vec<NodeId>) {
        match &self.nodes[node.index()].kind {
            NodeKind::Leaf { .. } => out.push(node),
            NodeKind::Inner { children, .. } => {
                for &child in children.values() {
                    self.collect_leaves(child, out);
                }
            }
        }
    }

    fn collect_block(&self, node: NodeId, leaves: &mut Vec<(NodeId, Option<StateId>)>, incoming: &mut Vec<TransitionId>) {
        incoming.extend(self.nodes[node.index()].incoming.iter().copied());
        match &self.nodes[node.index()].kind {
            NodeKind::Leaf { state } => leaves.push((node, *state)),
            NodeKind::Inner { children, .. } => {
                for &child in children.values() {
                    self.collect_block(child, leaves, incoming);
                }
            }
        }
    }

    fn subtree_has_any(&self, node: NodeId, target: &HashSet<NodeId>) -> bool {
        let mut leaves = Vec::new();
        self.collect_leaves(node, &mut leaves);
        leaves.iter().any(|l| target.contains(l))
    }

    fn subtree_fully_in(&self, node: NodeId, target: &HashSet<NodeId>) -> bool {
        let mut leaves = Vec::new();
        self.collect_leaves(node, &mut leaves);
        !leaves.is_empty() && leaves.iter().all(|l| target.contains(l))
    }

    /// Builds the reduced copy of `node`'s subtree restricted to the old
    /// leaves in `target`: reuses `node` wholesale (just reparented) when
    /// every one of its leaves is in `target`, otherwise allocates a fresh
    /// inner node with the same discriminator and recurses into the
    /// children that still have relevant leaves (the `extract_subtree`
    /// projection used by `finalize_block`).
    fn project(&mut self, node: NodeId, target: &HashSet<NodeId>, new_parent: NodeId, edge_label: O) -> NodeId {
        if self.subtree_fully_in(node, target) {
            self.nodes[node.index()].parent = Some(new_parent);
            self.nodes[node.index()].parent_edge_label = Some(edge_label);
            return node;
        }
        let (discriminator, children) = match &self.nodes[node.index()].kind {
            NodeKind::Inner { discriminator, children } => (discriminator.clone(), children.clone()),
            NodeKind::Leaf { .. } => unreachable!("a leaf node is always fully-in or fully-out of target"),
        };
        let new_id = self.alloc(DtNode {
            kind: NodeKind::Leaf { state: None },
            temp: true,
            parent: Some(new_parent),
            parent_edge_label: Some(edge_label),
            incoming: Vec::new(),
        });
        let mut new_children = IndexMap::new();
        for (out, child) in children {
            if self.subtree_has_any(child, target) {
                let projected = self.project(child, target, new_id, out.clone());
                new_children.insert(out, projected);
            }
        }
        self.nodes[new_id.index()].kind = NodeKind::Inner { discriminator, children: new_children };
        new_id
    }

    /// Finalizes the temporary discriminator at block root `block_root` to
    /// `new_discriminator`. `classify(state)` must answer
    /// `query(state.access_sequence . new_discriminator)`; the caller (the
    /// TTT learner) owns the oracle and the states' access sequences.
    pub fn finalize_block<F>(&mut self, block_root: NodeId, new_discriminator: Word<S>, mut classify: F) -> FinalizeOutcome
    where
        F: FnMut(StateId) -> O,
    {
        debug_assert!(self.is_block_root(block_root));

        let mut leaves = Vec::new();
        let mut requeue = Vec::new();
        self.collect_block(block_root, &mut leaves, &mut requeue);

        let (old_discriminator, old_children) = match &self.nodes[block_root.index()].kind {
            NodeKind::Inner { discriminator, children } => (discriminator.clone(), children.clone()),
            NodeKind::Leaf { .. } => unreachable!("block root is always an inner node"),
        };

        if new_discriminator == old_discriminator {
            self.nodes[block_root.index()].temp = false;
            self.remove_block_root(block_root);
            let new_block_roots = self.promote_temp_children(block_root);
            return FinalizeOutcome { requeue, new_block_roots };
        }

        let mut groups: IndexMap<O, HashSet<NodeId>> = IndexMap::new();
        for (old_leaf, state) in &leaves {
            if let Some(state) = state {
                let label = classify(*state);
                groups.entry(label).or_default().insert(*old_leaf);
            }
        }

        let mut new_children = IndexMap::new();
        for (label, target) in groups {
            let relevant: Vec<(O, NodeId)> = old_children
                .iter()
                .filter(|(_, &c)| self.subtree_has_any(c, &target))
                .map(|(o, &c)| (o.clone(), c))
                .collect();
            debug_assert!(!relevant.is_empty());

            let new_child = if relevant.len() == 1 {
                self.project(relevant[0].1, &target, block_root, label.clone())
            } else {
                let gather_id = self.alloc(DtNode {
                    kind: NodeKind::Leaf { state: None },
                    temp: true,
                    parent: Some(block_root),
                    parent_edge_label: Some(label.clone()),
                    incoming: Vec::new(),
                });
                let mut gathered = IndexMap::new();
                for (out, child) in relevant {
                    let projected = self.project(child, &target, gather_id, out.clone());
                    gathered.insert(out, projected);
                }
                self.nodes[gather_id.index()].kind = NodeKind::Inner {
                    discriminator: old_discriminator.clone(),
                    children: gathered,
                };
                gather_id
            };
            new_children.insert(label, new_child);
        }

        self.nodes[block_root.index()].kind = NodeKind::Inner {
            discriminator: new_discriminator,
            children: new_children,
        };
        self.nodes[block_root.index()].temp = false;
        self.remove_block_root(block_root);

        let new_block_roots = self.promote_temp_children(block_root);
        FinalizeOutcome { requeue, new_block_roots }
    }

    /// After `block_root` becomes non-temp, any of its direct children that
    /// are themselves temp inner nodes become new block roots (I6).
    fn promote_temp_children(&mut self, block_root: NodeId) -> Vec<NodeId> {
        let children: Vec<NodeId> = match &self.nodes[block_root.index()].kind {
            NodeKind::Inner { children, .. } => children.values().copied().collect(),
            NodeKind::Leaf { .. } => Vec::new(),
        };
        let mut roots = Vec::new();
        for child in children {
            if self.nodes[child.index()].temp && matches!(self.nodes[child.index()].kind, NodeKind::Inner { .. }) {
                self.add_block_root(child);
                roots.push(child);
            }
        }
        roots
    }
}

impl<S, O> Default for DiscriminationTree<S, O>
where
    S: Symbol,
    O: Clone + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automata_core::Alphabet;

    fn target_even_as(w: &Word<char>) -> bool {
        w.as_slice().iter().filter(|&&c| c == 'a').count() % 2 == 0
    }

    #[test]
    fn sift_creates_children_on_demand_and_is_idempotent() {
        let _alphabet = Alphabet::of_size(2);
        let mut dt: DiscriminationTree<char, bool> = DiscriminationTree::new();
        let root = dt.root();
        // root is a bare leaf until split.
        let (old, new) = dt.split(root, Word::from(""), false, true, false);
        assert!(dt.is_leaf(old));
        assert!(dt.is_leaf(new));

        let first = dt.sift(root, &Word::from("a"), |w| target_even_as(w), true);
        let second = dt.sift(root, &Word::from("a"), |w| target_even_as(w), true);
        assert_eq!(first, second);
        assert!(dt.is_leaf(first));
    }

    #[test]
    fn soft_sift_stops_at_block_root() {
        let mut dt: DiscriminationTree<char, bool> = DiscriminationTree::new();
        let root = dt.root();
        let (_old, _new) = dt.split(root, Word::from("a"), true, true, false);
        assert!(dt.is_block_root(root));
        let landed = dt.sift(root, &Word::from(""), |_| panic!("soft sift must not query at a block root"), false);
        assert_eq!(landed, root);
    }

    #[test]
    fn least_common_ancestor_of_siblings_is_their_parent() {
        let mut dt: DiscriminationTree<char, bool> = DiscriminationTree::new();
        let root = dt.root();
        let (old, new) = dt.split(root, Word::from("a"), false, true, false);
        assert_eq!(dt.least_common_ancestor(old, new), root);
    }

    #[test]
    fn finalize_with_unchanged_discriminator_just_clears_temp() {
        let mut dt: DiscriminationTree<char, bool> = DiscriminationTree::new();
        let root = dt.root();
        let (_old, _new) = dt.split(root, Word::from("a"), true, true, false);
        assert!(dt.block_list().contains(&root));
        let outcome = dt.finalize_block(root, Word::from("a"), |_| true);
        assert!(!dt.is_temp(root));
        assert!(!dt.block_list().contains(&root));
        assert!(outcome.new_block_roots.is_empty());
    }
}
