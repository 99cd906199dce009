//! The hypothesis automaton (C4): a mutable, partially-unfolded DFA whose
//! tree transitions form a spanning arborescence giving every state a
//! shortest-known access sequence, and whose non-tree transitions point
//! into the discrimination tree rather than at a concrete state until
//! `close_transitions` resolves them.

use automata_core::{Alphabet, Symbol, Word};

use crate::ids::{NodeId, StateId, TransitionId};

/// A transition out of a hypothesis state on one alphabet symbol.
pub struct Transition {
    pub src: StateId,
    pub sym_index: usize,
    pub kind: TransitionKind,
}

/// Tree transitions contribute to the spanning arborescence and name a
/// concrete target state; non-tree transitions point at a discrimination
/// tree node until `close_transitions` resolves (and possibly promotes) it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TransitionKind {
    Tree(StateId),
    NonTree(NodeId),
}

struct HState<S: Symbol> {
    access_sequence: Word<S>,
    dt_leaf: NodeId,
    trans: Vec<TransitionId>,
    parent_transition: Option<TransitionId>,
}

/// The learner's current DFA hypothesis, still under construction.
pub struct Hypothesis<S: Symbol> {
    alphabet: Alphabet<S>,
    states: Vec<HState<S>>,
    transitions: Vec<Transition>,
    initial: Option<StateId>,
}

impl<S: Symbol> Hypothesis<S> {
    pub fn new(alphabet: Alphabet<S>) -> Self {
        Self {
            alphabet,
            states: Vec::new(),
            transitions: Vec::new(),
            initial: None,
        }
    }

    pub fn alphabet(&self) -> &Alphabet<S> {
        &self.alphabet
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn states(&self) -> impl Iterator<Item = StateId> {
        (0..self.states.len()).map(StateId::new)
    }

    pub fn initial(&self) -> Option<StateId> {
        self.initial
    }

    pub fn access_sequence(&self, state: StateId) -> &Word<S> {
        &self.states[state.index()].access_sequence
    }

    pub fn dt_leaf(&self, state: StateId) -> NodeId {
        self.states[state.index()].dt_leaf
    }

    pub fn set_dt_leaf(&mut self, state: StateId, leaf: NodeId) {
        self.states[state.index()].dt_leaf = leaf;
    }

    pub fn parent_transition(&self, state: StateId) -> Option<TransitionId> {
        self.states[state.index()].parent_transition
    }

    /// The transition out of `state` on the symbol at `sym_index`.
    pub fn transition_at(&self, state: StateId, sym_index: usize) -> TransitionId {
        self.states[state.index()].trans[sym_index]
    }

    pub fn transition(&self, id: TransitionId) -> &Transition {
        &self.transitions[id.index()]
    }

    /// Creates the initial state: empty access sequence, no parent
    /// transition, linked to `dt_leaf` (the DT's root, immediately after the
    /// first sift in `Ttt::start`).
    pub fn create_initial_state(&mut self, dt_leaf: NodeId) -> StateId {
        debug_assert!(self.initial.is_none(), "initial state already created");
        let id = StateId::new(self.states.len());
        self.states.push(HState {
            access_sequence: Word::empty(),
            dt_leaf,
            trans: Vec::new(),
            parent_transition: None,
        });
        self.initial = Some(id);
        id
    }

    /// Promotes `transition` into a tree transition to a freshly created
    /// state, with access sequence `parent.access_sequence . symbol`, linked
    /// to `dt_leaf`. Usually called on a non-tree transition being resolved
    /// for the first time (`close_transitions`, `deterministic_state`), but
    /// `split_state` also calls this on a transition that is already a tree
    /// transition, to redirect it to the state born from splitting its old
    /// target's DT leaf -- that old target can never be the right one once
    /// the split has happened.
    pub fn make_tree_state(&mut self, transition: TransitionId, dt_leaf: NodeId) -> StateId {
        let (src, sym_index) = {
            let t = &self.transitions[transition.index()];
            (t.src, t.sym_index)
        };
        let sym = self.alphabet.symbol(sym_index);
        let access_sequence = self.states[src.index()].access_sequence.append(sym);

        let new_id = StateId::new(self.states.len());
        self.states.push(HState {
            access_sequence,
            dt_leaf,
            trans: Vec::new(),
            parent_transition: Some(transition),
        });
        self.transitions[transition.index()].kind = TransitionKind::Tree(new_id);
        new_id
    }

    /// Installs `|alphabet|` fresh non-tree transitions out of `state`, all
    /// initially pointing at `dt_root`. Returns their ids so the caller can
    /// enqueue them into the DT's incoming lists and the open-transitions
    /// worklist.
    pub fn initialize_state(&mut self, state: StateId, dt_root: NodeId) -> Vec<TransitionId> {
        let n = self.alphabet.size();
        let mut ids = Vec::with_capacity(n);
        for sym_index in 0..n {
            let id = TransitionId::new(self.transitions.len());
            self.transitions.push(Transition {
                src: state,
                sym_index,
                kind: TransitionKind::NonTree(dt_root),
            });
            ids.push(id);
        }
        self.states[state.index()].trans = ids.clone();
        ids
    }

    /// Retargets a non-tree transition to a new DT node (the result of
    /// re-sifting it).
    pub fn retarget(&mut self, transition: TransitionId, node: NodeId) {
        let t = &mut self.transitions[transition.index()];
        debug_assert!(matches!(t.kind, TransitionKind::NonTree(_)));
        t.kind = TransitionKind::NonTree(node);
    }

    /// Follows tree transitions from `state` reading `word`, stopping
    /// either once `word` is exhausted or at the first non-tree transition
    /// encountered, whichever comes first. Returns the reached state (if
    /// `word` was fully consumed via tree transitions) or the transition
    /// that would need to be resolved to continue.
    pub fn run_tree(&self, mut state: StateId, word: &Word<S>) -> Result<StateId, TransitionId> {
        for i in 0..word.size() {
            let sym_index = self
                .alphabet
                .index_of(word.symbol(i))
                .expect("word uses a symbol outside this hypothesis's alphabet");
            let t_id = self.states[state.index()].trans[sym_index];
            match self.transitions[t_id.index()].kind {
                TransitionKind::Tree(next) => state = next,
                TransitionKind::NonTree(_) => return Err(t_id),
            }
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automata_core::Alphabet;

    #[test]
    fn create_initial_and_initialize_state() {
        let alphabet = Alphabet::of_size(2);
        let mut hyp = Hypothesis::new(alphabet);
        let root = NodeId::new(0);
        let q0 = hyp.create_initial_state(root);
        assert_eq!(hyp.access_sequence(q0).size(), 0);
        let ts = hyp.initialize_state(q0, root);
        assert_eq!(ts.len(), 2);
        for t in ts {
            assert!(matches!(hyp.transition(t).kind, TransitionKind::NonTree(_)));
        }
    }

    #[test]
    fn make_tree_state_extends_access_sequence() {
        let alphabet = Alphabet::of_size(2);
        let mut hyp = Hypothesis::new(alphabet);
        let root = NodeId::new(0);
        let q0 = hyp.create_initial_state(root);
        let ts = hyp.initialize_state(q0, root);
        let leaf = NodeId::new(1);
        let q1 = hyp.make_tree_state(ts[0], leaf);
        assert_eq!(hyp.access_sequence(q1), &Word::from("a"));
        assert_eq!(hyp.dt_leaf(q1), leaf);
        assert_eq!(hyp.parent_transition(q1), Some(ts[0]));
    }

    #[test]
    fn run_tree_stops_at_non_tree_transition() {
        let alphabet = Alphabet::of_size(2);
        let mut hyp = Hypothesis::new(alphabet);
        let root = NodeId::new(0);
        let q0 = hyp.create_initial_state(root);
        let ts = hyp.initialize_state(q0, root);
        assert_eq!(hyp.run_tree(q0, &Word::from("a")), Err(ts[0]));
        assert_eq!(hyp.run_tree(q0, &Word::empty()), Ok(q0));
    }
}
