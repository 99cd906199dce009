//! The TTT learner (C5): drives the discrimination tree and the hypothesis
//! automaton in response to counterexamples, finalizing temporary
//! discriminators via block splitting as it goes.

use std::collections::VecDeque;

use automata_core::{Alphabet, Symbol, Word};
use tracing::{debug, trace};

use crate::acex::{Acex, AcexAnalyzer};
use crate::cancel::CancellationToken;
use crate::dfa::Dfa;
use crate::dtree::DiscriminationTree;
use crate::error::LearnerError;
use crate::hypothesis::{Hypothesis, TransitionKind};
use crate::ids::{NodeId, StateId, TransitionId};
use crate::oracle::{EquivalenceOracle, Oracle};

/// Configuration knobs for [`Ttt`] (§6).
#[derive(Debug, Clone, Copy)]
pub struct TttConfig {
    /// Strategy used to locate the breakpoint in an abstract counterexample.
    pub acex_analyzer: AcexAnalyzer,
    /// Whether `finalize_any` scans every block for the globally shortest
    /// splitter (`true`) or finalizes the first block with any valid
    /// splitter (`false`).
    pub optimize_global_splitter: bool,
}

impl Default for TttConfig {
    fn default() -> Self {
        Self {
            acex_analyzer: AcexAnalyzer::default(),
            optimize_global_splitter: true,
        }
    }
}

/// A candidate new discriminator for a block: `symbol(sym_index) .
/// succ_sep.discriminator` (or just `symbol(sym_index)` if `succ_sep` is
/// `None`).
struct Splitter<S: Symbol> {
    sym_index: usize,
    discriminator: Word<S>,
}

/// The TTT learner. Owns the discrimination tree and the hypothesis
/// automaton it refines in lockstep; `D = bool` throughout since this crate
/// instantiates the generic output-domain design (§9) for DFA learning.
pub struct Ttt<S: Symbol> {
    alphabet: Alphabet<S>,
    dt: DiscriminationTree<S, bool>,
    hyp: Hypothesis<S>,
    open_transitions: VecDeque<TransitionId>,
    config: TttConfig,
    cancel: CancellationToken,
    started: bool,
}

impl<S: Symbol> Ttt<S> {
    pub fn new(alphabet: Alphabet<S>, config: TttConfig) -> Self {
        let hyp = Hypothesis::new(alphabet.clone());
        Self {
            alphabet,
            dt: DiscriminationTree::new(),
            hyp,
            open_transitions: VecDeque::new(),
            config,
            cancel: CancellationToken::new(),
            started: false,
        }
    }

    /// Builds a `Ttt` that honors `token` for cooperative cancellation.
    pub fn with_cancellation(alphabet: Alphabet<S>, config: TttConfig, token: CancellationToken) -> Self {
        let mut ttt = Self::new(alphabet, config);
        ttt.cancel = token;
        ttt
    }

    pub fn alphabet(&self) -> &Alphabet<S> {
        &self.alphabet
    }

    /// Creates the initial state, links it to the (still unsplit) DT root,
    /// and drains the resulting open transitions.
    pub fn start<Ora: Oracle<S, Output = bool>>(&mut self, oracle: &mut Ora) -> Result<(), LearnerError> {
        if self.started {
            return Err(LearnerError::IllegalState("start called twice"));
        }
        let root = self.dt.root();
        let leaf = self.dt.sift(root, &Word::empty(), |w| oracle.output(w), true);
        let q0 = self.hyp.create_initial_state(leaf);
        self.dt.link(leaf, q0);
        let ts = self.hyp.initialize_state(q0, self.dt.root());
        for t in ts {
            self.dt.add_incoming(self.dt.root(), t);
            self.open_transitions.push_back(t);
        }
        self.close_transitions(oracle)?;
        self.started = true;
        debug!("ttt started with initial state");
        Ok(())
    }

    /// Refines the hypothesis against a counterexample until it (and the
    /// oracle) agree on the counterexample and every suffix of it.
    pub fn refine<Ora: Oracle<S, Output = bool>>(&mut self, oracle: &mut Ora, word: Word<S>, expected: bool) -> Result<(), LearnerError> {
        if !self.started {
            return Err(LearnerError::IllegalState("refine called before start"));
        }
        let initial = self.hyp.initial().expect("started implies an initial state");
        let mut inconsistency = Some((initial, word, expected));

        while let Some((src, suffix, expected)) = inconsistency {
            self.cancel.check()?;
            self.split_state(oracle, src, suffix, expected)?;
            self.close_transitions(oracle)?;
            while self.finalize_any(oracle)? {
                self.cancel.check()?;
                self.close_transitions(oracle)?;
            }
            inconsistency = self.find_output_inconsistency(oracle);
        }
        debug_assert!(self.dt.block_list().is_empty(), "refine must leave no open blocks");
        Ok(())
    }

    /// Runs the outer active-learning loop against a combined membership and
    /// equivalence oracle until no counterexample remains, returning the
    /// learned minimal DFA. Membership and equivalence queries are typically
    /// backed by the same system under test, hence the single `&mut`
    /// parameter rather than two independently-owned oracles.
    pub fn run<O>(&mut self, oracle: &mut O) -> Result<Dfa<S>, LearnerError>
    where
        O: Oracle<S, Output = bool> + EquivalenceOracle<S, Output = bool>,
    {
        self.start(oracle)?;
        loop {
            self.cancel.check()?;
            let hypothesis = self.export(oracle);
            match oracle.find_counterexample(&hypothesis) {
                None => return Ok(hypothesis),
                Some(ce) => self.refine(oracle, ce.word, ce.expected)?,
            }
        }
    }

    /// Materializes the current hypothesis as a concrete, complete [`Dfa`].
    pub fn export<Ora: Oracle<S, Output = bool>>(&self, oracle: &mut Ora) -> Dfa<S> {
        let n = self.hyp.num_states();
        let mut transitions = vec![vec![0usize; self.alphabet.size()]; n];
        let mut accepting = vec![false; n];
        for state in self.hyp.states() {
            accepting[state.index()] = oracle.output(self.hyp.access_sequence(state));
            for sym_index in 0..self.alphabet.size() {
                let t = self.hyp.transition_at(state, sym_index);
                let target = match self.hyp.transition(t).kind {
                    TransitionKind::Tree(s) => s,
                    // A converged hypothesis keeps self-loops and back-edges as
                    // non-tree transitions -- only the spanning-tree edges are
                    // ever promoted. Resolve through the linked DT leaf instead.
                    TransitionKind::NonTree(node) => self
                        .dt
                        .state_at(node)
                        .expect("export called with a non-tree transition whose leaf is still unlinked"),
                };
                transitions[state.index()][sym_index] = target.index();
            }
        }
        Dfa::new(
            self.alphabet.clone(),
            transitions,
            accepting,
            self.hyp.initial().expect("export requires start() to have run").index(),
        )
    }

    /// Drains the open-transitions worklist: soft-sifts every queued
    /// non-tree transition, then among those that resolved to a fresh,
    /// sole-incoming unlinked leaf, promotes the one with the shortest
    /// prospective access sequence into a new state. Repeats until both the
    /// queue and the set of promotable leaves are empty (P3).
    fn close_transitions<Ora: Oracle<S, Output = bool>>(&mut self, oracle: &mut Ora) -> Result<(), LearnerError> {
        loop {
            self.cancel.check()?;
            let mut candidates: Vec<(NodeId, TransitionId)> = Vec::new();
            while let Some(t_id) = self.open_transitions.pop_front() {
                let (src, sym_index, old_target) = {
                    let t = self.hyp.transition(t_id);
                    match t.kind {
                        TransitionKind::Tree(_) => continue,
                        TransitionKind::NonTree(n) => (t.src, t.sym_index, n),
                    }
                };
                let sym = self.alphabet.symbol(sym_index);
                let access = self.hyp.access_sequence(src).append(sym);
                let new_target = self.dt.sift(old_target, &access, |w| oracle.output(w), false);
                if new_target != old_target {
                    self.dt.remove_incoming(old_target, t_id);
                    self.dt.add_incoming(new_target, t_id);
                    self.hyp.retarget(t_id, new_target);
                    trace!("retargeted transition during close_transitions");
                }
                if self.dt.is_leaf(new_target)
                    && self.dt.state_at(new_target).is_none()
                    && self.dt.incoming(new_target).len() == 1
                {
                    candidates.push((new_target, t_id));
                }
            }
            if candidates.is_empty() {
                return Ok(());
            }
            candidates.sort_by_key(|(_, t)| {
                let src = self.hyp.transition(*t).src;
                self.hyp.access_sequence(src).size() + 1
            });
            let (leaf, t_id) = candidates[0];
            let new_state = self.hyp.make_tree_state(t_id, leaf);
            self.dt.link(leaf, new_state);
            debug!("promoted new hypothesis state");
            let ts = self.hyp.initialize_state(new_state, self.dt.root());
            for t in ts {
                self.dt.add_incoming(self.dt.root(), t);
                self.open_transitions.push_back(t);
            }
        }
    }

    /// Given an output inconsistency `(src, suffix, expected)`, locates the
    /// breakpoint along `suffix` via an [`Acex`] and converts the DT leaf of
    /// the successor state into a temporary, two-way split.
    fn split_state<Ora: Oracle<S, Output = bool>>(
        &mut self,
        oracle: &mut Ora,
        src: StateId,
        suffix: Word<S>,
        expected: bool,
    ) -> Result<(), LearnerError> {
        let n = suffix.size();
        if n == 0 {
            // A zero-length suffix output inconsistency means the source
            // state's own classification is wrong -- nothing to split; the
            // oracle and the tree must have disagreed at the very leaf,
            // which should not happen if invariants hold.
            return Err(LearnerError::OracleInconsistency(
                "output inconsistency with empty suffix".to_string(),
            ));
        }

        let breakpoint = {
            let dt = &mut self.dt;
            let hyp = &mut self.hyp;
            let open_transitions = &mut self.open_transitions;
            let alphabet = &self.alphabet;
            let mut acex = Acex::new(n, |i| {
                let prefix = suffix.prefix(i);
                let state = deterministic_state(dt, hyp, open_transitions, alphabet, oracle, src, &prefix);
                let word = hyp.access_sequence(state).concat(&suffix.tail(i));
                oracle.output(&word)
            });
            // seed eff(0) to the known expected value rather than re-deriving it
            debug_assert_eq!(acex.value(0), expected);
            acex.find_breakpoint(self.config.acex_analyzer)?
        };

        let dt = &mut self.dt;
        let hyp = &mut self.hyp;
        let open_transitions = &mut self.open_transitions;
        let alphabet = &self.alphabet;

        let pred = deterministic_state(dt, hyp, open_transitions, alphabet, oracle, src, &suffix.prefix(breakpoint));
        let succ = deterministic_state(dt, hyp, open_transitions, alphabet, oracle, src, &suffix.prefix(breakpoint + 1));
        let sym = suffix.symbol(breakpoint);
        let sym_index = alphabet.index_of(sym)?;
        let split_suffix = suffix.tail(breakpoint + 1);

        let old_out = oracle.output(&hyp.access_sequence(succ).concat(&split_suffix));
        let new_out = !old_out;

        let leaf = hyp.dt_leaf(succ);
        let (old_child, new_child) = dt.split(leaf, split_suffix, true, old_out, new_out);
        if let Some(state) = dt.state_at(old_child) {
            hyp.set_dt_leaf(state, old_child);
        }

        // `t` (pred's `sym`-transition) is the edge the breakpoint blames: its
        // current target only looked equivalent to `succ` because the tree
        // hadn't yet distinguished them (`eff(breakpoint) != eff(breakpoint +
        // 1)` is exactly that disagreement). It must become a tree transition
        // to a freshly born state on the `new_out` branch of the split --
        // never to `succ` itself, tree or non-tree edge alike.
        let t = hyp.transition_at(pred, sym_index);
        dt.remove_incoming(leaf, t);
        let new_state = hyp.make_tree_state(t, new_child);
        dt.link(new_child, new_state);
        let ts = hyp.initialize_state(new_state, dt.root());
        for fresh in ts {
            dt.add_incoming(dt.root(), fresh);
            open_transitions.push_back(fresh);
        }

        // Everything else that used to target the pre-split leaf needs to be
        // re-sifted against the new discriminator.
        let pending: Vec<TransitionId> = dt.incoming(leaf).to_vec();
        for p in pending {
            open_transitions.push_back(p);
        }
        debug!("split a block root from a counterexample");
        Ok(())
    }

    /// Finds a splitter within `block` per §4.3: the LCA, over every state
    /// in the block, of where each symbol's transition currently points,
    /// preferring the shortest resulting discriminator (ties broken by
    /// smallest symbol index).
    fn block_splitter<Ora: Oracle<S, Output = bool>>(&self, _oracle: &mut Ora, block: NodeId) -> Option<Splitter<S>> {
        let leaves = self.dt.leaves(block);
        let states: Vec<StateId> = leaves.iter().filter_map(|&l| self.dt.state_at(l)).collect();
        if states.len() < 2 {
            return None;
        }

        let mut best: Option<Splitter<S>> = None;
        for sym_index in 0..self.alphabet.size() {
            let mut nodes = states.iter().map(|&s| {
                let t = self.hyp.transition_at(s, sym_index);
                match self.hyp.transition(t).kind {
                    TransitionKind::Tree(target) => self.hyp.dt_leaf(target),
                    TransitionKind::NonTree(node) => node,
                }
            });
            let first = nodes.next().expect("at least one state in block");
            let lca = nodes.fold(first, |acc, n| self.dt.least_common_ancestor(acc, n));

            if self.dt.is_leaf(lca) || self.dt.is_temp(lca) {
                continue;
            }
            let discriminator = self
                .dt
                .discriminator(lca)
                .expect("non-leaf has a discriminator")
                .prepend(self.alphabet.symbol(sym_index));

            let better = best
                .as_ref()
                .map_or(true, |b| discriminator.size() < b.discriminator.size());
            if better {
                best = Some(Splitter { sym_index, discriminator });
            }
        }
        best
    }

    /// Finalizes one block's discriminator (scanning every block for the
    /// shortest splitter when `optimize_global_splitter`, otherwise stopping
    /// at the first block with any valid splitter). Returns whether a block
    /// was finalized.
    fn finalize_any<Ora: Oracle<S, Output = bool>>(&mut self, oracle: &mut Ora) -> Result<bool, LearnerError> {
        let blocks: Vec<NodeId> = self.dt.block_list().to_vec();
        let mut chosen: Option<(NodeId, Splitter<S>)> = None;
        for block in blocks {
            if let Some(splitter) = self.block_splitter(oracle, block) {
                if !self.config.optimize_global_splitter {
                    chosen = Some((block, splitter));
                    break;
                }
                let better = chosen
                    .as_ref()
                    .map_or(true, |(_, best)| splitter.discriminator.size() < best.discriminator.size());
                if better {
                    chosen = Some((block, splitter));
                }
            }
        }
        let Some((block, splitter)) = chosen else {
            return Ok(false);
        };

        let new_discriminator = splitter.discriminator.clone();
        let hyp = &self.hyp;
        let outcome = self.dt.finalize_block(block, new_discriminator.clone(), |state| {
            let word = hyp.access_sequence(state).concat(&new_discriminator);
            oracle.output(&word)
        });
        for t in outcome.requeue {
            self.open_transitions.push_back(t);
        }
        debug!(discriminator_len = splitter.discriminator.size(), "finalized a block");
        Ok(true)
    }

    /// Finds the shortest-discriminator output inconsistency anywhere in the
    /// current hypothesis, if any: a state `s` and an ancestor of its DT leaf
    /// whose discriminator the oracle classifies differently than the
    /// hypothesis predicts (the edge label on the path from that ancestor to
    /// `s`'s leaf).
    fn find_output_inconsistency<Ora: Oracle<S, Output = bool>>(&self, oracle: &mut Ora) -> Option<(StateId, Word<S>, bool)> {
        let mut best: Option<(usize, StateId, Word<S>, bool)> = None;
        for state in self.hyp.states() {
            let mut node = self.hyp.dt_leaf(state);
            while let Some(parent) = self.dt.parent(node) {
                let expected_label = *self.dt.parent_edge_label(node).expect("non-root has an edge label");
                let discriminator = self.dt.discriminator(parent).expect("parent is inner");
                let word = self.hyp.access_sequence(state).concat(discriminator);
                let actual = oracle.output(&word);
                if actual != expected_label {
                    let len = discriminator.size();
                    if best.as_ref().map_or(true, |(blen, ..)| len < *blen) {
                        best = Some((len, state, discriminator.clone(), actual));
                    }
                }
                node = parent;
            }
        }
        best.map(|(_, s, w, e)| (s, w, e))
    }
}

/// Free function (rather than a method) so callers can capture `dt`, `hyp`
/// and `open_transitions` as disjoint fields alongside a closure that also
/// needs `oracle` -- see the borrow-splitting note in `split_state`.
fn deterministic_state<S, Ora>(
    dt: &mut DiscriminationTree<S, bool>,
    hyp: &mut Hypothesis<S>,
    open_transitions: &mut VecDeque<TransitionId>,
    alphabet: &Alphabet<S>,
    oracle: &mut Ora,
    start: StateId,
    word: &Word<S>,
) -> StateId
where
    S: Symbol,
    Ora: Oracle<S, Output = bool>,
{
    let mut state = start;
    for i in 0..word.size() {
        let sym_index = alphabet.index_of(word.symbol(i)).expect("symbol in alphabet");
        let t_id = hyp.transition_at(state, sym_index);
        state = match hyp.transition(t_id).kind {
            TransitionKind::Tree(next) => next,
            TransitionKind::NonTree(node) => {
                let access = hyp.access_sequence(state).append(alphabet.symbol(sym_index));
                let leaf = dt.sift(node, &access, |w| oracle.output(w), true);
                if leaf != node {
                    dt.remove_incoming(node, t_id);
                    dt.add_incoming(leaf, t_id);
                    hyp.retarget(t_id, leaf);
                }
                match dt.state_at(leaf) {
                    Some(s) => s,
                    None => {
                        let s = hyp.make_tree_state(t_id, leaf);
                        dt.link(leaf, s);
                        let ts = hyp.initialize_state(s, dt.root());
                        for t in ts {
                            dt.add_incoming(dt.root(), t);
                            open_transitions.push_back(t);
                        }
                        s
                    }
                }
            }
        };
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::testing::RandomDfaOracle;
    use automata_core::Alphabet;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct AStar {
        max_len: usize,
    }
    impl Oracle<char> for AStar {
        type Output = bool;
        fn output(&mut self, w: &Word<char>) -> bool {
            w.as_slice().iter().all(|&c| c == 'a')
        }
    }
    impl EquivalenceOracle<char> for AStar {
        type Output = bool;
        fn find_counterexample(&mut self, hyp: &Dfa<char>) -> Option<crate::oracle::Counterexample<char, bool>> {
            let mut frontier = vec![Word::empty()];
            for _ in 0..=self.max_len {
                let mut next = Vec::new();
                for w in &frontier {
                    let expected = w.as_slice().iter().all(|&c| c == 'a');
                    if hyp.accepts(w) != expected {
                        return Some(crate::oracle::Counterexample { word: w.clone(), expected });
                    }
                    for sym in hyp.alphabet().iter() {
                        next.push(w.append(sym));
                    }
                }
                frontier = next;
            }
            None
        }
    }

    #[test]
    fn learns_a_star_in_two_states() {
        let alphabet = Alphabet::of_size(2);
        let mut ttt = Ttt::new(alphabet, TttConfig::default());
        let mut oracle = AStar { max_len: 6 };
        let dfa = ttt.run(&mut oracle).unwrap();
        assert_eq!(dfa.num_states(), 2);
        assert!(dfa.accepts(&Word::empty()));
        assert!(dfa.accepts(&Word::from("aaa")));
        assert!(!dfa.accepts(&Word::from("aab")));
    }

    #[test]
    fn converges_on_small_random_dfas() {
        let mut rng = StdRng::seed_from_u64(7);
        for num_states in 2..6 {
            let alphabet = Alphabet::of_size(2);
            let mut oracle = RandomDfaOracle::generate(alphabet, num_states, 8, &mut rng);
            let learner_alphabet = Alphabet::of_size(2);
            let mut ttt = Ttt::new(learner_alphabet, TttConfig::default());
            let learned = ttt.run(&mut oracle).unwrap();
            assert!(learned.is_equivalent_bruteforce(oracle.target(), 8));
        }
    }
}
