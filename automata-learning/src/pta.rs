//! The prefix-tree acceptor (C6): a tree built from a labeled sample set,
//! with red/blue state coloring and a fold-merge operation that propagates
//! determinization without mutating the tree until the caller commits it.

use std::collections::VecDeque;

use automata_core::{Alphabet, Symbol, Word};
use indexmap::IndexMap;

use crate::error::LearnerError;

/// A PTA state's color in the blue-fringe coloring scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    White,
    Blue,
    Red,
}

struct PtaState<S: Symbol> {
    parent: Option<(usize, S)>,
    children: IndexMap<S, usize>,
    accepting: Option<bool>,
    color: Color,
}

/// A tree-shaped DFA grown by inserting samples, then progressively folded
/// in place as [`Pta::apply`] commits merges found by [`Pta::try_merge`].
pub struct Pta<S: Symbol> {
    alphabet: Alphabet<S>,
    states: Vec<PtaState<S>>,
    /// `target[i]` is `i`'s representative after folding; find-with-path-
    /// compression gives the live state a merged id maps to.
    target: Vec<usize>,
}

/// A pending merge of `blue` into `red`, recording every identification and
/// re-target it implies without having mutated the PTA yet.
pub struct Merge {
    /// `(absorbed, survivor)` pairs, survivor always the lower-indexed/red
    /// side of the pair at the time of identification.
    pub identifications: Vec<(usize, usize)>,
}

impl<S: Symbol> Pta<S> {
    pub fn new(alphabet: Alphabet<S>) -> Self {
        let root = PtaState {
            parent: None,
            children: IndexMap::new(),
            accepting: None,
            color: Color::White,
        };
        Self {
            alphabet,
            states: vec![root],
            target: vec![0],
        }
    }

    pub fn root(&self) -> usize {
        0
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn alphabet(&self) -> &Alphabet<S> {
        &self.alphabet
    }

    pub fn color(&self, state: usize) -> Color {
        self.states[self.find(state)].color
    }

    pub fn accepting(&self, state: usize) -> Option<bool> {
        self.states[self.find(state)].accepting
    }

    pub fn parent(&self, state: usize) -> Option<(usize, S)> {
        self.states[self.find(state)].parent
    }

    /// The word reaching `state` from the root along parent pointers --
    /// `state`'s position in the tree, not affected by folds applied after
    /// it was created.
    pub fn access_word(&self, state: usize) -> Word<S> {
        let mut syms = Vec::new();
        let mut cur = state;
        while let Some((parent, sym)) = self.states[cur].parent {
            syms.push(sym);
            cur = parent;
        }
        syms.reverse();
        Word::from_slice(&syms)
    }

    /// The live representative of `state` after any folds applied so far.
    pub fn find(&self, mut state: usize) -> usize {
        while self.target[state] != state {
            state = self.target[state];
        }
        state
    }

    fn child(&self, state: usize, sym: S) -> Option<usize> {
        self.states[self.find(state)].children.get(&sym).copied()
    }

    /// Inserts `(word, label)`, creating child states as needed. Fails with
    /// [`LearnerError::ConflictingSample`] if a prior sample already labeled
    /// `word` differently.
    pub fn insert(&mut self, word: &Word<S>, label: bool) -> Result<(), LearnerError> {
        let mut state = self.root();
        for i in 0..word.size() {
            let sym = word.symbol(i);
            state = match self.child(state, sym) {
                Some(c) => c,
                None => {
                    let id = self.states.len();
                    self.states.push(PtaState {
                        parent: Some((state, sym)),
                        children: IndexMap::new(),
                        accepting: None,
                        color: Color::White,
                    });
                    self.target.push(id);
                    let state = self.find(state);
                    self.states[state].children.insert(sym, id);
                    id
                }
            };
        }
        let slot = &mut self.states[state].accepting;
        match slot {
            Some(existing) if *existing != label => return Err(LearnerError::ConflictingSample),
            _ => *slot = Some(label),
        }
        Ok(())
    }

    /// Colors the root red and enqueues its immediate successors as blue,
    /// returning the fresh blue states in child-insertion order.
    pub fn init(&mut self) -> Vec<usize> {
        let root = self.root();
        self.states[root].color = Color::Red;
        let children: Vec<usize> = self.states[root].children.values().copied().collect();
        for &c in &children {
            self.states[c].color = Color::Blue;
        }
        children
    }

    /// Attempts to fold `blue` into `red`, propagating through shared
    /// transitions. Returns `None` if the merge would identify two states
    /// with conflicting accepting labels (the DFA instantiation of "state
    /// properties").
    pub fn try_merge(&self, red: usize, blue: usize) -> Option<Merge> {
        let red = self.find(red);
        let blue = self.find(blue);
        if red == blue {
            return Some(Merge { identifications: Vec::new() });
        }

        // union-find scratch local to this (non-mutating) trial: maps a
        // state to its trial representative without touching `self.target`.
        let mut trial: IndexMap<usize, usize> = IndexMap::new();
        let find_trial = |trial: &IndexMap<usize, usize>, mut s: usize| -> usize {
            while let Some(&next) = trial.get(&s) {
                if next == s {
                    break;
                }
                s = next;
            }
            s
        };

        let mut worklist = VecDeque::new();
        worklist.push_back((red, blue));
        let mut identifications = Vec::new();

        while let Some((a, b)) = worklist.pop_front() {
            let ra = find_trial(&trial, a);
            let rb = find_trial(&trial, b);
            if ra == rb {
                continue;
            }
            // keep the lower id (closer to red, by construction) as survivor
            let (survivor, absorbed) = if ra <= rb { (ra, rb) } else { (rb, ra) };

            let acc_s = self.states[survivor].accepting;
            let acc_a = self.states[absorbed].accepting;
            if let (Some(x), Some(y)) = (acc_s, acc_a) {
                if x != y {
                    return None;
                }
            }

            trial.insert(absorbed, survivor);
            identifications.push((absorbed, survivor));

            for sym in self.alphabet.iter() {
                let ts = self.child(survivor, sym);
                let ta = self.child(absorbed, sym);
                if let (Some(ts), Some(ta)) = (ts, ta) {
                    worklist.push_back((ts, ta));
                }
            }
        }

        Some(Merge { identifications })
    }

    /// Commits `merge`: unions every identified pair, re-colors `red`'s
    /// newly reachable non-red successors as blue and returns them enqueued.
    pub fn apply(&mut self, red: usize, merge: Merge) -> Vec<usize> {
        let red = self.find(red);
        for (absorbed, survivor) in &merge.identifications {
            let absorbed = self.find(*absorbed);
            let survivor = self.find(*survivor);
            if absorbed == survivor {
                continue;
            }
            let absorbed_children: Vec<(S, usize)> = self.states[absorbed]
                .children
                .iter()
                .map(|(&s, &c)| (s, c))
                .collect();
            for (sym, child) in absorbed_children {
                self.states[survivor].children.entry(sym).or_insert(child);
            }
            if self.states[survivor].accepting.is_none() {
                self.states[survivor].accepting = self.states[absorbed].accepting;
            }
            self.target[absorbed] = survivor;
        }

        let children: Vec<usize> = self.states[red].children.values().map(|&c| self.find(c)).collect();
        let mut fresh = Vec::new();
        for c in children {
            if !matches!(self.states[c].color, Color::Red) {
                self.states[c].color = Color::Blue;
                fresh.push(c);
            }
        }
        fresh
    }

    /// Turns `blue` red, enqueuing each of its immediate non-red successors
    /// as blue.
    pub fn promote(&mut self, blue: usize) -> Vec<usize> {
        let blue = self.find(blue);
        self.states[blue].color = Color::Red;
        let children: Vec<usize> = self.states[blue].children.values().map(|&c| self.find(c)).collect();
        let mut fresh = Vec::new();
        for c in children {
            if !matches!(self.states[c].color, Color::Red) {
                self.states[c].color = Color::Blue;
                fresh.push(c);
            }
        }
        fresh
    }

    /// Every live (post-fold) state reachable from the root, in BFS order.
    pub fn live_states(&self) -> Vec<usize> {
        let mut seen = vec![false; self.states.len()];
        let mut order = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(self.root());
        seen[self.root()] = true;
        while let Some(s) = queue.pop_front() {
            order.push(s);
            let children: Vec<usize> = self.states[self.find(s)].children.values().map(|&c| self.find(c)).collect();
            for c in children {
                if !seen[c] {
                    seen[c] = true;
                    queue.push_back(c);
                }
            }
        }
        order
    }

    pub fn transition(&self, state: usize, sym: S) -> Option<usize> {
        self.child(state, sym).map(|c| self.find(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automata_core::Alphabet;

    #[test]
    fn insert_builds_the_prefix_tree() {
        let alphabet = Alphabet::of_size(2);
        let mut pta = Pta::new(alphabet);
        pta.insert(&Word::from(""), false).unwrap();
        pta.insert(&Word::from("a"), true).unwrap();
        pta.insert(&Word::from("aa"), true).unwrap();
        assert_eq!(pta.num_states(), 3);
        assert_eq!(pta.accepting(pta.root()), Some(false));
    }

    #[test]
    fn conflicting_labels_are_rejected() {
        let alphabet = Alphabet::of_size(2);
        let mut pta = Pta::new(alphabet);
        pta.insert(&Word::from("a"), true).unwrap();
        assert!(matches!(pta.insert(&Word::from("a"), false), Err(LearnerError::ConflictingSample)));
    }

    #[test]
    fn init_colors_root_red_and_children_blue() {
        let alphabet = Alphabet::of_size(2);
        let mut pta = Pta::new(alphabet);
        pta.insert(&Word::from("a"), true).unwrap();
        pta.insert(&Word::from("b"), false).unwrap();
        let blues = pta.init();
        assert_eq!(pta.color(pta.root()), Color::Red);
        assert_eq!(blues.len(), 2);
        for b in blues {
            assert_eq!(pta.color(b), Color::Blue);
        }
    }

    #[test]
    fn try_merge_rejects_conflicting_accepting_labels() {
        let alphabet = Alphabet::of_size(2);
        let mut pta = Pta::new(alphabet);
        pta.insert(&Word::from("a"), true).unwrap();
        pta.insert(&Word::from("b"), false).unwrap();
        pta.init();
        let a = pta.transition(pta.root(), 'a').unwrap();
        let b = pta.transition(pta.root(), 'b').unwrap();
        assert!(pta.try_merge(a, b).is_none());
    }

    #[test]
    fn try_merge_accepts_compatible_states_and_apply_folds_them() {
        let alphabet = Alphabet::of_size(2);
        let mut pta = Pta::new(alphabet);
        pta.insert(&Word::from("a"), true).unwrap();
        pta.insert(&Word::from("aa"), true).unwrap();
        pta.insert(&Word::from("aaa"), true).unwrap();
        pta.init();
        let a = pta.transition(pta.root(), 'a').unwrap();
        let aa = pta.transition(a, 'a').unwrap();
        let merge = pta.try_merge(a, aa).expect("compatible merge");
        pta.apply(a, merge);
        assert_eq!(pta.find(aa), pta.find(a));
    }
}
