//! The learner-independent result type: a concrete, complete deterministic
//! finite automaton produced by either [`crate::ttt::Ttt`] or [`crate::rpni::Rpni`].

use automata_core::{Alphabet, Symbol, Word};
use tabled::{Table, Tabled};

/// A complete deterministic finite automaton over a fixed [`Alphabet`].
///
/// Every state has exactly one outgoing transition per symbol (totality is
/// an invariant of the learners that build this type, not something this
/// type enforces on construction).
#[derive(Clone)]
pub struct Dfa<S: Symbol> {
    alphabet: Alphabet<S>,
    /// `transitions[state][symbol_index] = target state`.
    transitions: Vec<Vec<usize>>,
    accepting: Vec<bool>,
    initial: usize,
}

impl<S: Symbol> Dfa<S> {
    /// Builds a DFA from a complete transition table. `transitions[q]` must
    /// have exactly `alphabet.size()` entries for every state `q`.
    pub fn new(
        alphabet: Alphabet<S>,
        transitions: Vec<Vec<usize>>,
        accepting: Vec<bool>,
        initial: usize,
    ) -> Self {
        debug_assert!(transitions.iter().all(|row| row.len() == alphabet.size()));
        debug_assert_eq!(transitions.len(), accepting.len());
        debug_assert!(initial < transitions.len());
        Self {
            alphabet,
            transitions,
            accepting,
            initial,
        }
    }

    pub fn alphabet(&self) -> &Alphabet<S> {
        &self.alphabet
    }

    pub fn initial_state(&self) -> usize {
        self.initial
    }

    pub fn num_states(&self) -> usize {
        self.transitions.len()
    }

    pub fn states(&self) -> impl Iterator<Item = usize> {
        0..self.transitions.len()
    }

    /// The state reached from `state` reading `sym`, or `None` if `sym` is
    /// not a member of this automaton's alphabet.
    pub fn transition(&self, state: usize, sym: S) -> Option<usize> {
        let idx = self.alphabet.index_of(sym).ok()?;
        Some(self.transitions[state][idx])
    }

    pub fn accepting(&self, state: usize) -> bool {
        self.accepting[state]
    }

    /// Runs `word` from the initial state and reports whether it is
    /// accepted.
    pub fn accepts(&self, word: &Word<S>) -> bool {
        let mut state = self.initial;
        for i in 0..word.size() {
            let idx = self
                .alphabet
                .index_of(word.symbol(i))
                .expect("word uses a symbol outside this automaton's alphabet");
            state = self.transitions[state][idx];
        }
        self.accepting[state]
    }

    /// Compares `self` and `other` for language equivalence by exhaustively
    /// trying every word up to length `max_len` over the shared alphabet
    /// size. This is test tooling (bounded, not a Hopcroft-Karp style
    /// equivalence check) used to check small DFAs built in property tests
    /// against each other.
    pub fn is_equivalent_bruteforce(&self, other: &Self, max_len: usize) -> bool {
        if self.alphabet.size() != other.alphabet.size() {
            return false;
        }
        let mut frontier = vec![Word::empty()];
        for _ in 0..=max_len {
            let mut next = Vec::new();
            for w in &frontier {
                if self.accepts(w) != other.accepts(w) {
                    return false;
                }
                for sym in self.alphabet.iter() {
                    next.push(w.append(sym));
                }
            }
            frontier = next;
        }
        true
    }
}

#[derive(Tabled)]
struct DfaRow {
    state: usize,
    accepting: bool,
    #[tabled(rename = "transitions")]
    row: String,
}

impl<S: Symbol> std::fmt::Display for Dfa<S> {
    /// Plain-text tabular rendering of the transition table, used in tests
    /// and available to callers that just want to eyeball a hypothesis --
    /// not a DOT/graphviz export.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows: Vec<DfaRow> = self
            .states()
            .map(|q| DfaRow {
                state: q,
                accepting: self.accepting(q),
                row: (0..self.alphabet.size())
                    .map(|i| format!("{:?}->{}", self.alphabet.symbol(i), self.transitions[q][i]))
                    .collect::<Vec<_>>()
                    .join(", "),
            })
            .collect();
        write!(f, "{}", Table::new(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn even_as(alphabet: Alphabet<char>) -> Dfa<char> {
        // accepts words with an even number of 'a's
        Dfa::new(alphabet, vec![vec![1, 0], vec![0, 1]], vec![true, false], 0)
    }

    #[test]
    fn accepts_runs_the_automaton() {
        let dfa = even_as(Alphabet::of_size(2));
        assert!(dfa.accepts(&Word::empty()));
        assert!(!dfa.accepts(&Word::from("a")));
        assert!(dfa.accepts(&Word::from("aa")));
        assert!(dfa.accepts(&Word::from("ab")));
        assert!(!dfa.accepts(&Word::from("aab")));
    }

    #[test]
    fn bruteforce_equivalence_detects_identical_and_differing_automata() {
        let alphabet = Alphabet::of_size(2);
        let a = even_as(alphabet.clone());
        let b = even_as(alphabet.clone());
        assert!(a.is_equivalent_bruteforce(&b, 6));

        let c = Dfa::new(alphabet, vec![vec![0, 0]], vec![true], 0);
        assert!(!a.is_equivalent_bruteforce(&c, 6));
    }
}
