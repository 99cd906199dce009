//! External interface contracts: the membership and equivalence oracles a
//! caller provides to drive [`crate::ttt::Ttt`]. Implementations live outside
//! this crate (wiring up a real system under test, a simulator, ...); the
//! only implementation carried here is [`testing::RandomDfaOracle`], which
//! exists purely to exercise the learners in tests.

use automata_core::{Symbol, Word};

use crate::dfa::Dfa;

/// A membership oracle: given a word, answers with the target's output on
/// it. For DFA learning `Output = bool`.
pub trait Oracle<S: Symbol> {
    type Output: Clone + PartialEq;

    fn output(&mut self, word: &Word<S>) -> Self::Output;
}

/// A counterexample returned by an [`EquivalenceOracle`]: a word on which
/// the hypothesis disagrees with the target, together with the target's
/// (correct) output on it.
pub struct Counterexample<S: Symbol, O> {
    pub word: Word<S>,
    pub expected: O,
}

/// An equivalence oracle: checks a hypothesis against the learning target
/// and, if they disagree, returns a counterexample.
pub trait EquivalenceOracle<S: Symbol> {
    type Output: Clone + PartialEq;

    fn find_counterexample(&mut self, hypothesis: &Dfa<S>) -> Option<Counterexample<S, Self::Output>>;
}

#[cfg(test)]
pub mod testing {
    //! Test-only oracle backed by a randomly generated DFA, used by the
    //! convergence and invariant property tests. Not a production oracle
    //! implementation.

    use super::*;
    use automata_core::Alphabet;
    use rand::Rng;
    use rand::seq::SliceRandom;

    /// Wraps a [`Dfa`] as both a membership and a bounded-BFS equivalence
    /// oracle.
    pub struct RandomDfaOracle {
        target: Dfa<char>,
        max_counterexample_len: usize,
    }

    impl RandomDfaOracle {
        /// Generates a random, complete DFA with `num_states` states over
        /// `alphabet`, with each state accepting independently at random.
        pub fn generate(
            alphabet: Alphabet<char>,
            num_states: usize,
            max_counterexample_len: usize,
            rng: &mut impl Rng,
        ) -> Self {
            assert!(num_states > 0);
            let transitions: Vec<Vec<usize>> = (0..num_states)
                .map(|_| {
                    (0..alphabet.size())
                        .map(|_| rng.gen_range(0..num_states))
                        .collect()
                })
                .collect();
            let accepting: Vec<bool> = (0..num_states).map(|_| rng.gen_bool(0.5)).collect();
            let target = Dfa::new(alphabet, transitions, accepting, 0);
            Self {
                target,
                max_counterexample_len,
            }
        }

        pub fn target(&self) -> &Dfa<char> {
            &self.target
        }
    }

    impl Oracle<char> for RandomDfaOracle {
        type Output = bool;

        fn output(&mut self, word: &Word<char>) -> bool {
            self.target.accepts(word)
        }
    }

    impl EquivalenceOracle<char> for RandomDfaOracle {
        type Output = bool;

        fn find_counterexample(&mut self, hypothesis: &Dfa<char>) -> Option<Counterexample<char, bool>> {
            let alphabet = self.target.alphabet().clone();
            let mut frontier = vec![Word::empty()];
            let mut symbols: Vec<char> = alphabet.iter().collect();
            for _ in 0..=self.max_counterexample_len {
                // Deterministic traversal order except for a light shuffle so
                // repeated runs over isomorphic-but-differently-built
                // hypotheses don't always find the same first counterexample.
                symbols.shuffle(&mut rand::thread_rng());
                let mut next = Vec::new();
                for w in &frontier {
                    let expected = self.target.accepts(w);
                    if hypothesis.accepts(w) != expected {
                        return Some(Counterexample {
                            word: w.clone(),
                            expected,
                        });
                    }
                    for &sym in &symbols {
                        next.push(w.append(sym));
                    }
                }
                frontier = next;
            }
            None
        }
    }
}
