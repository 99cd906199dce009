//! Abstract counterexample analysis.
//!
//! An [`Acex`] wraps a monotone boolean-ish function `eff: [0..n] -> D` with
//! `eff(0) != eff(n)` and finds the unique breakpoint `i` with
//! `eff(i) != eff(i+1)`, memoizing every evaluation so no index is queried
//! twice. [`crate::ttt::Ttt::split_state`] builds one `eff` per refinement
//! step from repeated membership queries, so cutting evaluations down to the
//! analyzer's strategy directly cuts oracle calls.

use crate::error::LearnerError;

/// Which search strategy an [`Acex`] uses to locate the breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcexAnalyzer {
    /// Scan `i = 0, 1, ...` until a disagreement is found. `O(n)` evaluations.
    LinearFwd,
    /// Scan `i = n-1, n-2, ...` until a disagreement is found. `O(n)` evaluations.
    LinearBwd,
    /// Rivest-Schapire binary search. `O(log n)` evaluations.
    #[default]
    BinarySearch,
}

/// A monotone function `eff: [0..n] -> D`, evaluated lazily and memoized.
///
/// `D` is typically `bool` (DFA membership) but is left generic so the same
/// machinery would serve a Mealy-style output domain.
pub struct Acex<D, F> {
    n: usize,
    eff: F,
    cache: Vec<Option<D>>,
}

impl<D, F> Acex<D, F>
where
    D: Clone + PartialEq,
    F: FnMut(usize) -> D,
{
    /// Builds an analyzer over `eff` for the index range `0..=n`.
    pub fn new(n: usize, eff: F) -> Self {
        Self {
            n,
            eff,
            cache: vec![None; n + 1],
        }
    }

    /// Evaluates (or recalls the memoized value of) `eff` at `i`.
    fn eval(&mut self, i: usize) -> D {
        debug_assert!(i <= self.n, "Acex queried out of range [0..{}]", self.n);
        if let Some(v) = &self.cache[i] {
            return v.clone();
        }
        let v = (self.eff)(i);
        self.cache[i] = Some(v.clone());
        v
    }

    /// Number of distinct indices actually evaluated so far. Exposed for
    /// tests that check the call-count bounds of P4.
    pub fn evaluations(&self) -> usize {
        self.cache.iter().filter(|v| v.is_some()).count()
    }

    /// Public, memoized access to `eff(i)` for callers that already know a
    /// value (e.g. the caller-supplied `eff(0)`) and want to assert it
    /// rather than recompute it by hand.
    pub fn value(&mut self, i: usize) -> D {
        self.eval(i)
    }

    /// Finds the breakpoint `i` with `eff(i) != eff(i+1)` using `strategy`.
    ///
    /// Fails with [`LearnerError::OracleInconsistency`] if `eff(0) == eff(n)`,
    /// since then no breakpoint can exist and the oracle must be
    /// self-contradictory.
    pub fn find_breakpoint(&mut self, strategy: AcexAnalyzer) -> Result<usize, LearnerError> {
        let i = match strategy {
            AcexAnalyzer::LinearFwd => self.linear_fwd()?,
            AcexAnalyzer::LinearBwd => self.linear_bwd()?,
            AcexAnalyzer::BinarySearch => {
                let v0 = self.eval(0);
                let vn = self.eval(self.n);
                if v0 == vn {
                    return Err(LearnerError::OracleInconsistency(
                        "abstract counterexample endpoints agree; oracle answers are not monotone"
                            .to_string(),
                    ));
                }
                self.binary_search(0, self.n)
            }
        };
        debug_assert!(self.eval(i) != self.eval(i + 1));
        Ok(i)
    }

    /// Scans forward, comparing each pair of adjacent indices rather than
    /// pre-checking `eff(n)` against `eff(0)` -- running off the end without
    /// finding a disagreement is itself the non-monotonicity signal.
    fn linear_fwd(&mut self) -> Result<usize, LearnerError> {
        let mut i = 0;
        while i < self.n {
            if self.eval(i) != self.eval(i + 1) {
                return Ok(i);
            }
            i += 1;
        }
        Err(LearnerError::OracleInconsistency(
            "abstract counterexample endpoints agree; oracle answers are not monotone".to_string(),
        ))
    }

    fn linear_bwd(&mut self) -> Result<usize, LearnerError> {
        let mut i = self.n;
        loop {
            if i == 0 {
                return Err(LearnerError::OracleInconsistency(
                    "abstract counterexample endpoints agree; oracle answers are not monotone"
                        .to_string(),
                ));
            }
            i -= 1;
            if self.eval(i) != self.eval(i + 1) {
                return Ok(i);
            }
        }
    }

    /// Invariant: `eff(lo) != eff(hi)`. Recurses on whichever half still
    /// disagrees at its endpoints, halving the range each step.
    fn binary_search(&mut self, lo: usize, hi: usize) -> usize {
        if hi - lo == 1 {
            return lo;
        }
        let mid = lo + (hi - lo) / 2;
        let v_lo = self.eval(lo);
        let v_mid = self.eval(mid);
        if v_lo != v_mid {
            self.binary_search(lo, mid)
        } else {
            self.binary_search(mid, hi)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_evals<D, F>(acex: &Acex<D, F>) -> usize
    where
        D: Clone + PartialEq,
        F: FnMut(usize) -> D,
    {
        acex.evaluations()
    }

    #[test]
    fn linear_fwd_finds_breakpoint() {
        let mut calls = 0;
        let mut acex = Acex::new(10, |i| {
            calls += 1;
            i >= 5
        });
        let bp = acex.find_breakpoint(AcexAnalyzer::LinearFwd).unwrap();
        assert_eq!(bp, 4);
        assert!(calls <= 11);
        assert_eq!(count_evals(&acex), 6);
    }

    #[test]
    fn binary_search_finds_breakpoint_within_log_bound() {
        let mut acex = Acex::new(100, |i| i >= 37);
        let bp = acex.find_breakpoint(AcexAnalyzer::BinarySearch).unwrap();
        assert_eq!(bp, 36);
        assert!(acex.evaluations() <= 9);
    }

    #[test]
    fn linear_bwd_finds_breakpoint() {
        let mut acex = Acex::new(10, |i| i >= 5);
        let bp = acex.find_breakpoint(AcexAnalyzer::LinearBwd).unwrap();
        assert_eq!(bp, 4);
    }

    #[test]
    fn all_strategies_agree_on_random_like_monotone_functions() {
        for threshold in [1usize, 3, 7, 19] {
            for strategy in [
                AcexAnalyzer::LinearFwd,
                AcexAnalyzer::LinearBwd,
                AcexAnalyzer::BinarySearch,
            ] {
                let mut acex = Acex::new(20, |i| i >= threshold);
                let bp = acex.find_breakpoint(strategy).unwrap();
                assert_eq!(bp, threshold - 1, "strategy {:?} disagreed", strategy);
            }
        }
    }

    #[test]
    fn non_monotone_endpoints_are_reported_as_oracle_inconsistency() {
        let mut acex = Acex::new(5, |_| true);
        assert!(matches!(
            acex.find_breakpoint(AcexAnalyzer::LinearFwd),
            Err(LearnerError::OracleInconsistency(_))
        ));
    }

    #[test]
    fn memoization_never_evaluates_an_index_twice() {
        use std::cell::RefCell;
        let seen: RefCell<Vec<usize>> = RefCell::new(Vec::new());
        let mut acex = Acex::new(16, |i| {
            seen.borrow_mut().push(i);
            i >= 9
        });
        acex.find_breakpoint(AcexAnalyzer::BinarySearch).unwrap();
        let seen = seen.into_inner();
        let unique: std::collections::HashSet<_> = seen.iter().copied().collect();
        assert_eq!(seen.len(), unique.len(), "index evaluated more than once");
    }
}
