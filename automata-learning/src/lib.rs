//! Active and passive learning of deterministic finite automata.
//!
//! Two learners share the crate: [`ttt::Ttt`], the TTT algorithm, refines a
//! hypothesis from an oracle's answers to membership and equivalence
//! queries; [`rpni::Rpni`] (Blue-Fringe RPNI) instead folds a fixed sample of
//! labelled words into a minimal consistent automaton. Both export a
//! [`dfa::Dfa`].

pub mod acex;
pub mod cancel;
pub mod dfa;
pub mod dtree;
pub mod error;
pub mod hypothesis;
pub mod ids;
pub mod oracle;
pub mod pta;
pub mod rpni;
pub mod ttt;

pub use cancel::CancellationToken;
pub use dfa::Dfa;
pub use error::LearnerError;
pub use oracle::{Counterexample, EquivalenceOracle, Oracle};
pub use rpni::{Rpni, RpniConfig};
pub use ttt::{Ttt, TttConfig};
