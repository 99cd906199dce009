//! Finite alphabets and immutable words.
//!
//! This crate provides the primitives every learner in `automata-learning`
//! builds on: a fixed, indexable [`alphabet::Alphabet`] of symbols and an
//! immutable, cheaply-shareable [`word::Word`] over that alphabet. Neither
//! type knows anything about automata, discrimination trees, or learning
//! algorithms -- they are the vocabulary those things are expressed in.

pub mod alphabet;
pub mod error;
pub mod word;

pub use alphabet::{Alphabet, Symbol};
pub use error::WordError;
pub use word::Word;
