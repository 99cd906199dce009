/// Errors arising from [`crate::Alphabet`] and [`crate::Word`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WordError {
    /// A symbol was looked up that does not belong to the alphabet it was
    /// checked against.
    #[error("symbol is not a member of the alphabet")]
    UnknownSymbol,
}
