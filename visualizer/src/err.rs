use std::fmt;

/// Wraps an error that only implements `Display`, so it can be returned
/// from `main` (which requires `Debug`) without a bespoke error enum.
pub struct DebugFromDisplay<E>(pub E);

impl<E: fmt::Display> fmt::Debug for DebugFromDisplay<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<E: fmt::Display> From<E> for DebugFromDisplay<E> {
    fn from(e: E) -> Self {
        DebugFromDisplay(e)
    }
}
