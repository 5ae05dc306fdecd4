#![forbid(unsafe_code)]

//! Arguments that may be either fixed values or reactive sources.

use std::fmt;

use crate::computed::Computed;
use crate::observable::{Observable, Track};

/// A value an adapter reads on every run: fixed, or backed by a reactive cell.
pub enum Input<T> {
    /// Never changes.
    Static(T),
    /// Follows an [`Observable`].
    Signal(Observable<T>),
    /// Follows a [`Computed`].
    Memo(Computed<T>),
}

impl<T: Clone + PartialEq + 'static> Input<T> {
    /// A fixed input.
    pub fn value(value: T) -> Self {
        Self::Static(value)
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> T {
        match self {
            Self::Static(value) => value.clone(),
            Self::Signal(cell) => cell.get(),
            Self::Memo(memo) => memo.get(),
        }
    }

    /// The reactive source to watch, if any.
    #[must_use]
    pub fn source(&self) -> Option<&dyn Track> {
        match self {
            Self::Static(_) => None,
            Self::Signal(cell) => Some(cell),
            Self::Memo(memo) => Some(memo),
        }
    }

    /// Whether reading this input can yield different values over time.
    #[must_use]
    pub fn is_reactive(&self) -> bool {
        !matches!(self, Self::Static(_))
    }
}

impl<T: Clone> Clone for Input<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Static(value) => Self::Static(value.clone()),
            Self::Signal(cell) => Self::Signal(cell.clone()),
            Self::Memo(memo) => Self::Memo(memo.clone()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Input<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Signal(cell) => f.debug_tuple("Signal").field(cell).finish(),
            Self::Memo(memo) => f.debug_tuple("Memo").field(memo).finish(),
        }
    }
}

impl<T: Default> Default for Input<T> {
    fn default() -> Self {
        Self::Static(T::default())
    }
}

impl<T> From<Observable<T>> for Input<T> {
    fn from(cell: Observable<T>) -> Self {
        Self::Signal(cell)
    }
}

impl<T> From<&Observable<T>> for Input<T> {
    fn from(cell: &Observable<T>) -> Self {
        Self::Signal(cell.clone())
    }
}

impl<T> From<Computed<T>> for Input<T> {
    fn from(memo: Computed<T>) -> Self {
        Self::Memo(memo)
    }
}

impl<T> From<&Computed<T>> for Input<T> {
    fn from(memo: &Computed<T>) -> Self {
        Self::Memo(memo.clone())
    }
}

/// Collect the reactive sources among `inputs`.
#[must_use]
pub fn sources<'a>(inputs: &[Option<&'a dyn Track>]) -> Vec<&'a dyn Track> {
    inputs.iter().flatten().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_input_has_no_source() {
        let input = Input::value(5);
        assert_eq!(input.get(), 5);
        assert!(input.source().is_none());
        assert!(!input.is_reactive());
    }

    #[test]
    fn signal_input_follows_cell() {
        let cell = Observable::new("a");
        let input: Input<&str> = (&cell).into();
        cell.set("b");
        assert_eq!(input.get(), "b");
        assert!(input.source().is_some());
    }

    #[test]
    fn memo_input_follows_computed() {
        let cell = Observable::new(2);
        let input: Input<i32> = Computed::map(&cell, |v| v * 10).into();
        cell.set(3);
        assert_eq!(input.get(), 30);
    }

    #[test]
    fn sources_skips_static_inputs() {
        let cell = Observable::new(1);
        let a: Input<i32> = (&cell).into();
        let b = Input::value(2);
        assert_eq!(sources(&[a.source(), b.source()]).len(), 1);
    }
}
