//! Seam between the live runner and whatever actually rests orders.

use crate::types::Quote;

/// Order placement back end driven by the live runner once per closed bar.
///
/// `apply` must not block the caller: implementations hand the quote off and
/// return. A quote with `valid == false` means "hold nothing": every resting
/// order is withdrawn and nothing new is placed.
pub trait ExecutionPort {
    /// Current signed inventory in lots.
    fn inventory(&self) -> i64;

    /// Replace whatever is resting with `quote`.
    fn apply(&self, quote: &Quote);
}

impl<P: ExecutionPort + ?Sized> ExecutionPort for &P {
    fn inventory(&self) -> i64 {
        (**self).inventory()
    }

    fn apply(&self, quote: &Quote) {
        (**self).apply(quote)
    }
}
