//! Error handling foundation for pmflow.
//!
//! Only the `Result` alias lives here. Each crate defines its own
//! domain-specific error enums and wraps them in a rootcause `Report`
//! at the layer that surfaces them to callers.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_type_works() {
        let ok: Result<i32> = Ok(42);
        assert_eq!(ok.expect("should be ok"), 42);
    }
}
