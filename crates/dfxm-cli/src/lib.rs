//! Shared utilities for dfxm-cli
//!
//! Argument parsing helpers reused across subcommands.

pub mod parsers;

// Re-export commonly used items at the crate root for convenience
pub use parsers::{
    parse_background, parse_connectivity, parse_kind, parse_threshold, BackgroundMethod,
};

#[cfg(test)]
mod tests {
    use crate::{parse_background, BackgroundMethod};

    #[test]
    fn test_background_method_is_reexported_at_the_root() {
        assert_eq!(parse_background("median").unwrap(), BackgroundMethod::Median);
    }
}
