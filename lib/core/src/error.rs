//! Error handling foundation for glyphdesk.
//!
//! Crates keep their own error enums (`ToolError`, `RelayError`,
//! `StagingError`, ...) and wrap lower layers with rootcause's `.context()`.

use rootcause::Report;

/// Result carrying a rootcause [`Report`] whose top context is `C`.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
