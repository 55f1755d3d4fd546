pub mod dates;
pub mod error;
pub mod types;

#[cfg(feature = "amortization")]
pub mod amortization;

#[cfg(feature = "amortization")]
pub mod validation;

#[cfg(feature = "risk")]
pub mod risk;

#[cfg(feature = "risk")]
pub mod ledger;

pub use error::LoanbookError;
pub use types::*;

/// Standard result type for all loanbook boundary operations
pub type LoanbookResult<T> = Result<T, LoanbookError>;
