//! Domain model for pins.
//!
//! A pin binds a named query to one target and carries the scheduling,
//! reservation, and result state the worker maintains for it.

mod error;
mod ids;
mod pin;
mod results;

pub use error::PinDomainError;
pub use ids::{PinId, PinName, PinQuery};
pub use pin::{ClaimCutoffs, PersistedPinData, Pin, window_start};
pub use results::{PinResults, messages};
