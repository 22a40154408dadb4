//! Domain models

mod candidate;
mod position;
mod trade;

pub use candidate::*;
pub use position::*;
pub use trade::*;
