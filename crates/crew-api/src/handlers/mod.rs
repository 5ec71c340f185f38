//! API request handlers.

pub mod crew;
pub mod health;
pub mod stream;

pub use crew::*;
pub use health::*;
pub use stream::*;
