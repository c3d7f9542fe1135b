mod calc;
mod error;
mod hook;
mod types;

pub use calc::*;
pub use error::*;
pub use hook::*;
pub use types::*;
