#[macro_use]
pub mod macros;
pub mod crowd;
pub mod ids;

pub use crowd::*;
pub use ids::*;
