pub mod progress;
pub mod solar;


pub use progress::*;
pub use solar::*;
