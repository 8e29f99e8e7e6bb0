pub mod messages;
mod stackfour;

pub use stackfour::*;
