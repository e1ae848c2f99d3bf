pub mod dse;
pub mod pass;

pub use crate::dse::*;
pub use crate::pass::*;
