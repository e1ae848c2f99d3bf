pub mod build;
pub mod dataflow;
pub mod dot;
pub mod error;
pub mod ir;
pub mod liveness;
pub mod parse;
pub mod print;
pub mod verify;

pub use crate::build::*;
pub use crate::dataflow::*;
pub use crate::dot::*;
pub use crate::error::*;
pub use crate::ir::*;
pub use crate::liveness::*;
pub use crate::parse::*;
pub use crate::print::*;
pub use crate::verify::*;
