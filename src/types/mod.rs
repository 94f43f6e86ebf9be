//! Static information needed for lowering: name resolution, types,
//! interface dispatch and generic instantiation.

pub mod environment;
pub mod resolver;
pub mod type_repr;

pub use resolver::{resolve, ResolvedProgram, Resolver};
pub use type_repr::Type;
