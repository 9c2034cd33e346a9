//! The abstract memory model: an [Environment] from names to addresses and a [Store] from
//! addresses to values and objects.

pub mod closure;
pub mod environment;
pub mod object;
pub mod store;

pub use closure::{Closure, ClosureId, Closures, FunctionClosure, NativeClosure, NativeReturn};
pub use environment::{Environment, Variable};
pub use object::{InternalProps, Obj, Property};
pub use store::Store;
