//! Abstract domains for JavaScript values.
//!
//! Every primitive domain is a small finite lattice paired with a [Change](crate::analysis::lattice::Change)
//! tag through [Tagged](crate::analysis::lattice::Tagged). [BValue] is their product.

pub mod address;
pub mod boolean;
pub mod definers;
pub mod number;
pub mod presence;
pub mod string;
pub mod value;

pub use address::{Address, AddressLattice, Addresses, Builtin, JsClass, MAX_ADDRESSES, Name};
pub use boolean::{Bool, BoolLattice};
pub use definers::DefinerIds;
pub use number::{Num, NumLattice};
pub use presence::{Null, Presence, Undefined};
pub use string::{Str, StrLattice};
pub use value::BValue;
