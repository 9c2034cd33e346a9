//! Builtin objects and the initial state of a script analysis.

mod natives;
pub mod state;
pub mod store;

use crate::analysis::domain::Builtin;
use crate::analysis::memory::NativeReturn;
use deltaflow_js::NodeId;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub use state::initial_state;
pub use store::initial_store;

/// Definer id of every builtin property.
pub const BUILTIN_DEFINER: NodeId = NodeId(-2);

/// A native function registration, discovered at link time through `inventory`.
pub struct NativeFactory(pub fn() -> (Builtin, &'static str, NativeReturn));

inventory::collect!(NativeFactory);

/// Register a native function as property `$name` of builtin object `$owner`.
#[macro_export]
macro_rules! register_native {
    ($owner:ident, $name:literal, $returns:ident) => {
        const _: () = {
            fn factory() -> (
                $crate::analysis::domain::Builtin,
                &'static str,
                $crate::analysis::memory::NativeReturn,
            ) {
                (
                    $crate::analysis::domain::Builtin::$owner,
                    $name,
                    $crate::analysis::memory::NativeReturn::$returns,
                )
            }

            inventory::submit! {
                $crate::analysis::builtins::NativeFactory(factory)
            }
        };
    };
}

type NativeTable = BTreeMap<Builtin, Vec<(&'static str, NativeReturn)>>;

static NATIVE_REGISTRY: OnceLock<NativeTable> = OnceLock::new();

fn build_native_registry() -> NativeTable {
    let mut m: NativeTable = BTreeMap::new();
    for f in inventory::iter::<NativeFactory> {
        let (owner, name, returns) = (f.0)();
        m.entry(owner).or_default().push((name, returns));
    }
    for natives in m.values_mut() {
        natives.sort_by_key(|(name, _)| *name);
    }
    m
}

/// The natives registered on `owner`, sorted by name.
pub fn natives(owner: Builtin) -> &'static [(&'static str, NativeReturn)] {
    NATIVE_REGISTRY
        .get_or_init(build_native_registry)
        .get(&owner)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_groups_by_owner() {
        let object = natives(Builtin::Object);
        assert!(object.iter().any(|(n, r)| *n == "keys" && *r == NativeReturn::Top));
        let proto = natives(Builtin::ObjectProto);
        assert!(
            proto
                .iter()
                .any(|(n, r)| *n == "hasOwnProperty" && *r == NativeReturn::BoolTop)
        );
        assert_eq!(natives(Builtin::FunctionProto).len(), 3);
        assert!(natives(Builtin::GlobalBinding).is_empty());
    }
}
