use crate::analysis::builtins::{BUILTIN_DEFINER, natives};
use crate::analysis::domain::{Address, BValue, Builtin, JsClass, NumLattice};
use crate::analysis::lattice::{BoundedLattice, Change};
use crate::analysis::memory::{Closure, NativeReturn, Obj, Property, Store};

/// Properties of the global object that resolve without a declaration.
pub const GLOBAL_NAMES: &[&str] = &["Object", "Function", "undefined"];

fn pointer(to: Builtin) -> BValue {
    BValue::of_address(Address::builtin(to), Change::Unchanged)
}

/// Bind property `name` of builtin `owner` to a fresh cell holding `value`.
fn add_prop(store: &mut Store, obj: &mut Obj, owner: Builtin, name: &str, value: BValue) {
    let cell = Address::builtin_prop(owner, name);
    store.alloc_value(cell, value);
    obj.insert(Property::new(BUILTIN_DEFINER, name, Change::Unchanged, cell));
}

/// Attach every registered native of `owner` to `obj`.
fn add_natives(store: &mut Store, obj: &mut Obj, owner: Builtin) {
    for (name, returns) in natives(owner) {
        let fun = Address::builtin_native(owner, name);
        store.alloc_obj(
            fun,
            Obj::new(JsClass::Function)
                .with_prototype(pointer(Builtin::FunctionProto))
                .with_closure(Closure::native(name, *returns)),
        );
        add_prop(
            store,
            obj,
            owner,
            name,
            BValue::of_address(fun, Change::Unchanged),
        );
    }
}

fn global(store: &mut Store) -> Obj {
    let mut obj = Obj::new(JsClass::Builtin).with_prototype(pointer(Builtin::ObjectProto));
    add_prop(store, &mut obj, Builtin::Global, "Object", pointer(Builtin::Object));
    add_prop(store, &mut obj, Builtin::Global, "Function", pointer(Builtin::Function));
    add_prop(
        store,
        &mut obj,
        Builtin::Global,
        "undefined",
        BValue::undefined(Change::Unchanged),
    );
    obj
}

fn object(store: &mut Store) -> Obj {
    let mut obj = Obj::new(JsClass::Function)
        .with_prototype(pointer(Builtin::FunctionProto))
        .with_closure(Closure::native("Object", NativeReturn::Top));
    add_prop(store, &mut obj, Builtin::Object, "prototype", pointer(Builtin::ObjectProto));
    add_natives(store, &mut obj, Builtin::Object);
    obj
}

fn object_proto(store: &mut Store) -> Obj {
    let mut obj = Obj::new(JsClass::Object);
    add_natives(store, &mut obj, Builtin::ObjectProto);
    obj
}

fn function(store: &mut Store) -> Obj {
    let mut obj = Obj::new(JsClass::Function)
        .with_prototype(pointer(Builtin::FunctionProto))
        .with_closure(Closure::native("Function", NativeReturn::Top));
    add_prop(
        store,
        &mut obj,
        Builtin::Function,
        "prototype",
        pointer(Builtin::FunctionProto),
    );
    obj
}

fn function_proto(store: &mut Store) -> Obj {
    let mut obj = Obj::new(JsClass::Function).with_prototype(pointer(Builtin::ObjectProto));
    add_natives(store, &mut obj, Builtin::FunctionProto);
    obj
}

fn arguments(store: &mut Store) -> Obj {
    let mut obj = Obj::new(JsClass::Arguments).with_prototype(pointer(Builtin::ObjectProto));
    add_prop(
        store,
        &mut obj,
        Builtin::Arguments,
        "prototype",
        pointer(Builtin::ObjectProto),
    );
    add_prop(
        store,
        &mut obj,
        Builtin::Arguments,
        "length",
        BValue::of_num(NumLattice::top(), Change::Unchanged),
    );
    obj
}

/// The store every script analysis starts from: the global object, `Object`, `Function`,
/// their prototypes, the `Arguments` template and the native functions hanging off them.
pub fn initial_store() -> Store {
    let mut store = Store::new();
    store.alloc_value(Address::builtin(Builtin::GlobalBinding), pointer(Builtin::Global));
    let objects = [
        (Builtin::Global, global(&mut store)),
        (Builtin::Object, object(&mut store)),
        (Builtin::ObjectProto, object_proto(&mut store)),
        (Builtin::Function, function(&mut store)),
        (Builtin::FunctionProto, function_proto(&mut store)),
        (Builtin::Arguments, arguments(&mut store)),
    ];
    for (builtin, obj) in objects {
        store.alloc_obj(Address::builtin(builtin), obj);
    }
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::lattice::BoundedLattice;

    #[test]
    fn global_binding_points_to_global_object() {
        let store = initial_store();
        let binding = store.apply(&Address::builtin(Builtin::GlobalBinding));
        assert_eq!(binding.single_address(), Some(Address::builtin(Builtin::Global)));
        let global = store.get_obj(&Address::builtin(Builtin::Global)).unwrap();
        for name in GLOBAL_NAMES {
            assert!(global.get(name).is_some(), "{name}");
        }
    }

    #[test]
    fn natives_are_callable_objects() {
        let store = initial_store();
        let object = store.get_obj(&Address::builtin(Builtin::Object)).unwrap();
        let keys = object.get("keys").unwrap();
        let target = store.apply(&keys.address).single_address().unwrap();
        let fun = store.get_obj(&target).unwrap();
        assert!(fun.is_function());
        assert_eq!(fun.closures().len(), 1);
        assert!(fun.closures().functions().next().is_none());
    }

    #[test]
    fn arguments_template_has_length() {
        let store = initial_store();
        let args = store.get_obj(&Address::builtin(Builtin::Arguments)).unwrap();
        let length = store.apply(&args.get("length").unwrap().address);
        assert!(length.number.value.is_top());
        assert_eq!(args.class(), JsClass::Arguments);
    }
}
