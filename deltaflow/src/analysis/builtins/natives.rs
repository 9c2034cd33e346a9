use crate::register_native;

register_native!(Object, "create", Top);
register_native!(Object, "defineProperties", Top);
register_native!(Object, "defineProperty", Top);
register_native!(Object, "freeze", Top);
register_native!(Object, "getOwnPropertyDescriptor", Top);
register_native!(Object, "getOwnPropertyNames", Top);
register_native!(Object, "getPrototypeOf", Top);
register_native!(Object, "isExtensible", Top);
register_native!(Object, "isFrozen", Top);
register_native!(Object, "isSealed", Top);
register_native!(Object, "keys", Top);
register_native!(Object, "preventExtensions", Top);
register_native!(Object, "seal", Top);

register_native!(ObjectProto, "valueOf", Primitive);
register_native!(ObjectProto, "toString", StrTop);
register_native!(ObjectProto, "toLocaleString", StrTop);
register_native!(ObjectProto, "isPrototypeOf", BoolTop);
register_native!(ObjectProto, "propertyIsEnumerable", BoolTop);
register_native!(ObjectProto, "hasOwnProperty", BoolTop);

register_native!(FunctionProto, "toString", StrTop);
register_native!(FunctionProto, "apply", Top);
register_native!(FunctionProto, "call", Top);
