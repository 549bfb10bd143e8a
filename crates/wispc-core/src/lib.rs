//! Value representation, heap, interned strings, and bytecode chunks
//! (spec.md §3, §4.1, §4.2, §4.3) shared by the compiler and the VM.
//!
//! This crate owns no parsing or dispatch logic; it is the data the other
//! two operate on, kept separate so the collector's invariants (one arena,
//! one interner, handles as the only way to reach a heap object) are
//! enforced in one place.

mod chunk;
mod object;
pub mod op;
mod table;
mod value;

pub use chunk::Chunk;
pub use object::{
    CollectStats, Handle, Heap, NativeFn, ObjBoundMethod, ObjClass, ObjClosure, ObjFunction, ObjInstance, ObjKind,
    ObjNative, ObjUpvalue, UpvalueState, WispString,
};
pub use table::Table;
pub use value::Value;
