//! Opcode bytes (spec.md §4.6), shared between the compiler (which emits
//! them) and the VM/disassembler (which decode them).

pub const CONSTANT: u8 = 0;
pub const NIL: u8 = 1;
pub const TRUE: u8 = 2;
pub const FALSE: u8 = 3;
pub const POP: u8 = 4;

pub const GET_LOCAL: u8 = 5;
pub const SET_LOCAL: u8 = 6;
pub const GET_GLOBAL: u8 = 7;
pub const DEFINE_GLOBAL: u8 = 8;
pub const SET_GLOBAL: u8 = 9;
pub const GET_UPVALUE: u8 = 10;
pub const SET_UPVALUE: u8 = 11;
pub const GET_PROPERTY: u8 = 12;
pub const SET_PROPERTY: u8 = 13;
pub const GET_SUPER: u8 = 14;

pub const EQUAL: u8 = 15;
pub const GREATER: u8 = 16;
pub const LESS: u8 = 17;
pub const ADD: u8 = 18;
pub const SUBTRACT: u8 = 19;
pub const MULTIPLY: u8 = 20;
pub const DIVIDE: u8 = 21;
pub const MODULO: u8 = 22;
pub const NOT: u8 = 23;
pub const NEGATE: u8 = 24;

pub const PRINT: u8 = 25;
pub const JUMP: u8 = 26;
pub const JUMP_IF_FALSE: u8 = 27;
pub const LOOP: u8 = 28;
pub const CALL: u8 = 29;
pub const INVOKE: u8 = 30;
pub const SUPER_INVOKE: u8 = 31;
pub const CLOSURE: u8 = 32;
pub const CLOSE_UPVALUE: u8 = 33;
pub const RETURN: u8 = 34;

pub const CLASS: u8 = 35;
pub const INHERIT: u8 = 36;
pub const METHOD: u8 = 37;

/// Names every opcode above, for the disassembler.
#[must_use]
pub fn name(byte: u8) -> &'static str {
    match byte {
        CONSTANT => "CONSTANT",
        NIL => "NIL",
        TRUE => "TRUE",
        FALSE => "FALSE",
        POP => "POP",
        GET_LOCAL => "GET_LOCAL",
        SET_LOCAL => "SET_LOCAL",
        GET_GLOBAL => "GET_GLOBAL",
        DEFINE_GLOBAL => "DEFINE_GLOBAL",
        SET_GLOBAL => "SET_GLOBAL",
        GET_UPVALUE => "GET_UPVALUE",
        SET_UPVALUE => "SET_UPVALUE",
        GET_PROPERTY => "GET_PROPERTY",
        SET_PROPERTY => "SET_PROPERTY",
        GET_SUPER => "GET_SUPER",
        EQUAL => "EQUAL",
        GREATER => "GREATER",
        LESS => "LESS",
        ADD => "ADD",
        SUBTRACT => "SUBTRACT",
        MULTIPLY => "MULTIPLY",
        DIVIDE => "DIVIDE",
        MODULO => "MODULO",
        NOT => "NOT",
        NEGATE => "NEGATE",
        PRINT => "PRINT",
        JUMP => "JUMP",
        JUMP_IF_FALSE => "JUMP_IF_FALSE",
        LOOP => "LOOP",
        CALL => "CALL",
        INVOKE => "INVOKE",
        SUPER_INVOKE => "SUPER_INVOKE",
        CLOSURE => "CLOSURE",
        CLOSE_UPVALUE => "CLOSE_UPVALUE",
        RETURN => "RETURN",
        CLASS => "CLASS",
        INHERIT => "INHERIT",
        METHOD => "METHOD",
        _ => "UNKNOWN",
    }
}
