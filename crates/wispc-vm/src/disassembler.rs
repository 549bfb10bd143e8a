//! Debug-only chunk disassembler (spec.md §1 names it as an external
//! collaborator; SPEC_FULL §16 wires it behind the CLI's `--disassemble`
//! flag).

use wispc_core::{op, Chunk, Heap, Value};

/// Writes a full disassembly of `chunk` to `out`, one instruction per line.
pub fn disassemble_chunk(chunk: &Chunk, heap: &Heap, name: &str, out: &mut impl std::fmt::Write) {
    let _ = writeln!(out, "== {name} ==");
    let mut offset = 0;
    while offset < chunk.code.len() {
        offset = disassemble_instruction(chunk, heap, offset, out);
    }
}

fn disassemble_instruction(chunk: &Chunk, heap: &Heap, offset: usize, out: &mut impl std::fmt::Write) -> usize {
    let _ = write!(out, "{offset:04} ");
    let line = chunk.line_at(offset);
    if offset > 0 && line == chunk.line_at(offset - 1) {
        let _ = write!(out, "   | ");
    } else {
        let _ = write!(out, "{line:4} ");
    }

    let byte = chunk.code[offset];
    match byte {
        op::CONSTANT | op::GET_GLOBAL | op::DEFINE_GLOBAL | op::SET_GLOBAL | op::CLASS | op::GET_PROPERTY
        | op::SET_PROPERTY | op::METHOD | op::GET_SUPER => constant_instruction(chunk, heap, byte, offset, out),
        op::NIL | op::TRUE | op::FALSE | op::POP | op::EQUAL | op::GREATER | op::LESS | op::ADD | op::SUBTRACT
        | op::MULTIPLY | op::DIVIDE | op::MODULO | op::NOT | op::NEGATE | op::PRINT | op::CLOSE_UPVALUE
        | op::RETURN | op::INHERIT => simple_instruction(byte, offset, out),
        op::GET_LOCAL | op::SET_LOCAL | op::GET_UPVALUE | op::SET_UPVALUE | op::CALL => {
            byte_instruction(chunk, byte, offset, out)
        }
        op::JUMP | op::JUMP_IF_FALSE => jump_instruction(chunk, byte, 1, offset, out),
        op::LOOP => jump_instruction(chunk, byte, -1, offset, out),
        op::INVOKE | op::SUPER_INVOKE => invoke_instruction(chunk, heap, byte, offset, out),
        op::CLOSURE => closure_instruction(chunk, heap, offset, out),
        other => {
            let _ = writeln!(out, "Unknown opcode {other}");
            offset + 1
        }
    }
}

fn simple_instruction(byte: u8, offset: usize, out: &mut impl std::fmt::Write) -> usize {
    let _ = writeln!(out, "{}", op::name(byte));
    offset + 1
}

fn byte_instruction(chunk: &Chunk, byte: u8, offset: usize, out: &mut impl std::fmt::Write) -> usize {
    let slot = chunk.code[offset + 1];
    let _ = writeln!(out, "{:<16} {:4}", op::name(byte), slot);
    offset + 2
}

fn jump_instruction(chunk: &Chunk, byte: u8, sign: i32, offset: usize, out: &mut impl std::fmt::Write) -> usize {
    let jump = (u16::from(chunk.code[offset + 1]) << 8 | u16::from(chunk.code[offset + 2])) as i32;
    let target = offset as i32 + 3 + sign * jump;
    let _ = writeln!(out, "{:<16} {offset:4} -> {target}", op::name(byte));
    offset + 3
}

fn constant_instruction(chunk: &Chunk, heap: &Heap, byte: u8, offset: usize, out: &mut impl std::fmt::Write) -> usize {
    let index = chunk.code[offset + 1] as usize;
    let value = chunk.constants[index];
    let _ = writeln!(out, "{:<16} {index:4} '{}'", op::name(byte), format_constant(heap, value));
    offset + 2
}

fn invoke_instruction(chunk: &Chunk, heap: &Heap, byte: u8, offset: usize, out: &mut impl std::fmt::Write) -> usize {
    let index = chunk.code[offset + 1] as usize;
    let arg_count = chunk.code[offset + 2];
    let value = chunk.constants[index];
    let _ = writeln!(
        out,
        "{:<16} ({arg_count} args) {index:4} '{}'",
        op::name(byte),
        format_constant(heap, value)
    );
    offset + 3
}

fn closure_instruction(chunk: &Chunk, heap: &Heap, offset: usize, out: &mut impl std::fmt::Write) -> usize {
    let mut offset = offset + 1;
    let index = chunk.code[offset] as usize;
    offset += 1;
    let value = chunk.constants[index];
    let _ = writeln!(out, "{:<16} {index:4} '{}'", op::name(op::CLOSURE), format_constant(heap, value));

    if let Value::Object(handle) = value {
        let upvalue_count = heap.function(handle).upvalue_count;
        for _ in 0..upvalue_count {
            let is_local = chunk.code[offset];
            let index = chunk.code[offset + 1];
            let kind = if is_local != 0 { "local" } else { "upvalue" };
            let _ = writeln!(out, "{offset:04}      |                     {kind} {index}");
            offset += 2;
        }
    }
    offset
}

fn format_constant(heap: &Heap, value: Value) -> String {
    heap.format_value(value)
}
