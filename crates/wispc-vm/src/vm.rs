//! The dispatch loop: frames, the value stack, globals, and open upvalues
//! (spec.md §4.4, §4.6).

use wispc_compiler::compile;
use wispc_core::{op, Handle, Heap, ObjKind, Table, UpvalueState, Value};

use crate::error::RuntimeError;
use crate::natives::clock;

const FRAMES_MAX: usize = 64;
const STACK_MAX: usize = FRAMES_MAX * 256;

struct CallFrame {
    closure: Handle,
    ip: usize,
    base: usize,
}

/// Outcome of one top-level [`Vm::interpret`] call (spec.md §6 exit codes map
/// `CompileError` to 65 and `RuntimeError` to 70).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

/// Owns everything a running script needs: the heap, the value stack, call
/// frames, the globals table, and the open-upvalues list. One `Vm` can
/// `interpret` more than once (a REPL line at a time); the heap, globals, and
/// interned strings persist across calls, only the stack and frames reset.
pub struct Vm {
    heap: Heap,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: Table,
    open_upvalues: Vec<Handle>,
    disassemble: bool,
}

impl Vm {
    #[must_use]
    pub fn new() -> Self {
        let mut vm = Self {
            heap: Heap::new(),
            stack: Vec::new(),
            frames: Vec::new(),
            globals: Table::new(),
            open_upvalues: Vec::new(),
            disassemble: false,
        };
        vm.define_native(b"clock", Some(0), clock);
        vm
    }

    pub fn set_stress_gc(&mut self, stress: bool) {
        self.heap.set_stress_gc(stress);
    }

    pub fn set_disassemble(&mut self, disassemble: bool) {
        self.disassemble = disassemble;
    }

    fn define_native(&mut self, name: &[u8], arity: Option<u8>, func: wispc_core::NativeFn) {
        let name_handle = self.heap.intern_copy(name);
        let native_handle = self.heap.alloc_native(name_handle, arity, func);
        let hash = self.heap.string(name_handle).hash;
        self.globals.set(name_handle, hash, Value::Object(native_handle));
    }

    /// Compiles and runs `source`. The stack and call frames are reset after
    /// every call, successful or not; the heap, globals, and interned
    /// strings survive (spec.md §7).
    pub fn interpret(&mut self, source: &[u8]) -> InterpretResult {
        let function = match compile(source, &mut self.heap) {
            Ok(f) => f,
            Err(_) => return InterpretResult::CompileError,
        };

        if self.disassemble {
            let mut out = String::new();
            self.disassemble_recursive(function, &mut out);
            print!("{out}");
        }

        let closure = self.heap.alloc_closure(function, Box::new([]));
        self.stack.push(Value::Object(closure));
        self.frames.push(CallFrame {
            closure,
            ip: 0,
            base: 0,
        });

        let result = self.run();
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues.clear();

        match result {
            Ok(()) => InterpretResult::Ok,
            Err(err) => {
                self.print_stack_trace(&err.to_string());
                InterpretResult::RuntimeError
            }
        }
    }

    fn disassemble_recursive(&self, function: Handle, out: &mut String) {
        let func = self.heap.function(function);
        let name = match func.name {
            Some(n) => self.string_contents(n),
            None => "script".to_string(),
        };
        crate::disassembler::disassemble_chunk(&func.chunk, &self.heap, &name, out);
        let nested: Vec<Handle> = func
            .chunk
            .constants
            .iter()
            .filter_map(|v| match v {
                Value::Object(h) if self.heap.kind(*h) == ObjKind::Function => Some(*h),
                _ => None,
            })
            .collect();
        for nested_fn in nested {
            out.push('\n');
            self.disassemble_recursive(nested_fn, out);
        }
    }

    fn print_stack_trace(&self, message: &str) {
        eprintln!("{message}");
        for frame in self.frames.iter().rev() {
            let function = self.heap.closure(frame.closure).function;
            let func = self.heap.function(function);
            let line = func.chunk.line_at(frame.ip.saturating_sub(1));
            match func.name {
                Some(name) => eprintln!("[line {line}] in {}()", self.string_contents(name)),
                None => eprintln!("[line {line}] in script"),
            }
        }
    }

    fn string_contents(&self, handle: Handle) -> String {
        String::from_utf8_lossy(&self.heap.string(handle).bytes).into_owned()
    }

    // ---- stack helpers ------------------------------------------------------

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= STACK_MAX {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("dispatch loop never pops an empty stack")
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    // ---- bytecode stream ------------------------------------------------------

    fn frame_function(&self) -> Handle {
        let closure = self.frames.last().expect("run() only called with an active frame").closure;
        self.heap.closure(closure).function
    }

    fn read_byte(&mut self) -> u8 {
        let function = self.frame_function();
        let ip = self.frames.last().unwrap().ip;
        self.frames.last_mut().unwrap().ip += 1;
        self.heap.function(function).chunk.code[ip]
    }

    fn read_short(&mut self) -> u16 {
        let hi = self.read_byte();
        let lo = self.read_byte();
        (u16::from(hi) << 8) | u16::from(lo)
    }

    fn read_constant(&mut self) -> Value {
        let index = self.read_byte() as usize;
        let function = self.frame_function();
        self.heap.function(function).chunk.constants[index]
    }

    fn read_string(&mut self) -> Handle {
        match self.read_constant() {
            Value::Object(h) => h,
            _ => unreachable!("name operands are always interned string constants"),
        }
    }

    // ---- GC ------------------------------------------------------------------

    /// Every value the dispatch loop needs to survive a collection that
    /// isn't already reachable from the heap itself: the stack, every active
    /// frame's closure, the open-upvalues list, and both the keys and values
    /// of the globals table (global names are interned strings, exactly as
    /// rooted as the values they name — see the equivalent fix on
    /// `Heap::children_values` for class method/field tables).
    fn gather_roots(&self) -> Vec<Value> {
        let mut roots = self.stack.clone();
        roots.extend(self.frames.iter().map(|f| Value::Object(f.closure)));
        roots.extend(self.open_upvalues.iter().map(|&h| Value::Object(h)));
        for (key, value) in self.globals.iter() {
            roots.push(Value::Object(key));
            roots.push(value);
        }
        roots
    }

    fn maybe_collect(&mut self) {
        let roots = self.gather_roots();
        self.heap.maybe_collect(roots);
    }

    // ---- upvalues ------------------------------------------------------------

    fn capture_upvalue(&mut self, slot: usize) -> Handle {
        let mut insert_at = self.open_upvalues.len();
        for (i, &handle) in self.open_upvalues.iter().enumerate() {
            match self.heap.upvalue(handle).state {
                UpvalueState::Open(s) if s == slot => return handle,
                UpvalueState::Open(s) if s < slot => {
                    insert_at = i;
                    break;
                }
                _ => {}
            }
        }
        let created = self.heap.alloc_upvalue(slot);
        self.open_upvalues.insert(insert_at, created);
        created
    }

    fn read_upvalue_value(&self, handle: Handle) -> Value {
        match self.heap.upvalue(handle).state {
            UpvalueState::Open(slot) => self.stack[slot],
            UpvalueState::Closed(v) => v,
        }
    }

    fn write_upvalue_value(&mut self, handle: Handle, value: Value) {
        match self.heap.upvalue(handle).state {
            UpvalueState::Open(slot) => self.stack[slot] = value,
            UpvalueState::Closed(_) => self.heap.upvalue_mut(handle).state = UpvalueState::Closed(value),
        }
    }

    /// Closes every open upvalue pointing at `from_slot` or higher, copying
    /// the stack value into the upvalue itself so it survives the slot being
    /// popped. A no-op if no open upvalue reaches that far (the resolved
    /// behavior for a bare `CLOSE_UPVALUE` with nothing to close).
    fn close_upvalues(&mut self, from_slot: usize) {
        while let Some(&handle) = self.open_upvalues.first() {
            let slot = match self.heap.upvalue(handle).state {
                UpvalueState::Open(s) => s,
                UpvalueState::Closed(_) => break,
            };
            if slot < from_slot {
                break;
            }
            let value = self.stack[slot];
            self.heap.upvalue_mut(handle).state = UpvalueState::Closed(value);
            self.open_upvalues.remove(0);
        }
    }

    // ---- calls -----------------------------------------------------------

    fn call_value(&mut self, callee: Value, arg_count: u8) -> Result<(), RuntimeError> {
        match callee {
            Value::Object(handle) => match self.heap.kind(handle) {
                ObjKind::Closure => self.call_closure(handle, arg_count),
                ObjKind::Native => self.call_native(handle, arg_count),
                ObjKind::Class => self.call_class(handle, arg_count),
                ObjKind::BoundMethod => self.call_bound_method(handle, arg_count),
                _ => Err(RuntimeError::NotCallable),
            },
            _ => Err(RuntimeError::NotCallable),
        }
    }

    fn call_closure(&mut self, closure: Handle, arg_count: u8) -> Result<(), RuntimeError> {
        let function = self.heap.closure(closure).function;
        let arity = self.heap.function(function).arity;
        if arg_count != arity {
            return Err(RuntimeError::ArityMismatch {
                expected: arity,
                got: arg_count,
            });
        }
        if self.frames.len() >= FRAMES_MAX {
            return Err(RuntimeError::StackOverflow);
        }
        let base = self.stack.len() - arg_count as usize - 1;
        self.frames.push(CallFrame { closure, ip: 0, base });
        Ok(())
    }

    fn call_native(&mut self, handle: Handle, arg_count: u8) -> Result<(), RuntimeError> {
        let native = self.heap.native(handle);
        if let Some(arity) = native.arity {
            if arity != arg_count {
                return Err(RuntimeError::ArityMismatch {
                    expected: arity,
                    got: arg_count,
                });
            }
        }
        let func = native.func;
        let start = self.stack.len() - arg_count as usize;
        let args: Vec<Value> = self.stack[start..].to_vec();
        let result = func(&args).map_err(RuntimeError::Native)?;
        self.stack.truncate(start - 1);
        self.push(result)
    }

    fn call_class(&mut self, class: Handle, arg_count: u8) -> Result<(), RuntimeError> {
        let instance = self.heap.alloc_instance(class);
        let stack_pos = self.stack.len() - arg_count as usize - 1;
        self.stack[stack_pos] = Value::Object(instance);

        let init_handle = self.heap.init_string();
        let init_hash = self.heap.string(init_handle).hash;
        let initializer = self.heap.class(class).methods.get(init_handle, init_hash);
        match initializer {
            Some(Value::Object(closure)) => self.call_closure(closure, arg_count),
            _ => {
                if arg_count != 0 {
                    return Err(RuntimeError::ArityMismatch {
                        expected: 0,
                        got: arg_count,
                    });
                }
                Ok(())
            }
        }
    }

    fn call_bound_method(&mut self, handle: Handle, arg_count: u8) -> Result<(), RuntimeError> {
        let bound = self.heap.bound_method(handle);
        let receiver = bound.receiver;
        let method = bound.method;
        let stack_pos = self.stack.len() - arg_count as usize - 1;
        self.stack[stack_pos] = receiver;
        self.call_closure(method, arg_count)
    }

    fn invoke(&mut self, name: Handle, arg_count: u8) -> Result<(), RuntimeError> {
        let receiver = self.peek(arg_count as usize);
        let instance_handle = match receiver {
            Value::Object(h) if self.heap.kind(h) == ObjKind::Instance => h,
            _ => return Err(RuntimeError::OnlyInstancesHaveProperties),
        };
        let hash = self.heap.string(name).hash;
        if let Some(value) = self.heap.instance(instance_handle).fields.get(name, hash) {
            let stack_pos = self.stack.len() - arg_count as usize - 1;
            self.stack[stack_pos] = value;
            return self.call_value(value, arg_count);
        }
        let class = self.heap.instance(instance_handle).class;
        self.invoke_from_class(class, name, arg_count)
    }

    fn invoke_from_class(&mut self, class: Handle, name: Handle, arg_count: u8) -> Result<(), RuntimeError> {
        let hash = self.heap.string(name).hash;
        let method = self.heap.class(class).methods.get(name, hash);
        match method {
            Some(Value::Object(closure)) => self.call_closure(closure, arg_count),
            _ => Err(RuntimeError::UndefinedProperty(self.string_contents(name))),
        }
    }

    fn bind_method(&mut self, class: Handle, name: Handle) -> Result<(), RuntimeError> {
        let hash = self.heap.string(name).hash;
        let method = self.heap.class(class).methods.get(name, hash);
        match method {
            Some(Value::Object(closure)) => {
                let receiver = self.peek(0);
                let bound = self.heap.alloc_bound_method(receiver, closure);
                self.pop();
                self.push(Value::Object(bound))
            }
            _ => Err(RuntimeError::UndefinedProperty(self.string_contents(name))),
        }
    }

    // ---- property ops -------------------------------------------------------

    fn op_get_property(&mut self) -> Result<(), RuntimeError> {
        let name = self.read_string();
        let receiver = self.peek(0);
        let instance_handle = match receiver {
            Value::Object(h) if self.heap.kind(h) == ObjKind::Instance => h,
            _ => return Err(RuntimeError::OnlyInstancesHaveProperties),
        };
        let hash = self.heap.string(name).hash;
        if let Some(value) = self.heap.instance(instance_handle).fields.get(name, hash) {
            self.pop();
            return self.push(value);
        }
        let class = self.heap.instance(instance_handle).class;
        self.bind_method(class, name)
    }

    fn op_set_property(&mut self) -> Result<(), RuntimeError> {
        let name = self.read_string();
        let receiver = self.peek(1);
        let instance_handle = match receiver {
            Value::Object(h) if self.heap.kind(h) == ObjKind::Instance => h,
            _ => return Err(RuntimeError::OnlyInstancesHaveProperties),
        };
        let value = self.peek(0);
        let hash = self.heap.string(name).hash;
        self.heap.instance_mut(instance_handle).fields.set(name, hash, value);
        let value = self.pop();
        self.pop();
        self.push(value)
    }

    fn op_get_super(&mut self) -> Result<(), RuntimeError> {
        let name = self.read_string();
        let superclass_value = self.pop();
        let superclass = match superclass_value {
            Value::Object(h) => h,
            _ => unreachable!("GET_SUPER's operand is always a class"),
        };
        self.bind_method(superclass, name)
    }

    fn op_inherit(&mut self) -> Result<(), RuntimeError> {
        let superclass_value = self.peek(1);
        let superclass = match superclass_value {
            Value::Object(h) if self.heap.kind(h) == ObjKind::Class => h,
            _ => return Err(RuntimeError::SuperclassMustBeClass),
        };
        let subclass = match self.peek(0) {
            Value::Object(h) => h,
            _ => unreachable!("INHERIT's subclass operand is always a class"),
        };
        let pairs: Vec<(Handle, Value)> = self.heap.class(superclass).methods.iter().collect();
        for (key, value) in pairs {
            let hash = self.heap.string(key).hash;
            self.heap.class_mut(subclass).methods.set(key, hash, value);
        }
        self.pop();
        Ok(())
    }

    fn op_method(&mut self) -> Result<(), RuntimeError> {
        let name = self.read_string();
        let method_value = self.peek(0);
        let class = match self.peek(1) {
            Value::Object(h) => h,
            _ => unreachable!("METHOD's class operand is always a class"),
        };
        let hash = self.heap.string(name).hash;
        self.heap.class_mut(class).methods.set(name, hash, method_value);
        self.pop();
        Ok(())
    }

    fn op_closure(&mut self) -> Result<(), RuntimeError> {
        let function_value = self.read_constant();
        let function_handle = match function_value {
            Value::Object(h) => h,
            _ => unreachable!("CLOSURE's operand is always a function constant"),
        };
        let upvalue_count = self.heap.function(function_handle).upvalue_count;
        let mut upvalues = Vec::with_capacity(upvalue_count as usize);
        for _ in 0..upvalue_count {
            let is_local = self.read_byte() != 0;
            let index = self.read_byte() as usize;
            if is_local {
                let base = self.frames.last().unwrap().base;
                upvalues.push(self.capture_upvalue(base + index));
            } else {
                let closure = self.frames.last().unwrap().closure;
                upvalues.push(self.heap.closure(closure).upvalues[index]);
            }
        }
        let closure = self.heap.alloc_closure(function_handle, upvalues.into_boxed_slice());
        self.push(Value::Object(closure))
    }

    // ---- arithmetic -----------------------------------------------------------

    fn op_add(&mut self) -> Result<(), RuntimeError> {
        let b = self.peek(0);
        let a = self.peek(1);
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                self.pop();
                self.pop();
                self.push(Value::Number(x + y))
            }
            (Value::Object(ha), Value::Object(hb))
                if self.heap.kind(ha) == ObjKind::String && self.heap.kind(hb) == ObjKind::String =>
            {
                // Both operands stay on the stack (still reachable from
                // `self.peek`) until the concatenated result is interned and
                // pushed, so nothing goes unrooted across the allocation.
                let mut bytes = self.heap.string(ha).bytes.to_vec();
                bytes.extend_from_slice(&self.heap.string(hb).bytes);
                let handle = self.heap.intern_take(bytes);
                self.pop();
                self.pop();
                self.push(Value::Object(handle))
            }
            _ => Err(RuntimeError::AddOperandsMismatch),
        }
    }

    fn binary_arith(&mut self, f: impl Fn(f64, f64) -> f64) -> Result<(), RuntimeError> {
        let b = self.peek(0).as_number();
        let a = self.peek(1).as_number();
        match (a, b) {
            (Some(x), Some(y)) => {
                self.pop();
                self.pop();
                self.push(Value::Number(f(x, y)))
            }
            _ => Err(RuntimeError::OperandsMustBeNumbers),
        }
    }

    fn binary_compare(&mut self, f: impl Fn(f64, f64) -> bool) -> Result<(), RuntimeError> {
        let b = self.peek(0).as_number();
        let a = self.peek(1).as_number();
        match (a, b) {
            (Some(x), Some(y)) => {
                self.pop();
                self.pop();
                self.push(Value::Bool(f(x, y)))
            }
            _ => Err(RuntimeError::OperandsMustBeNumbers),
        }
    }

    /// `%` truncates both operands to `i64` before dividing (spec.md §4.6);
    /// a zero divisor is a runtime error, not `NaN`/`inf` like float division.
    fn op_modulo(&mut self) -> Result<(), RuntimeError> {
        let b = self.peek(0).as_number();
        let a = self.peek(1).as_number();
        match (a, b) {
            (Some(x), Some(y)) => {
                let divisor = y as i64;
                if divisor == 0 {
                    return Err(RuntimeError::ModuloByZero);
                }
                let dividend = x as i64;
                self.pop();
                self.pop();
                self.push(Value::Number((dividend % divisor) as f64))
            }
            _ => Err(RuntimeError::OperandsMustBeNumbers),
        }
    }

    // ---- the loop --------------------------------------------------------

    #[allow(clippy::too_many_lines)]
    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            self.maybe_collect();
            let instruction = self.read_byte();
            match instruction {
                op::CONSTANT => {
                    let constant = self.read_constant();
                    self.push(constant)?;
                }
                op::NIL => self.push(Value::Nil)?,
                op::TRUE => self.push(Value::Bool(true))?,
                op::FALSE => self.push(Value::Bool(false))?,
                op::POP => {
                    self.pop();
                }
                op::GET_LOCAL => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().unwrap().base;
                    let value = self.stack[base + slot];
                    self.push(value)?;
                }
                op::SET_LOCAL => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().unwrap().base;
                    let value = self.peek(0);
                    self.stack[base + slot] = value;
                }
                op::GET_GLOBAL => {
                    let name = self.read_string();
                    let hash = self.heap.string(name).hash;
                    match self.globals.get(name, hash) {
                        Some(value) => self.push(value)?,
                        None => return Err(RuntimeError::UndefinedVariable(self.string_contents(name))),
                    }
                }
                op::DEFINE_GLOBAL => {
                    let name = self.read_string();
                    let hash = self.heap.string(name).hash;
                    let value = self.peek(0);
                    self.globals.set(name, hash, value);
                    self.pop();
                }
                op::SET_GLOBAL => {
                    let name = self.read_string();
                    let hash = self.heap.string(name).hash;
                    let value = self.peek(0);
                    if self.globals.set(name, hash, value) {
                        self.globals.delete(name, hash);
                        return Err(RuntimeError::UndefinedVariable(self.string_contents(name)));
                    }
                }
                op::GET_UPVALUE => {
                    let slot = self.read_byte() as usize;
                    let closure = self.frames.last().unwrap().closure;
                    let upvalue = self.heap.closure(closure).upvalues[slot];
                    let value = self.read_upvalue_value(upvalue);
                    self.push(value)?;
                }
                op::SET_UPVALUE => {
                    let slot = self.read_byte() as usize;
                    let closure = self.frames.last().unwrap().closure;
                    let upvalue = self.heap.closure(closure).upvalues[slot];
                    let value = self.peek(0);
                    self.write_upvalue_value(upvalue, value);
                }
                op::GET_PROPERTY => self.op_get_property()?,
                op::SET_PROPERTY => self.op_set_property()?,
                op::GET_SUPER => self.op_get_super()?,
                op::EQUAL => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b))?;
                }
                op::GREATER => self.binary_compare(|a, b| a > b)?,
                op::LESS => self.binary_compare(|a, b| a < b)?,
                op::ADD => self.op_add()?,
                op::SUBTRACT => self.binary_arith(|a, b| a - b)?,
                op::MULTIPLY => self.binary_arith(|a, b| a * b)?,
                op::DIVIDE => self.binary_arith(|a, b| a / b)?,
                op::MODULO => self.op_modulo()?,
                op::NOT => {
                    let value = self.pop();
                    self.push(Value::Bool(value.is_falsey()))?;
                }
                op::NEGATE => match self.peek(0).as_number() {
                    Some(n) => {
                        self.pop();
                        self.push(Value::Number(-n))?;
                    }
                    None => return Err(RuntimeError::OperandMustBeNumber),
                },
                op::PRINT => {
                    let value = self.pop();
                    println!("{}", self.heap.format_value(value));
                }
                op::JUMP => {
                    let offset = self.read_short();
                    self.frames.last_mut().unwrap().ip += offset as usize;
                }
                op::JUMP_IF_FALSE => {
                    let offset = self.read_short();
                    if self.peek(0).is_falsey() {
                        self.frames.last_mut().unwrap().ip += offset as usize;
                    }
                }
                op::LOOP => {
                    let offset = self.read_short();
                    self.frames.last_mut().unwrap().ip -= offset as usize;
                }
                op::CALL => {
                    let arg_count = self.read_byte();
                    let callee = self.peek(arg_count as usize);
                    self.call_value(callee, arg_count)?;
                }
                op::INVOKE => {
                    let name = self.read_string();
                    let arg_count = self.read_byte();
                    self.invoke(name, arg_count)?;
                }
                op::SUPER_INVOKE => {
                    let name = self.read_string();
                    let arg_count = self.read_byte();
                    let superclass_value = self.pop();
                    let superclass = match superclass_value {
                        Value::Object(h) => h,
                        _ => unreachable!("SUPER_INVOKE's operand is always a class"),
                    };
                    self.invoke_from_class(superclass, name, arg_count)?;
                }
                op::CLOSURE => self.op_closure()?,
                op::CLOSE_UPVALUE => {
                    let top = self.stack.len() - 1;
                    self.close_upvalues(top);
                    self.pop();
                }
                op::RETURN => {
                    let result = self.pop();
                    let base = self.frames.last().unwrap().base;
                    self.close_upvalues(base);
                    self.frames.pop();
                    if self.frames.is_empty() {
                        self.pop();
                        return Ok(());
                    }
                    self.stack.truncate(base);
                    self.push(result)?;
                }
                op::CLASS => {
                    let name = self.read_string();
                    let class = self.heap.alloc_class(name);
                    self.push(Value::Object(class))?;
                }
                op::INHERIT => self.op_inherit()?,
                op::METHOD => self.op_method()?,
                other => unreachable!("opcode {other} is not a valid instruction"),
            }
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_ok(source: &str) -> Vm {
        let mut vm = Vm::new();
        assert_eq!(vm.interpret(source.as_bytes()), InterpretResult::Ok);
        vm
    }

    #[test]
    fn arithmetic_and_print() {
        run_ok("print 1 + 2 * 3;");
    }

    #[test]
    fn string_concatenation() {
        run_ok(r#"print "foo" + "bar";"#);
    }

    #[test]
    fn closures_share_upvalues() {
        run_ok(
            r"
            fun counter() {
                var i = 0;
                fun inc() { i = i + 1; return i; }
                return inc;
            }
            var c = counter();
            print c();
            print c();
            ",
        );
    }

    #[test]
    fn classes_methods_and_inheritance() {
        run_ok(
            r#"
            class Animal {
                init(name) { this.name = name; }
                speak() { return this.name; }
            }
            class Dog < Animal {
                speak() { return super.speak() + " woofs"; }
            }
            var d = Dog("Rex");
            print d.speak();
            "#,
        );
    }

    #[test]
    fn undefined_global_is_a_runtime_error() {
        let mut vm = Vm::new();
        assert_eq!(vm.interpret(b"print nope;"), InterpretResult::RuntimeError);
    }

    #[test]
    fn division_follows_ieee_754_semantics() {
        run_ok("print 1 / 0;");
    }

    #[test]
    fn modulo_by_zero_is_a_runtime_error() {
        let mut vm = Vm::new();
        assert_eq!(vm.interpret(b"print 1 % 0;"), InterpretResult::RuntimeError);
    }

    #[test]
    fn wrong_arity_is_a_runtime_error() {
        let mut vm = Vm::new();
        assert_eq!(vm.interpret(b"fun f(a) { return a; } f();"), InterpretResult::RuntimeError);
    }

    #[test]
    fn calling_a_non_callable_is_a_runtime_error() {
        let mut vm = Vm::new();
        assert_eq!(vm.interpret(b"var x = 1; x();"), InterpretResult::RuntimeError);
    }

    #[test]
    fn stress_gc_survives_a_realistic_program() {
        let mut vm = Vm::new();
        vm.set_stress_gc(true);
        let result = vm.interpret(
            br#"
            class Node {
                init(value) { this.value = value; }
            }
            var total = 0;
            for (var i = 0; i < 50; i = i + 1) {
                var n = Node(i);
                total = total + n.value;
            }
            print total;
            "#,
        );
        assert_eq!(result, InterpretResult::Ok);
    }

    #[test]
    fn globals_and_heap_persist_across_interpret_calls() {
        let mut vm = Vm::new();
        assert_eq!(vm.interpret(b"var x = 41;"), InterpretResult::Ok);
        assert_eq!(vm.interpret(b"print x + 1;"), InterpretResult::Ok);
    }

    #[test]
    fn stress_gc_does_not_corrupt_string_concatenation() {
        let mut vm = Vm::new();
        vm.set_stress_gc(true);
        let result = vm.interpret(
            br#"
            var a = "hello";
            var b = "world";
            for (var i = 0; i < 50; i = i + 1) {
                var c = a + b;
                if (c != "helloworld") {
                    print "corrupted";
                }
            }
            print a;
            print b;
            "#,
        );
        assert_eq!(result, InterpretResult::Ok);
    }

    #[test]
    fn stress_gc_stabilizes_under_nested_closures_dropped_each_iteration() {
        let mut vm = Vm::new();
        vm.set_stress_gc(true);
        let result = vm.interpret(
            br#"
            fun make() {
                var x = 0;
                fun inc() { x = x + 1; return x; }
                return inc;
            }
            for (var i = 0; i < 200; i = i + 1) {
                var f = make();
                f();
            }
            print "done";
            "#,
        );
        assert_eq!(result, InterpretResult::Ok);
    }
}
