//! Single-pass Pratt compiler: tokens straight to bytecode, no AST
//! (spec.md §4.5).

use wispc_core::{op, Handle, Heap, ObjFunction, Value};
use wispc_lex::{Scanner, Token, TokenKind};
use wispc_util::{Handler, Span};

use crate::error::CompileError;
use crate::rules::{get_rule, Precedence};

const MAX_LOCALS: usize = 256;
const MAX_UPVALUES: usize = 256;
const MAX_CONSTANTS: usize = 256;
const MAX_PARAMS: usize = 255;
const MAX_ARGS: usize = 255;
const MAX_JUMP: usize = u16::MAX as usize;

#[derive(Clone, Copy, PartialEq, Eq)]
enum FunctionType {
    Script,
    Function,
    Method,
    Initializer,
}

struct Local<'src> {
    name: Token<'src>,
    /// `-1` (modeled here as `None`) means declared but not yet initialized:
    /// reading the name in its own initializer is a compile error.
    depth: Option<i32>,
    is_captured: bool,
}

#[derive(Clone, Copy)]
struct UpvalueDesc {
    index: u8,
    is_local: bool,
}

struct FunctionFrame<'src> {
    function: Handle,
    kind: FunctionType,
    locals: Vec<Local<'src>>,
    upvalues: Vec<UpvalueDesc>,
    scope_depth: i32,
}

impl<'src> FunctionFrame<'src> {
    fn new(function: Handle, kind: FunctionType) -> Self {
        let reserved: &'static [u8] = if matches!(kind, FunctionType::Method | FunctionType::Initializer) {
            b"this"
        } else {
            b""
        };
        let slot0 = Token {
            kind: TokenKind::Identifier,
            lexeme: reserved,
            line: 0,
        };
        Self {
            function,
            kind,
            locals: vec![Local {
                name: slot0,
                depth: Some(0),
                is_captured: false,
            }],
            upvalues: Vec::new(),
            scope_depth: 0,
        }
    }
}

struct ClassScope {
    has_superclass: bool,
}

/// Compiles one top-level script (or REPL line) into a top-level Function.
///
/// Holds the scanner, the current/previous token pair (the Pratt parser's
/// one-token lookahead), an enclosing chain of [`FunctionFrame`]s — one per
/// nested function currently being compiled, outermost first — and a
/// separate stack of [`ClassScope`]s tracking `super`/inheritance state for
/// nested class bodies.
pub struct Compiler<'src, 'h> {
    scanner: Scanner<'src>,
    heap: &'h mut Heap,
    handler: Handler,
    previous: Token<'src>,
    current: Token<'src>,
    frames: Vec<FunctionFrame<'src>>,
    classes: Vec<ClassScope>,
}

/// Compiles `source` into a top-level Function, or a [`CompileError`] if any
/// compile error was reported (each is printed to stderr as it's found, per
/// spec.md §7; panic-mode recovery means a single bad token never cascades
/// into a screenful of noise, though a program with multiple independent
/// errors will see each one reported).
pub fn compile(source: &[u8], heap: &mut Heap) -> Result<Handle, CompileError> {
    let mut compiler = Compiler::new(source, heap);
    compiler.advance();
    while !compiler.check(TokenKind::Eof) {
        compiler.declaration();
    }
    compiler.consume(TokenKind::Eof, "Unexpected token after end of program.");
    let (function, _upvalues) = compiler.end_function();
    if compiler.handler.had_error() {
        Err(CompileError {
            diagnostic_count: compiler.handler.diagnostics().len(),
        })
    } else {
        Ok(function)
    }
}

impl<'src, 'h> Compiler<'src, 'h> {
    fn new(source: &'src [u8], heap: &'h mut Heap) -> Self {
        let function = heap.alloc_function(ObjFunction::new(None));
        let dummy = Token {
            kind: TokenKind::Eof,
            lexeme: b"",
            line: 0,
        };
        Self {
            scanner: Scanner::new(source),
            heap,
            handler: Handler::new(),
            previous: dummy,
            current: dummy,
            frames: vec![FunctionFrame::new(function, FunctionType::Script)],
            classes: Vec::new(),
        }
    }

    // ---- token stream -----------------------------------------------------

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let message = self.current.lexeme_str().to_string();
            self.handler.error_at(Span::new(self.current.line), Some(""), message);
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
        } else {
            self.error_at_current(message);
        }
    }

    fn error_at_current(&mut self, message: impl Into<String>) {
        let token = self.current;
        self.error_at(token, message);
    }

    fn error(&mut self, message: impl Into<String>) {
        let token = self.previous;
        self.error_at(token, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: impl Into<String>) {
        self.handler
            .error_at(Span::new(token.line), Some(token.lexeme_str()), message);
    }

    /// Resynchronizes at the next statement boundary after a compile error,
    /// so one bad token produces one reported error, not a cascade
    /// (spec.md §7).
    fn synchronize(&mut self) {
        self.handler.synchronize();
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Class
                | TokenKind::Fun
                | TokenKind::Var
                | TokenKind::For
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => self.advance(),
            }
        }
    }

    // ---- current-frame helpers ---------------------------------------------

    fn frame(&self) -> &FunctionFrame<'src> {
        self.frames.last().expect("at least the script frame is always present")
    }

    fn frame_mut(&mut self) -> &mut FunctionFrame<'src> {
        self.frames.last_mut().expect("at least the script frame is always present")
    }

    fn current_function(&self) -> Handle {
        self.frame().function
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        let function = self.current_function();
        self.heap.function_mut(function).chunk.write(byte, line);
    }

    fn emit_bytes(&mut self, a: u8, b: u8) {
        self.emit_byte(a);
        self.emit_byte(b);
    }

    fn emit_constant(&mut self, value: Value) {
        let function = self.current_function();
        let index = self.heap.function_mut(function).chunk.add_constant(value);
        if index >= MAX_CONSTANTS {
            self.error("Too many constants in one chunk.");
            return;
        }
        self.emit_bytes(op::CONSTANT, index as u8);
    }

    /// Interns `name` and adds it as a constant, returning its index. Used
    /// for every name-as-string operand: globals, properties, methods.
    fn identifier_constant(&mut self, name: &[u8]) -> u8 {
        let handle = self.heap.intern_copy(name);
        let function = self.current_function();
        let index = self.heap.function_mut(function).chunk.add_constant(Value::Object(handle));
        if index >= MAX_CONSTANTS {
            self.error("Too many constants in one chunk.");
            return 0;
        }
        index as u8
    }

    fn emit_jump(&mut self, instruction: u8) -> usize {
        self.emit_byte(instruction);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        let function = self.current_function();
        self.heap.function_mut(function).chunk.code.len() - 2
    }

    fn patch_jump(&mut self, offset: usize) {
        let function = self.current_function();
        let chunk_len = self.heap.function_mut(function).chunk.code.len();
        let jump = chunk_len - offset - 2;
        if jump > MAX_JUMP {
            self.error("Too much code to jump over.");
            return;
        }
        let chunk = &mut self.heap.function_mut(function).chunk;
        chunk.code[offset] = ((jump >> 8) & 0xff) as u8;
        chunk.code[offset + 1] = (jump & 0xff) as u8;
    }

    fn emit_loop(&mut self, loop_start: usize) {
        self.emit_byte(op::LOOP);
        let function = self.current_function();
        let chunk_len = self.heap.function_mut(function).chunk.code.len();
        let offset = chunk_len - loop_start + 2;
        if offset > MAX_JUMP {
            self.error("Loop body too large.");
        }
        self.emit_byte(((offset >> 8) & 0xff) as u8);
        self.emit_byte((offset & 0xff) as u8);
    }

    fn emit_return(&mut self) {
        if self.frame().kind == FunctionType::Initializer {
            self.emit_bytes(op::GET_LOCAL, 0);
        } else {
            self.emit_byte(op::NIL);
        }
        self.emit_byte(op::RETURN);
    }

    /// Closes out the current frame: implicit return, then pops it and
    /// hands back the Function it built along with the capture list the
    /// enclosing frame's `CLOSURE` operand needs.
    fn end_function(&mut self) -> (Handle, Vec<UpvalueDesc>) {
        self.emit_return();
        let frame = self.frames.pop().expect("script frame always present");
        (frame.function, frame.upvalues)
    }

    // ---- scopes -------------------------------------------------------------

    fn begin_scope(&mut self) {
        self.frame_mut().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.frame_mut().scope_depth -= 1;
        let depth = self.frame().scope_depth;
        while let Some(local) = self.frame().locals.last() {
            if local.depth.map_or(false, |d| d > depth) {
                if self.frame().locals.last().unwrap().is_captured {
                    self.emit_byte(op::CLOSE_UPVALUE);
                } else {
                    self.emit_byte(op::POP);
                }
                self.frame_mut().locals.pop();
            } else {
                break;
            }
        }
    }

    // ---- declarations ---------------------------------------------------

    /// Every declaration parsed is a safe point: the whole live object graph
    /// being built is reachable from the enclosing frame chain's functions,
    /// so a collection here never needs anything beyond that (spec.md §4.3's
    /// "each enclosing compiler's current Function" root).
    fn collect_garbage(&mut self) {
        let roots: Vec<Value> = self.frames.iter().map(|f| Value::Object(f.function)).collect();
        self.heap.maybe_collect(roots);
    }

    fn declaration(&mut self) {
        self.collect_garbage();
        if self.match_token(TokenKind::Class) {
            self.class_declaration();
        } else if self.match_token(TokenKind::Fun) {
            self.fun_declaration();
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }
        if self.handler.in_panic_mode() {
            self.synchronize();
        }
    }

    fn class_declaration(&mut self) {
        self.consume(TokenKind::Identifier, "Expect class name.");
        let class_name = self.previous;
        let name_constant = self.identifier_constant(class_name.lexeme);
        self.declare_variable(class_name);

        self.emit_bytes(op::CLASS, name_constant);
        self.define_variable(name_constant);

        self.classes.push(ClassScope { has_superclass: false });

        if self.match_token(TokenKind::Less) {
            self.consume(TokenKind::Identifier, "Expect superclass name.");
            self.variable(false);
            if self.identifiers_equal(self.previous, class_name) {
                self.error("A class can't inherit from itself.");
            }

            self.begin_scope();
            self.add_local(Token {
                kind: TokenKind::Identifier,
                lexeme: b"super",
                line: class_name.line,
            });
            self.define_variable(0);

            self.named_variable(class_name, false);
            self.emit_byte(op::INHERIT);
            self.classes.last_mut().unwrap().has_superclass = true;
        }

        self.named_variable(class_name, false);
        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.");
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.method();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after class body.");
        self.emit_byte(op::POP);

        let class_scope = self.classes.pop().expect("pushed above");
        if class_scope.has_superclass {
            self.end_scope();
        }
    }

    fn method(&mut self) {
        self.consume(TokenKind::Identifier, "Expect method name.");
        let name = self.previous;
        let constant = self.identifier_constant(name.lexeme);
        let kind = if name.lexeme == b"init" {
            FunctionType::Initializer
        } else {
            FunctionType::Method
        };
        self.function(kind);
        self.emit_bytes(op::METHOD, constant);
    }

    fn fun_declaration(&mut self) {
        self.consume(TokenKind::Identifier, "Expect function name.");
        let name = self.previous;
        let global = self.parse_variable_name(name);
        self.mark_initialized();
        self.function(FunctionType::Function);
        self.define_variable(global);
    }

    fn function(&mut self, kind: FunctionType) {
        let name_bytes = self.previous.lexeme;
        let name_handle = self.heap.intern_copy(name_bytes);
        let function = self.heap.alloc_function(ObjFunction::new(Some(name_handle)));
        self.frames.push(FunctionFrame::new(function, kind));

        self.begin_scope();
        self.consume(TokenKind::LeftParen, "Expect '(' after function name.");
        if !self.check(TokenKind::RightParen) {
            loop {
                let arity = self.heap.function(self.current_function()).arity;
                if (arity as usize) >= MAX_PARAMS {
                    self.error_at_current("Can't have more than 255 parameters.");
                }
                let new_arity = arity + 1;
                let f = self.current_function();
                self.heap.function_mut(f).arity = new_arity;
                self.consume(TokenKind::Identifier, "Expect parameter name.");
                let param = self.previous;
                self.declare_variable(param);
                self.define_variable(0);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.");
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.");
        self.block();

        let (inner, upvalues) = self.end_function();
        self.heap.function_mut(inner).upvalue_count = upvalues.len() as u8;

        self.emit_constant(Value::Object(inner));
        // Patch CONSTANT into CLOSURE: emit_constant already wrote
        // `CONSTANT idx`; rewrite the opcode byte in place to CLOSURE and
        // append the capture metadata that follows it.
        let outer_function = self.current_function();
        let chunk_len = self.heap.function(outer_function).chunk.code.len();
        self.heap.function_mut(outer_function).chunk.code[chunk_len - 2] = op::CLOSURE;
        for upvalue in upvalues {
            self.emit_byte(u8::from(upvalue.is_local));
            self.emit_byte(upvalue.index);
        }
    }

    fn var_declaration(&mut self) {
        self.consume(TokenKind::Identifier, "Expect variable name.");
        let name = self.previous;
        let global = self.parse_variable_name(name);

        if self.match_token(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_byte(op::NIL);
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.");
        self.define_variable(global);
    }

    fn parse_variable_name(&mut self, name: Token<'src>) -> u8 {
        self.declare_variable(name);
        if self.frame().scope_depth > 0 {
            return 0;
        }
        self.identifier_constant(name.lexeme)
    }

    fn declare_variable(&mut self, name: Token<'src>) {
        if self.frame().scope_depth == 0 {
            return;
        }
        let depth = self.frame().scope_depth;
        for local in self.frame().locals.iter().rev() {
            if let Some(d) = local.depth {
                if d < depth {
                    break;
                }
            }
            if self.identifiers_equal(local.name, name) {
                self.error("Already a variable with this name in this scope.");
            }
        }
        self.add_local(name);
    }

    fn add_local(&mut self, name: Token<'src>) {
        if self.frame().locals.len() >= MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.frame_mut().locals.push(Local {
            name,
            depth: None,
            is_captured: false,
        });
    }

    fn mark_initialized(&mut self) {
        if self.frame().scope_depth == 0 {
            return;
        }
        let depth = self.frame().scope_depth;
        self.frame_mut().locals.last_mut().unwrap().depth = Some(depth);
    }

    fn define_variable(&mut self, global: u8) {
        if self.frame().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_bytes(op::DEFINE_GLOBAL, global);
    }

    fn identifiers_equal(&self, a: Token<'src>, b: Token<'src>) -> bool {
        a.lexeme == b.lexeme
    }

    // ---- statements -------------------------------------------------------

    fn statement(&mut self) {
        if self.match_token(TokenKind::Print) {
            self.print_statement();
        } else if self.match_token(TokenKind::If) {
            self.if_statement();
        } else if self.match_token(TokenKind::Return) {
            self.return_statement();
        } else if self.match_token(TokenKind::While) {
            self.while_statement();
        } else if self.match_token(TokenKind::For) {
            self.for_statement();
        } else if self.match_token(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.");
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_byte(op::PRINT);
    }

    fn return_statement(&mut self) {
        if self.frame().kind == FunctionType::Script {
            self.error("Can't return from top-level code.");
        }
        if self.match_token(TokenKind::Semicolon) {
            self.emit_return();
        } else {
            if self.frame().kind == FunctionType::Initializer {
                self.error("Can't return a value from an initializer.");
            }
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.");
            self.emit_byte(op::RETURN);
        }
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(op::JUMP_IF_FALSE);
        self.emit_byte(op::POP);
        self.statement();

        let else_jump = self.emit_jump(op::JUMP);
        self.patch_jump(then_jump);
        self.emit_byte(op::POP);

        if self.match_token(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let function = self.current_function();
        let loop_start = self.heap.function(function).chunk.code.len();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(op::JUMP_IF_FALSE);
        self.emit_byte(op::POP);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_byte(op::POP);
    }

    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.");
        if self.match_token(TokenKind::Semicolon) {
            // no initializer
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let function = self.current_function();
        let mut loop_start = self.heap.function(function).chunk.code.len();
        let mut exit_jump = None;
        if !self.match_token(TokenKind::Semicolon) {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.");
            exit_jump = Some(self.emit_jump(op::JUMP_IF_FALSE));
            self.emit_byte(op::POP);
        }

        if !self.match_token(TokenKind::RightParen) {
            let body_jump = self.emit_jump(op::JUMP);
            let function = self.current_function();
            let increment_start = self.heap.function(function).chunk.code.len();
            self.expression();
            self.emit_byte(op::POP);
            self.consume(TokenKind::RightParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit_byte(op::POP);
        }
        self.end_scope();
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_byte(op::POP);
    }

    // ---- expressions (Pratt parser) ----------------------------------------

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let prefix = get_rule(self.previous.kind).prefix;
        let Some(prefix) = prefix else {
            self.error("Expect expression.");
            return;
        };
        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign);

        while precedence <= get_rule(self.current.kind).precedence {
            self.advance();
            let infix = get_rule(self.previous.kind).infix.expect("precedence table guarantees an infix fn here");
            infix(self, can_assign);
        }

        if can_assign && self.match_token(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn number(&mut self, _can_assign: bool) {
        let text = self.previous.lexeme_str();
        let value: f64 = text.parse().unwrap_or(f64::NAN);
        self.emit_constant(Value::Number(value));
    }

    fn string(&mut self, _can_assign: bool) {
        // Lexeme includes the surrounding quotes (spec.md §6); strip them.
        let raw = self.previous.lexeme;
        let bytes = &raw[1..raw.len() - 1];
        let handle = self.heap.intern_copy(bytes);
        self.emit_constant(Value::Object(handle));
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenKind::False => self.emit_byte(op::FALSE),
            TokenKind::True => self.emit_byte(op::TRUE),
            TokenKind::Nil => self.emit_byte(op::NIL),
            _ => unreachable!("literal() only dispatched for false/true/nil"),
        }
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match operator {
            TokenKind::Minus => self.emit_byte(op::NEGATE),
            TokenKind::Bang => self.emit_byte(op::NOT),
            _ => unreachable!("unary() only dispatched for -/!"),
        }
    }

    fn binary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;
        let rule = get_rule(operator);
        self.parse_precedence(rule.precedence.one_higher());
        match operator {
            TokenKind::Plus => self.emit_byte(op::ADD),
            TokenKind::Minus => self.emit_byte(op::SUBTRACT),
            TokenKind::Star => self.emit_byte(op::MULTIPLY),
            TokenKind::Slash => self.emit_byte(op::DIVIDE),
            TokenKind::Percent => self.emit_byte(op::MODULO),
            TokenKind::BangEqual => self.emit_bytes(op::EQUAL, op::NOT),
            TokenKind::EqualEqual => self.emit_byte(op::EQUAL),
            TokenKind::Greater => self.emit_byte(op::GREATER),
            TokenKind::GreaterEqual => self.emit_bytes(op::LESS, op::NOT),
            TokenKind::Less => self.emit_byte(op::LESS),
            TokenKind::LessEqual => self.emit_bytes(op::GREATER, op::NOT),
            _ => unreachable!("binary() only dispatched for arithmetic/comparison operators"),
        }
    }

    fn and(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(op::JUMP_IF_FALSE);
        self.emit_byte(op::POP);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(op::JUMP_IF_FALSE);
        let end_jump = self.emit_jump(op::JUMP);
        self.patch_jump(else_jump);
        self.emit_byte(op::POP);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn call(&mut self, _can_assign: bool) {
        let arg_count = self.argument_list();
        self.emit_bytes(op::CALL, arg_count);
    }

    fn argument_list(&mut self) -> u8 {
        let mut count: usize = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression();
                if count >= MAX_ARGS {
                    self.error("Can't have more than 255 arguments.");
                }
                count += 1;
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after arguments.");
        count as u8
    }

    fn dot(&mut self, can_assign: bool) {
        self.consume(TokenKind::Identifier, "Expect property name after '.'.");
        let name = self.previous.lexeme;
        let name_constant = self.identifier_constant(name);

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_bytes(op::SET_PROPERTY, name_constant);
        } else if self.match_token(TokenKind::LeftParen) {
            let arg_count = self.argument_list();
            self.emit_bytes(op::INVOKE, name_constant);
            self.emit_byte(arg_count);
        } else {
            self.emit_bytes(op::GET_PROPERTY, name_constant);
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous;
        self.named_variable(name, can_assign);
    }

    fn named_variable(&mut self, name: Token<'src>, can_assign: bool) {
        let (get_op, set_op, arg) = if let Some(slot) = self.resolve_local(self.frames.len() - 1, name) {
            (op::GET_LOCAL, op::SET_LOCAL, slot)
        } else if let Some(slot) = self.resolve_upvalue(self.frames.len() - 1, name) {
            (op::GET_UPVALUE, op::SET_UPVALUE, slot)
        } else {
            (op::GET_GLOBAL, op::SET_GLOBAL, self.identifier_constant(name.lexeme))
        };

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_bytes(set_op, arg);
        } else {
            self.emit_bytes(get_op, arg);
        }
    }

    fn resolve_local(&mut self, frame_index: usize, name: Token<'src>) -> Option<u8> {
        let frame = &self.frames[frame_index];
        for (slot, local) in frame.locals.iter().enumerate().rev() {
            if self.identifiers_equal(local.name, name) {
                if local.depth.is_none() {
                    self.error("Can't read local variable in its own initializer.");
                }
                return Some(slot as u8);
            }
        }
        None
    }

    /// Walks the enclosing chain to resolve `name` as an upvalue, recording
    /// capture metadata along the way (spec.md §4.5). De-duplicated by
    /// `(index, is_local)` so repeated references to the same captured
    /// variable share one upvalue slot.
    fn resolve_upvalue(&mut self, frame_index: usize, name: Token<'src>) -> Option<u8> {
        if frame_index == 0 {
            return None;
        }
        let enclosing = frame_index - 1;
        if let Some(local_slot) = self.resolve_local(enclosing, name) {
            self.frames[enclosing].locals[local_slot as usize].is_captured = true;
            return Some(self.add_upvalue(frame_index, local_slot, true));
        }
        if let Some(upvalue_slot) = self.resolve_upvalue(enclosing, name) {
            return Some(self.add_upvalue(frame_index, upvalue_slot, false));
        }
        None
    }

    fn add_upvalue(&mut self, frame_index: usize, index: u8, is_local: bool) -> u8 {
        let frame = &mut self.frames[frame_index];
        for (i, existing) in frame.upvalues.iter().enumerate() {
            if existing.index == index && existing.is_local == is_local {
                return i as u8;
            }
        }
        if frame.upvalues.len() >= MAX_UPVALUES {
            self.error("Too many closure variables in function.");
            return 0;
        }
        frame.upvalues.push(UpvalueDesc { index, is_local });
        (frame.upvalues.len() - 1) as u8
    }

    fn this(&mut self, _can_assign: bool) {
        if self.classes.is_empty() {
            self.error("Can't use 'this' outside of a class.");
        }
        let token = Token {
            kind: TokenKind::This,
            lexeme: b"this",
            line: self.previous.line,
        };
        self.variable_read_only(token);
    }

    /// `this`/`super` both resolve like a local/upvalue read but are never
    /// assignment targets, so they skip `named_variable`'s `can_assign`
    /// branch entirely rather than gate it with a token that isn't `=`.
    fn variable_read_only(&mut self, name: Token<'src>) {
        self.named_variable(name, false);
    }

    fn super_(&mut self, _can_assign: bool) {
        if self.classes.is_empty() {
            self.error("Can't use 'super' outside of a class.");
        } else if !self.classes.last().unwrap().has_superclass {
            self.error("Can't use 'super' in a class with no superclass.");
        }

        self.consume(TokenKind::Dot, "Expect '.' after 'super'.");
        self.consume(TokenKind::Identifier, "Expect superclass method name.");
        let method_name = self.identifier_constant(self.previous.lexeme);

        let this_token = Token {
            kind: TokenKind::This,
            lexeme: b"this",
            line: self.previous.line,
        };
        let super_token = Token {
            kind: TokenKind::Super,
            lexeme: b"super",
            line: self.previous.line,
        };

        if self.match_token(TokenKind::LeftParen) {
            self.variable_read_only(this_token);
            let arg_count = self.argument_list();
            self.variable_read_only(super_token);
            self.emit_bytes(op::SUPER_INVOKE, method_name);
            self.emit_byte(arg_count);
        } else {
            self.variable_read_only(this_token);
            self.variable_read_only(super_token);
            self.emit_bytes(op::GET_SUPER, method_name);
        }
    }
}
