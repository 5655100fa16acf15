//! Single-pass Pratt compiler: scanning, parsing, scope resolution,
//! upvalue capture analysis, and bytecode emission all happen in one
//! pass, with no intermediate AST.

use rlox_core::{Chunk, Heap, ObjRef, OpCode, Value};

use crate::error::CompileError;
use crate::scanner::{Scanner, Token, TokenKind};

const MAX_LOCALS: usize = 256;
const MAX_UPVALUES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // . ()
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        use Precedence::*;
        match self {
            None => Assignment,
            Assignment => Or,
            Or => And,
            And => Equality,
            Equality => Comparison,
            Comparison => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Call,
            Call => Primary,
            Primary => Primary,
        }
    }
}

/// Tagged rule identifiers rather than raw function pointers:
/// `parse_precedence` matches on the variant to invoke the right
/// prefix/infix handler. This sidesteps the aliasing friction of a
/// literal `fn(&mut Self, bool)` table while keeping the same
/// "table driven by token kind" structure.
#[derive(Clone, Copy)]
enum Rule {
    Grouping,
    Unary,
    Binary,
    Number,
    StringLit,
    Literal,
    Variable,
    And,
    Or,
    Call,
    Dot,
    This,
    Super,
}

struct ParseRule {
    prefix: Option<Rule>,
    infix: Option<Rule>,
    precedence: Precedence,
}

const fn rule(prefix: Option<Rule>, infix: Option<Rule>, precedence: Precedence) -> ParseRule {
    ParseRule {
        prefix,
        infix,
        precedence,
    }
}

const NUM_TOKEN_KINDS: usize = 40;

fn parse_rule(kind: TokenKind) -> &'static ParseRule {
    use Precedence::*;
    use Rule::*;
    use TokenKind as T;

    static RULES: [ParseRule; NUM_TOKEN_KINDS] = {
        let mut rules = [
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
            rule(None, None, Precedence::None),
        ];
        rules[T::LeftParen as usize] = rule(Some(Grouping), Some(Call), Call);
        rules[T::Dot as usize] = rule(None, Some(Dot), Call);
        rules[T::Minus as usize] = rule(Some(Unary), Some(Binary), Term);
        rules[T::Plus as usize] = rule(None, Some(Binary), Term);
        rules[T::Slash as usize] = rule(None, Some(Binary), Factor);
        rules[T::Star as usize] = rule(None, Some(Binary), Factor);
        rules[T::Bang as usize] = rule(Some(Unary), None, Precedence::None);
        rules[T::BangEqual as usize] = rule(None, Some(Binary), Equality);
        rules[T::EqualEqual as usize] = rule(None, Some(Binary), Equality);
        rules[T::Greater as usize] = rule(None, Some(Binary), Comparison);
        rules[T::GreaterEqual as usize] = rule(None, Some(Binary), Comparison);
        rules[T::Less as usize] = rule(None, Some(Binary), Comparison);
        rules[T::LessEqual as usize] = rule(None, Some(Binary), Comparison);
        rules[T::Identifier as usize] = rule(Some(Variable), None, Precedence::None);
        rules[T::String as usize] = rule(Some(StringLit), None, Precedence::None);
        rules[T::Number as usize] = rule(Some(Number), None, Precedence::None);
        rules[T::And as usize] = rule(None, Some(And), Precedence::And);
        rules[T::False as usize] = rule(Some(Literal), None, Precedence::None);
        rules[T::Nil as usize] = rule(Some(Literal), None, Precedence::None);
        rules[T::True as usize] = rule(Some(Literal), None, Precedence::None);
        rules[T::Or as usize] = rule(None, Some(Or), Precedence::Or);
        rules[T::Super as usize] = rule(Some(Super), None, Precedence::None);
        rules[T::This as usize] = rule(Some(This), None, Precedence::None);
        rules
    };

    &RULES[kind as usize]
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum FunctionType {
    Script,
    Function,
    Method,
    Initializer,
}

struct LocalVar<'src> {
    name: &'src str,
    depth: i32,
    is_captured: bool,
}

struct UpvalueSlot {
    index: u8,
    is_local: bool,
}

struct FunctionScope<'src> {
    function: ObjRef,
    fn_type: FunctionType,
    locals: Vec<LocalVar<'src>>,
    upvalues: Vec<UpvalueSlot>,
    scope_depth: i32,
}

impl<'src> FunctionScope<'src> {
    fn new(function: ObjRef, fn_type: FunctionType) -> Self {
        // Slot 0 is reserved: `this` for methods/initializers, the
        // empty name otherwise (so user code can never reference it).
        let reserved_name = if fn_type == FunctionType::Method || fn_type == FunctionType::Initializer {
            "this"
        } else {
            ""
        };
        Self {
            function,
            fn_type,
            locals: vec![LocalVar {
                name: reserved_name,
                depth: 0,
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

pub struct Compiler<'src, 'h> {
    heap: &'h mut Heap,
    scanner: Scanner<'src>,
    previous: Token<'src>,
    current: Token<'src>,
    had_error: bool,
    panic_mode: bool,
    diagnostics: Vec<(i32, String, String)>,
    scopes: Vec<FunctionScope<'src>>,
    classes: Vec<ClassScope>,
}

/// Compiles a complete program into a top-level script function.
pub fn compile(source: &str, heap: &mut Heap) -> Result<ObjRef, CompileError> {
    let mut compiler = Compiler::new(source, heap);
    compiler.run()
}

impl<'src, 'h> Compiler<'src, 'h> {
    fn new(source: &'src str, heap: &'h mut Heap) -> Self {
        let mut scanner = Scanner::new(source);
        let first = scanner.scan_token();
        let script = heap.alloc_function();
        Self {
            heap,
            scanner,
            previous: first,
            current: first,
            had_error: false,
            panic_mode: false,
            diagnostics: Vec::new(),
            scopes: vec![FunctionScope::new(script, FunctionType::Script)],
            classes: Vec::new(),
        }
    }

    fn run(mut self) -> Result<ObjRef, CompileError> {
        while !self.check(TokenKind::Eof) {
            self.declaration();
        }
        let function = self.end_compiler();
        if self.had_error {
            Err(CompileError {
                diagnostics: self
                    .diagnostics
                    .into_iter()
                    .map(|(line, context, message)| crate::error::Diagnostic {
                        line,
                        context,
                        message,
                    })
                    .collect(),
            })
        } else {
            Ok(function)
        }
    }

    // --- token stream helpers ---

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            self.error_at_current(self.current.lexeme);
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
        } else {
            self.error_at_current(message);
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

    // --- error reporting ---

    fn error_at_current(&mut self, message: &str) {
        let tok = self.current;
        self.error_at(tok, message);
    }

    fn error(&mut self, message: &str) {
        let tok = self.previous;
        self.error_at(tok, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        let context = match token.kind {
            TokenKind::Eof => " at end".to_string(),
            TokenKind::Error => String::new(),
            _ => format!(" at '{}'", token.lexeme),
        };
        self.diagnostics.push((token.line, context, message.to_string()));
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
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

    // --- bytecode emission ---

    fn current_scope(&mut self) -> &mut FunctionScope<'src> {
        self.scopes.last_mut().expect("compiler always has a scope")
    }

    fn current_chunk(&mut self) -> &mut Chunk {
        &mut self.current_scope().function.as_function_mut().chunk
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.current_chunk().write(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op as u8);
    }

    fn emit_bytes(&mut self, op: OpCode, byte: u8) {
        self.emit_op(op);
        self.emit_byte(byte);
    }

    fn emit_loop(&mut self, loop_start: usize) {
        self.emit_op(OpCode::Loop);
        let offset = self.current_chunk().len() - loop_start + 2;
        if offset > u16::MAX as usize {
            self.error("Loop body too large.");
        }
        self.emit_byte(((offset >> 8) & 0xff) as u8);
        self.emit_byte((offset & 0xff) as u8);
    }

    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        self.emit_byte(0xff);
        self.emit_byte(0xff);
        self.current_chunk().len() - 2
    }

    fn patch_jump(&mut self, offset: usize) {
        let jump = self.current_chunk().len() - offset - 2;
        if jump > u16::MAX as usize {
            self.error("Too much code to jump over.");
        }
        self.current_chunk().code[offset] = ((jump >> 8) & 0xff) as u8;
        self.current_chunk().code[offset + 1] = (jump & 0xff) as u8;
    }

    fn emit_return(&mut self) {
        if self.current_scope().fn_type == FunctionType::Initializer {
            self.emit_bytes(OpCode::GetLocal, 0);
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.emit_op(OpCode::Return);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        let index = self.current_chunk().add_constant(value);
        if index > u8::MAX as usize {
            self.error("Too many constants in one chunk.");
            return 0;
        }
        index as u8
    }

    fn emit_constant(&mut self, value: Value) {
        let index = self.make_constant(value);
        self.emit_bytes(OpCode::Constant, index);
    }

    /// Interns `name` and adds it to the current chunk's constant
    /// pool, returning the constant index used by `GetGlobal` &c.
    fn identifier_constant(&mut self, name: &str) -> u8 {
        let interned = self.heap.intern_str(name);
        self.make_constant(Value::Obj(interned))
    }

    fn end_compiler(&mut self) -> ObjRef {
        self.emit_return();
        self.scopes.pop().expect("ending an open scope").function
    }

    // --- scopes & locals ---

    fn begin_scope(&mut self) {
        self.current_scope().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.current_scope().scope_depth -= 1;
        let depth = self.current_scope().scope_depth;
        while let Some(local) = self.current_scope().locals.last() {
            if local.depth <= depth {
                break;
            }
            if self.current_scope().locals.last().unwrap().is_captured {
                self.emit_op(OpCode::CloseUpvalue);
            } else {
                self.emit_op(OpCode::Pop);
            }
            self.current_scope().locals.pop();
        }
    }

    fn add_local(&mut self, name: &'src str) {
        if self.current_scope().locals.len() >= MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.current_scope().locals.push(LocalVar {
            name,
            depth: -1,
            is_captured: false,
        });
    }

    fn declare_variable(&mut self) {
        if self.current_scope().scope_depth == 0 {
            return;
        }
        let name = self.previous.lexeme;
        let depth = self.current_scope().scope_depth;
        for local in self.current_scope().locals.iter().rev() {
            if local.depth != -1 && local.depth < depth {
                break;
            }
            if local.name == name {
                self.error("Already a variable with this name in this scope.");
                return;
            }
        }
        self.add_local(name);
    }

    fn mark_initialized(&mut self) {
        if self.current_scope().scope_depth == 0 {
            return;
        }
        let depth = self.current_scope().scope_depth;
        self.current_scope().locals.last_mut().unwrap().depth = depth;
    }

    fn parse_variable(&mut self, message: &str) -> u8 {
        self.consume(TokenKind::Identifier, message);
        self.declare_variable();
        if self.current_scope().scope_depth > 0 {
            return 0;
        }
        let name = self.previous.lexeme;
        self.identifier_constant(name)
    }

    fn define_variable(&mut self, global: u8) {
        if self.current_scope().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_bytes(OpCode::DefineGlobal, global);
    }

    fn resolve_local(&mut self, scope_idx: usize, name: &str) -> Option<u8> {
        let locals = &self.scopes[scope_idx].locals;
        for (i, local) in locals.iter().enumerate().rev() {
            if local.name == name {
                if local.depth == -1 {
                    self.error("Can't read local variable in its own initializer.");
                }
                return Some(i as u8);
            }
        }
        None
    }

    fn add_upvalue(&mut self, scope_idx: usize, index: u8, is_local: bool) -> u8 {
        let upvalues = &mut self.scopes[scope_idx].upvalues;
        for (i, uv) in upvalues.iter().enumerate() {
            if uv.index == index && uv.is_local == is_local {
                return i as u8;
            }
        }
        if upvalues.len() >= MAX_UPVALUES {
            self.error("Too many closure variables in function.");
            return 0;
        }
        upvalues.push(UpvalueSlot { index, is_local });
        self.scopes[scope_idx].function.as_function_mut().upvalue_count = upvalues.len();
        (upvalues.len() - 1) as u8
    }

    fn resolve_upvalue(&mut self, scope_idx: usize, name: &str) -> Option<u8> {
        if scope_idx == 0 {
            return None;
        }
        let enclosing = scope_idx - 1;
        if let Some(local) = self.resolve_local(enclosing, name) {
            self.scopes[enclosing].locals[local as usize].is_captured = true;
            return Some(self.add_upvalue(scope_idx, local, true));
        }
        if let Some(upvalue) = self.resolve_upvalue(enclosing, name) {
            return Some(self.add_upvalue(scope_idx, upvalue, false));
        }
        None
    }

    // --- declarations & statements ---

    fn declaration(&mut self) {
        if self.match_token(TokenKind::Class) {
            self.class_declaration();
        } else if self.match_token(TokenKind::Fun) {
            self.fun_declaration();
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn class_declaration(&mut self) {
        self.consume(TokenKind::Identifier, "Expect class name.");
        let class_name = self.previous.lexeme;
        let name_constant = self.identifier_constant(class_name);
        self.declare_variable();
        self.emit_bytes(OpCode::Class, name_constant);
        self.define_variable(name_constant);

        self.classes.push(ClassScope {
            has_superclass: false,
        });

        if self.match_token(TokenKind::Less) {
            self.consume(TokenKind::Identifier, "Expect superclass name.");
            self.variable(false);
            if self.previous.lexeme == class_name {
                self.error("A class can't inherit from itself.");
            }

            self.begin_scope();
            self.add_local("super");
            self.define_variable(0);

            self.named_variable_by_name(class_name, false);
            self.emit_op(OpCode::Inherit);
            self.classes.last_mut().unwrap().has_superclass = true;
        }

        self.named_variable_by_name(class_name, false);
        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.");
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.method();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after class body.");
        self.emit_op(OpCode::Pop);

        let class_scope = self.classes.pop().unwrap();
        if class_scope.has_superclass {
            self.end_scope();
        }
    }

    fn method(&mut self) {
        self.consume(TokenKind::Identifier, "Expect method name.");
        let name = self.previous.lexeme;
        let constant = self.identifier_constant(name);
        let fn_type = if name == "init" {
            FunctionType::Initializer
        } else {
            FunctionType::Method
        };
        self.function(fn_type);
        self.emit_bytes(OpCode::Method, constant);
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expect function name.");
        self.mark_initialized();
        self.function(FunctionType::Function);
        self.define_variable(global);
    }

    fn function(&mut self, fn_type: FunctionType) {
        let name = self.previous.lexeme;
        let function = self.heap.alloc_function();
        let interned_name = self.heap.intern_str(name);
        function.as_function_mut().name = Some(interned_name);
        self.scopes.push(FunctionScope::new(function, fn_type));

        self.begin_scope();
        self.consume(TokenKind::LeftParen, "Expect '(' after function name.");
        let mut arity: u32 = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                arity += 1;
                if arity > 255 {
                    self.error_at_current("Can't have more than 255 parameters.");
                }
                let constant = self.parse_variable("Expect parameter name.");
                self.define_variable(constant);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.current_scope().function.as_function_mut().arity = arity.min(255) as u8;
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.");
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.");
        self.block();

        let scope_idx = self.scopes.len() - 1;
        let upvalues: Vec<UpvalueSlot> = std::mem::take(&mut self.scopes[scope_idx].upvalues);
        let compiled = self.end_compiler();

        let constant = self.make_constant(Value::Obj(compiled));
        self.emit_bytes(OpCode::Closure, constant);
        for uv in &upvalues {
            self.emit_byte(uv.is_local as u8);
            self.emit_byte(uv.index);
        }
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");
        if self.match_token(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.");
        self.define_variable(global);
    }

    fn statement(&mut self) {
        if self.match_token(TokenKind::Print) {
            self.print_statement();
        } else if self.match_token(TokenKind::For) {
            self.for_statement();
        } else if self.match_token(TokenKind::If) {
            self.if_statement();
        } else if self.match_token(TokenKind::Return) {
            self.return_statement();
        } else if self.match_token(TokenKind::While) {
            self.while_statement();
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
        self.emit_op(OpCode::Print);
    }

    fn return_statement(&mut self) {
        if self.current_scope().fn_type == FunctionType::Script {
            self.error("Can't return from top-level code.");
        }
        if self.match_token(TokenKind::Semicolon) {
            self.emit_return();
        } else {
            if self.current_scope().fn_type == FunctionType::Initializer {
                self.error("Can't return a value from an initializer.");
            }
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.");
            self.emit_op(OpCode::Return);
        }
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();

        let else_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);

        if self.match_token(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.current_chunk().len();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(OpCode::Pop);
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

        let mut loop_start = self.current_chunk().len();
        let mut exit_jump: Option<usize> = None;
        if !self.match_token(TokenKind::Semicolon) {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.");
            exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
            self.emit_op(OpCode::Pop);
        }

        if !self.match_token(TokenKind::RightParen) {
            let body_jump = self.emit_jump(OpCode::Jump);
            let increment_start = self.current_chunk().len();
            self.expression();
            self.emit_op(OpCode::Pop);
            self.consume(TokenKind::RightParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit_op(OpCode::Pop);
        }

        self.end_scope();
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    // --- expressions ---

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let prefix = parse_rule(self.previous.kind).prefix;
        let Some(prefix) = prefix else {
            self.error("Expect expression.");
            return;
        };
        let can_assign = precedence <= Precedence::Assignment;
        self.apply_rule(prefix, can_assign);

        while precedence <= parse_rule(self.current.kind).precedence {
            self.advance();
            let infix = parse_rule(self.previous.kind).infix;
            if let Some(infix) = infix {
                self.apply_rule(infix, can_assign);
            }
        }

        if can_assign && self.match_token(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn apply_rule(&mut self, rule: Rule, can_assign: bool) {
        match rule {
            Rule::Grouping => self.grouping(),
            Rule::Unary => self.unary(),
            Rule::Binary => self.binary(),
            Rule::Number => self.number(),
            Rule::StringLit => self.string_lit(),
            Rule::Literal => self.literal(),
            Rule::Variable => self.variable(can_assign),
            Rule::And => self.and(),
            Rule::Or => self.or(),
            Rule::Call => self.call(),
            Rule::Dot => self.dot(can_assign),
            Rule::This => self.this(),
            Rule::Super => self.super_(),
        }
    }

    fn grouping(&mut self) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn number(&mut self) {
        let value: f64 = self.previous.lexeme.parse().expect("scanner guarantees valid number");
        self.emit_constant(Value::Number(value));
    }

    fn string_lit(&mut self) {
        let lexeme = self.previous.lexeme;
        let contents = &lexeme[1..lexeme.len() - 1];
        let interned = self.heap.intern_str(contents);
        self.emit_constant(Value::Obj(interned));
    }

    fn literal(&mut self) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            TokenKind::True => self.emit_op(OpCode::True),
            _ => unreachable!("literal() called for non-literal token"),
        }
    }

    fn unary(&mut self) {
        let op_kind = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match op_kind {
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            TokenKind::Bang => self.emit_op(OpCode::Not),
            _ => unreachable!("unary() called for non-unary token"),
        }
    }

    fn binary(&mut self) {
        let op_kind = self.previous.kind;
        let rule = parse_rule(op_kind);
        self.parse_precedence(rule.precedence.next());
        match op_kind {
            TokenKind::BangEqual => self.emit_op(OpCode::NotEqual),
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal),
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::GreaterEqual => {
                self.emit_op(OpCode::Less);
                self.emit_op(OpCode::Not);
            }
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::LessEqual => {
                self.emit_op(OpCode::Greater);
                self.emit_op(OpCode::Not);
            }
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            _ => unreachable!("binary() called for non-binary token"),
        }
    }

    fn and(&mut self) {
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or(&mut self) {
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(else_jump);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn call(&mut self) {
        let argc = self.argument_list();
        self.emit_bytes(OpCode::Call, argc);
    }

    fn argument_list(&mut self) -> u8 {
        let mut argc: u16 = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression();
                if argc == 255 {
                    self.error("Can't have more than 255 arguments.");
                }
                argc += 1;
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after arguments.");
        argc as u8
    }

    fn dot(&mut self, can_assign: bool) {
        self.consume(TokenKind::Identifier, "Expect property name after '.'.");
        let name = self.previous.lexeme;
        let name_constant = self.identifier_constant(name);

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_bytes(OpCode::SetProperty, name_constant);
        } else if self.match_token(TokenKind::LeftParen) {
            let argc = self.argument_list();
            self.emit_bytes(OpCode::Invoke, name_constant);
            self.emit_byte(argc);
        } else {
            self.emit_bytes(OpCode::GetProperty, name_constant);
        }
    }

    fn this(&mut self) {
        if self.classes.is_empty() {
            self.error("Can't use 'this' outside of a class.");
            return;
        }
        self.variable(false);
    }

    fn super_(&mut self) {
        if self.classes.is_empty() {
            self.error("Can't use 'super' outside of a class.");
        } else if !self.classes.last().unwrap().has_superclass {
            self.error("Can't use 'super' in a class with no superclass.");
        }

        self.consume(TokenKind::Dot, "Expect '.' after 'super'.");
        self.consume(TokenKind::Identifier, "Expect superclass method name.");
        let method = self.previous.lexeme;
        let name_constant = self.identifier_constant(method);

        self.named_variable_by_name("this", false);
        if self.match_token(TokenKind::LeftParen) {
            let argc = self.argument_list();
            self.named_variable_by_name("super", false);
            self.emit_bytes(OpCode::SuperInvoke, name_constant);
            self.emit_byte(argc);
        } else {
            self.named_variable_by_name("super", false);
            self.emit_bytes(OpCode::GetSuper, name_constant);
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous.lexeme;
        self.named_variable_by_name(name, can_assign);
    }

    fn named_variable_by_name(&mut self, name: &'src str, can_assign: bool) {
        let scope_idx = self.scopes.len() - 1;
        let (get_op, set_op, arg) = if let Some(slot) = self.resolve_local(scope_idx, name) {
            (OpCode::GetLocal, OpCode::SetLocal, slot)
        } else if let Some(slot) = self.resolve_upvalue(scope_idx, name) {
            (OpCode::GetUpvalue, OpCode::SetUpvalue, slot)
        } else {
            let constant = self.identifier_constant(name);
            (OpCode::GetGlobal, OpCode::SetGlobal, constant)
        };

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_bytes(set_op, arg);
        } else {
            self.emit_bytes(get_op, arg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_ok(source: &str) -> ObjRef {
        let mut heap = Heap::new();
        compile(source, &mut heap).unwrap_or_else(|e| panic!("expected success, got: {e}"))
    }

    fn compile_err(source: &str) -> CompileError {
        let mut heap = Heap::new();
        compile(source, &mut heap).expect_err("expected a compile error")
    }

    #[test]
    fn compiles_a_trivial_script() {
        let script = compile_ok("print 1 + 2;");
        assert!(!script.as_function().chunk.is_empty());
    }

    #[test]
    fn block_scoped_locals_do_not_leak() {
        // The outer `a` is a global; the inner `a` is a local that pops
        // off at the closing brace, so a second block can redeclare it.
        compile_ok("var a = 1; { var a = 2; print a; } { var a = 3; print a; }");
    }

    #[test]
    fn shadowing_a_local_in_the_same_scope_is_an_error() {
        let err = compile_err("{ var a = 1; var a = 2; }");
        assert!(format!("{err}").contains("Already a variable with this name"));
    }

    #[test]
    fn closures_resolve_enclosing_locals_as_upvalues() {
        let script = compile_ok(
            "fun makeCounter() { var n = 0; fun inc() { n = n + 1; return n; } return inc; }",
        );
        assert!(!script.as_function().chunk.is_empty());
    }

    #[test]
    fn invalid_assignment_target_is_reported() {
        let err = compile_err("\"x\" = 1;");
        assert!(format!("{err}").contains("Invalid assignment target"));
    }

    #[test]
    fn panic_mode_recovers_at_the_next_statement() {
        // Two independent malformed statements should each produce
        // exactly one diagnostic, not a cascade of follow-on errors.
        let err = compile_err("var ; var ;");
        assert_eq!(err.diagnostics.len(), 2);
    }

    #[test]
    fn returning_a_value_from_script_top_level_is_an_error() {
        let err = compile_err("return 1;");
        assert!(format!("{err}").contains("Can't return from top-level code"));
    }

    #[test]
    fn this_outside_a_class_is_an_error() {
        let err = compile_err("fun f() { print this; }");
        assert!(format!("{err}").contains("Can't use 'this' outside of a class"));
    }
}
