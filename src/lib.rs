//! A compact interpreter for a Tcl-like command language.
//!
//! The language is deliberately tiny: a script is a sequence of commands
//! separated by newlines or semicolons, each command is a sequence of words,
//! and the first word names a handler registered with the interpreter.
//! Words are assembled from tokens with two substitution rules along the
//! way: `$name` splices in the value of a variable, and `[script]` splices
//! in the result of evaluating a nested script. Braces quote verbatim,
//! double quotes allow embedded whitespace while keeping substitution
//! active.
//!
//! # Everything is a byte string
//!
//! There is exactly one data type. Variables, command arguments, results,
//! and the program source itself are all flat byte strings, and the
//! arithmetic commands work by parsing and re-formatting decimal text. That
//! costs performance, but it keeps the machinery small enough to read in
//! one sitting, which is the point.
//!
//! Values are held as `Box<[u8]>` (aliased [`OwnedValue`]): immutable once
//! built, one machine word smaller than a `Vec<u8>`, cloned by copying.
//! Classification of bytes is ASCII-only; the interpreter neither knows nor
//! cares about character encodings above 0x7f.
//!
//! # Embedding
//!
//! Construct an interpreter, evaluate source, look at the outcome:
//!
//! ```
//! use petitcl::Interp;
//!
//! let mut interp = Interp::init();
//! let result = interp.eval(b"set x [+ 2 3]").unwrap();
//! assert_eq!(&*result, b"5");
//! ```
//!
//! Evaluation returns `Result<OwnedValue, FlowChange>`: the `Ok` value is
//! the result of the last command the script ran, and every non-normal
//! outcome -- a runtime error or a `return`/`break`/`continue` that nothing
//! intercepted -- travels in the `Err` channel as a [`FlowChange`].
//!
//! Hosts extend the language with [`Interp::register`]. A command is any
//! `Fn(&mut Interp, &mut [OwnedValue]) -> Result<OwnedValue, FlowChange>`
//! closure; whatever state it needs lives in its captures.

#![forbid(unsafe_code)]

use std::mem;
use std::rc::Rc;

use thiserror::Error;
use tracing::trace;

pub mod cmd;
pub mod parse;


use parse::{decode_escapes, Parser, Token};

/// Alias marking a byte slice as interpreter data rather than arbitrary
/// bytes.
pub type Value = [u8];

/// An owned value: a heap-allocated, immutable byte string.
pub type OwnedValue = Box<Value>;

/// Integer type used by the arithmetic and comparison commands.
pub type Int = i64;

/// Convenience function for getting an empty value.
pub fn empty() -> OwnedValue {
    Box::new([])
}

/// Parses the longest decimal-integer prefix of `v`, ignoring leading ASCII
/// whitespace and an optional sign. If no digits are present the result
/// is 0.
pub fn int(v: &Value) -> Int {
    let mut s = v;
    while let Some((&b, rest)) = s.split_first() {
        if b.is_ascii_whitespace() {
            s = rest;
        } else {
            break;
        }
    }
    let negative = match s.split_first() {
        Some((&b'-', rest)) => {
            s = rest;
            true
        }
        Some((&b'+', rest)) => {
            s = rest;
            false
        }
        _ => false,
    };
    let mut n: Int = 0;
    for &b in s {
        if !b.is_ascii_digit() {
            break;
        }
        n = n.wrapping_mul(10).wrapping_add(Int::from(b - b'0'));
    }
    if negative {
        n.wrapping_neg()
    } else {
        n
    }
}

/// Formats an integer as a decimal value string.
pub fn int_value(x: Int) -> OwnedValue {
    x.to_string().into_bytes().into()
}

/// Non-normal outcomes of evaluating a script, carried in the `Err` channel
/// of [`Interp::eval`].
///
/// A successful evaluation produces `Ok` with the result value; everything
/// else is a flow change. Flow-control requests are consumed by the
/// constructs that understand them (`while` eats `Break` and `Continue`, a
/// procedure call converts `Return` into normal completion) and otherwise
/// unwind through nested evaluations unchanged until they reach the host.
#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum FlowChange {
    /// The script failed. The payload is the human-readable message.
    #[error("{}", String::from_utf8_lossy(.0))]
    Error(OwnedValue),
    /// A `return`, carrying its value to the nearest enclosing procedure
    /// call.
    #[error("'return' outside of a procedure")]
    Return(OwnedValue),
    /// A `break`, unwinding to the nearest enclosing loop.
    #[error("'break' outside of a loop")]
    Break,
    /// A `continue`, unwinding to the nearest enclosing loop.
    #[error("'continue' outside of a loop")]
    Continue,
}

impl FlowChange {
    /// Wraps preformatted message text as an error flow change.
    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error(msg.into().into_bytes().into())
    }
}

/// One binding in a call frame.
struct Var {
    name: OwnedValue,
    value: OwnedValue,
    /// Next binding in the same frame, or `None` at the end of the chain.
    next: Option<Box<Var>>,
}

/// A call frame: the variable bindings of one procedure activation, or of
/// the top level.
#[derive(Default)]
struct Frame {
    /// Chain of bindings local to this frame.
    vars: Option<Box<Var>>,
    /// The frame that becomes current again when this one is popped; `None`
    /// in the global frame. Variable lookup never follows this link -- the
    /// language has no lexical nesting across frames.
    parent: Option<Box<Frame>>,
}

/// Type of a boxed command implementation.
type CmdFn = dyn Fn(&mut Interp, &mut [OwnedValue]) -> Result<OwnedValue, FlowChange>;

/// A registered command.
struct Cmd {
    /// Name the command is looked up under.
    name: OwnedValue,
    /// The implementation. Reference-counted so an invocation can keep it
    /// alive without borrowing the interpreter it is about to mutate.
    function: Rc<CmdFn>,
    /// Next command in the registry chain.
    next: Option<Box<Cmd>>,
}

/// Interpreter state.
///
/// An interpreter owns its chain of call frames, its command registry, and
/// nothing else; two interpreters share no state. Create one with
/// [`Interp::init`], then call [`Interp::eval`] as often as required.
/// Dropping it frees every frame, binding, and command.
pub struct Interp {
    /// Nesting depth of in-flight `eval` calls. Purely informational.
    level: usize,
    /// The innermost (current) call frame.
    frame: Box<Frame>,
    /// Registered commands, newest first.
    cmds: Option<Box<Cmd>>,
}

impl Default for Interp {
    fn default() -> Self {
        Self::init()
    }
}

impl Interp {
    /// Creates an interpreter with no commands registered at all.
    ///
    /// Useful for hosts that want to install a replacement for one of the
    /// standard commands before pulling in the rest via
    /// [`cmd::register_all`].
    pub fn empty() -> Self {
        Self {
            level: 0,
            frame: Box::default(),
            cmds: None,
        }
    }

    /// Creates an interpreter with the standard command set pre-registered.
    pub fn init() -> Self {
        let mut interp = Self::empty();
        cmd::register_all(&mut interp);
        interp
    }

    /// Registers `function` as the command `name`.
    ///
    /// Fails with an error flow change if the name is already taken;
    /// commands are never replaced or removed once defined.
    pub fn register(
        &mut self,
        name: &Value,
        function: impl Fn(&mut Interp, &mut [OwnedValue]) -> Result<OwnedValue, FlowChange> + 'static,
    ) -> Result<(), FlowChange> {
        if self.find_cmd(name).is_some() {
            return Err(FlowChange::error(format!(
                "Command '{}' already defined",
                String::from_utf8_lossy(name)
            )));
        }
        let next = self.cmds.take();
        self.cmds = Some(Box::new(Cmd {
            name: name.into(),
            function: Rc::new(function),
            next,
        }));
        Ok(())
    }

    /// Checks whether `name` is registered, without invoking anything.
    pub fn is_registered(&self, name: &Value) -> bool {
        self.find_cmd(name).is_some()
    }

    fn find_cmd(&self, name: &Value) -> Option<&Cmd> {
        let mut cmd = self.cmds.as_deref();
        while let Some(c) = cmd {
            if &*c.name == name {
                return Some(c);
            }
            cmd = c.next.as_deref();
        }
        None
    }

    fn find_var(&mut self, name: &Value) -> Option<&mut Var> {
        let mut var = self.frame.vars.as_deref_mut();
        while let Some(v) = var.take() {
            if &*v.name == name {
                return Some(v);
            }
            var = v.next.as_deref_mut();
        }
        None
    }

    /// Looks up `name` in the current frame and returns a copy of its
    /// value, or `None` if there is no such binding.
    ///
    /// Lookup is confined to the innermost frame: a procedure body cannot
    /// see its caller's variables.
    pub fn get_existing_var(&mut self, name: &Value) -> Option<OwnedValue> {
        Some(self.find_var(name)?.value.clone())
    }

    /// Binds `name` to `value` in the current frame, overwriting any
    /// existing binding of the same name.
    pub fn set_or_create_var(&mut self, name: OwnedValue, value: OwnedValue) {
        if let Some(var) = self.find_var(&name) {
            var.value = value;
            return;
        }
        self.frame.vars = Some(Box::new(Var {
            name,
            value,
            next: self.frame.vars.take(),
        }));
    }

    /// Enters a fresh, empty call frame.
    pub(crate) fn push_frame(&mut self) {
        let parent = mem::take(&mut self.frame);
        self.frame = Box::new(Frame {
            vars: None,
            parent: Some(parent),
        });
    }

    /// Leaves the current call frame, dropping all of its bindings. The
    /// global frame has no parent and stays put.
    pub(crate) fn pop_frame(&mut self) {
        if let Some(parent) = self.frame.parent.take() {
            self.frame = parent;
        }
    }

    /// Evaluates `source` as a script.
    ///
    /// On success the result is the value of the last command the script
    /// executed, or the empty value if it executed none. Any other outcome
    /// aborts the script at the failing command and is returned as a
    /// [`FlowChange`].
    pub fn eval(&mut self, source: &Value) -> Result<OwnedValue, FlowChange> {
        self.level += 1;
        trace!(level = self.level, len = source.len(), "eval");
        let outcome = self.eval_script(source);
        self.level -= 1;
        outcome
    }

    fn eval_script(&mut self, source: &Value) -> Result<OwnedValue, FlowChange> {
        let mut p = Parser::new(source);
        let mut argv: Vec<OwnedValue> = Vec::new();
        let mut result = empty();
        let mut prev = Token::Eol;

        loop {
            let (tok, text) = p.next_token();
            match tok {
                Token::Eof => break,
                Token::Sep => {}
                Token::Eol => {
                    if !argv.is_empty() {
                        result = self.invoke(&mut argv)?;
                        argv.clear();
                    }
                }
                _ => {
                    let word: OwnedValue = match tok {
                        Token::Var => match self.get_existing_var(text) {
                            Some(v) => v,
                            None => {
                                return Err(FlowChange::error(format!(
                                    "No such variable '{}'",
                                    String::from_utf8_lossy(text)
                                )))
                            }
                        },
                        Token::Cmd => self.eval(text)?,
                        Token::Esc => {
                            let mut buf = text.to_vec();
                            decode_escapes(&mut buf);
                            buf.into()
                        }
                        _ => text.into(),
                    };

                    // A word boundary starts a new argument; any other
                    // neighbor pastes onto the previous word.
                    if matches!(prev, Token::Sep | Token::Eol) || argv.is_empty() {
                        argv.push(word);
                    } else {
                        let last = argv.len() - 1;
                        let mut joined = mem::take(&mut argv[last]).into_vec();
                        joined.extend_from_slice(&word);
                        argv[last] = joined.into();
                    }
                }
            }
            prev = tok;
        }
        Ok(result)
    }

    /// Resolves `argv[0]` in the registry and invokes it with the assembled
    /// argument words.
    fn invoke(&mut self, argv: &mut Vec<OwnedValue>) -> Result<OwnedValue, FlowChange> {
        let function = match self.find_cmd(&argv[0]) {
            Some(c) => Rc::clone(&c.function),
            None => {
                return Err(FlowChange::error(format!(
                    "No such command '{}'",
                    String::from_utf8_lossy(&argv[0])
                )))
            }
        };
        trace!(
            command = %String::from_utf8_lossy(&argv[0]),
            argc = argv.len(),
            "invoke"
        );
        function(self, argv.as_mut_slice())
    }
}
