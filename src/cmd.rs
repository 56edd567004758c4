//! The standard command set.
//!
//! Every command validates its own word count and reports a mismatch
//! through the common arity error. Control-flow commands (`if`, `while`,
//! procedure bodies) re-enter the evaluator on their script arguments, so
//! anything expressible at the top level is expressible inside them.

use std::mem;

use super::*;

fn arity_err(name: &Value) -> FlowChange {
    FlowChange::error(format!(
        "Wrong number of args for {}",
        String::from_utf8_lossy(name)
    ))
}

/// Implementation of the `set` standard command.
pub fn cmd_set(interp: &mut Interp, args: &mut [OwnedValue]) -> Result<OwnedValue, FlowChange> {
    if args.len() != 3 {
        return Err(arity_err(&args[0]));
    }
    let name = mem::take(&mut args[1]);
    let value = mem::take(&mut args[2]);
    interp.set_or_create_var(name, value.clone());
    Ok(value)
}

/// Implementation of the `puts` standard command.
pub fn cmd_puts(_interp: &mut Interp, args: &mut [OwnedValue]) -> Result<OwnedValue, FlowChange> {
    if args.len() != 2 {
        return Err(arity_err(&args[0]));
    }
    println!("{}", String::from_utf8_lossy(&args[1]));
    Ok(empty())
}

/// Implementation of the arithmetic and comparison commands. The operation
/// is selected by the name the command was invoked under; comparisons
/// produce `0` or `1`.
pub fn cmd_math(_interp: &mut Interp, args: &mut [OwnedValue]) -> Result<OwnedValue, FlowChange> {
    if args.len() != 3 {
        return Err(arity_err(&args[0]));
    }
    let a = int(&args[1]);
    let b = int(&args[2]);

    let c = match &*args[0] {
        b"+" => a.wrapping_add(b),
        b"-" => a.wrapping_sub(b),
        b"*" => a.wrapping_mul(b),
        b"/" => a.checked_div(b).unwrap_or(0),
        b">" => Int::from(a > b),
        b">=" => Int::from(a >= b),
        b"<" => Int::from(a < b),
        b"<=" => Int::from(a <= b),
        b"==" => Int::from(a == b),
        b"!=" => Int::from(a != b),
        other => {
            return Err(FlowChange::error(format!(
                "No such command '{}'",
                String::from_utf8_lossy(other)
            )))
        }
    };

    Ok(int_value(c))
}

/// Implementation of the `if` standard command.
///
/// `if {condition} {then}`
/// `if {condition} {then} {else}`
/// `if {condition} {then} else {else}`
///
/// The else-branch is the final word; in the five-word form the keyword
/// word is not inspected.
pub fn cmd_if(interp: &mut Interp, args: &mut [OwnedValue]) -> Result<OwnedValue, FlowChange> {
    if !(3..=5).contains(&args.len()) {
        return Err(arity_err(&args[0]));
    }
    let cond = interp.eval(&args[1])?;
    if int(&cond) != 0 {
        interp.eval(&args[2])
    } else if args.len() > 3 {
        interp.eval(&args[args.len() - 1])
    } else {
        Ok(empty())
    }
}

/// Implementation of the `while` standard command.
pub fn cmd_while(interp: &mut Interp, args: &mut [OwnedValue]) -> Result<OwnedValue, FlowChange> {
    if args.len() != 3 {
        return Err(arity_err(&args[0]));
    }
    loop {
        let cond = interp.eval(&args[1])?;
        if int(&cond) == 0 {
            return Ok(empty());
        }
        match interp.eval(&args[2]) {
            Ok(_) | Err(FlowChange::Continue) => (),
            Err(FlowChange::Break) => return Ok(empty()),
            Err(other) => return Err(other),
        }
    }
}

/// Implementation of the `break` standard command.
pub fn cmd_break(_interp: &mut Interp, args: &mut [OwnedValue]) -> Result<OwnedValue, FlowChange> {
    if args.len() != 1 {
        return Err(arity_err(&args[0]));
    }
    Err(FlowChange::Break)
}

/// Implementation of the `continue` standard command.
pub fn cmd_continue(
    _interp: &mut Interp,
    args: &mut [OwnedValue],
) -> Result<OwnedValue, FlowChange> {
    if args.len() != 1 {
        return Err(arity_err(&args[0]));
    }
    Err(FlowChange::Continue)
}

/// Implementation of the `return` standard command.
pub fn cmd_return(_interp: &mut Interp, args: &mut [OwnedValue]) -> Result<OwnedValue, FlowChange> {
    if args.len() > 2 {
        return Err(arity_err(&args[0]));
    }
    Err(FlowChange::Return(
        args.get_mut(1).map(mem::take).unwrap_or_default(),
    ))
}

/// Implementation of the `proc` standard command.
///
/// Defines a new command from a name, a formal parameter list, and a body
/// script. The formal list is split on runs of spaces. Each call of the
/// resulting command runs the body in a fresh call frame with the formals
/// bound to the actual arguments; a `return` from the body completes the
/// call normally, while errors, `break`, and `continue` pass through to the
/// caller.
pub fn cmd_proc(interp: &mut Interp, args: &mut [OwnedValue]) -> Result<OwnedValue, FlowChange> {
    if args.len() != 4 {
        return Err(arity_err(&args[0]));
    }
    let body = mem::take(&mut args[3]);
    let formals: Vec<OwnedValue> = args[2]
        .split(|&b| b == b' ')
        .filter(|run| !run.is_empty())
        .map(OwnedValue::from)
        .collect();
    let name = mem::take(&mut args[1]);

    interp.register(&name, move |interp, call_args| {
        interp.push_frame();

        if formals.len() != call_args.len() - 1 {
            interp.pop_frame();
            return Err(FlowChange::error(format!(
                "Proc '{}' called with wrong arg num",
                String::from_utf8_lossy(&call_args[0])
            )));
        }
        for (formal, actual) in formals.iter().zip(&mut call_args[1..]) {
            interp.set_or_create_var(formal.clone(), mem::take(actual));
        }

        let outcome = interp.eval(&body);
        interp.pop_frame();

        match outcome {
            Err(FlowChange::Return(v)) | Ok(v) => Ok(v),
            Err(other) => Err(other),
        }
    })?;
    Ok(empty())
}

/// Type of a command implemented by a plain function pointer.
type StaticCmd = fn(&mut Interp, &mut [OwnedValue]) -> Result<OwnedValue, FlowChange>;

static STANDARD_COMMANDS: &[(&Value, StaticCmd)] = &[
    (b"set", cmd_set),
    (b"puts", cmd_puts),
    (b"if", cmd_if),
    (b"while", cmd_while),
    (b"break", cmd_break),
    (b"continue", cmd_continue),
    (b"return", cmd_return),
    (b"proc", cmd_proc),
    (b"+", cmd_math),
    (b"-", cmd_math),
    (b"*", cmd_math),
    (b"/", cmd_math),
    (b">", cmd_math),
    (b">=", cmd_math),
    (b"<", cmd_math),
    (b"<=", cmd_math),
    (b"==", cmd_math),
    (b"!=", cmd_math),
];

/// Registers the standard command set with `interp`.
///
/// Names that are already taken are left alone, so a host can install its
/// own replacement for a standard command (a redirected `puts`, say) before
/// calling this.
pub fn register_all(interp: &mut Interp) {
    for &(name, function) in STANDARD_COMMANDS {
        interp.register(name, function).ok();
    }
}
