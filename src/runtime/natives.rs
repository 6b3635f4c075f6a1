//! Built-in native library.
//!
//! These are the host functions the core expects to be resolvable. Each
//! has the bridge signature `fn(&[Value]) -> Value` and signals failure
//! by returning `Value::Null`; errors never cross the bridge.

use std::io::{Read, Seek, SeekFrom, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::lang::value::{FileRef, Value};
use crate::runtime::vm::Vm;

/// Names installed by [`install`]. The semantic analyzer pre-seeds its
/// global scope from this list.
pub const NATIVE_NAMES: &[&str] = &[
    "print",
    "split",
    "join",
    "substring",
    "replace",
    "to_upper",
    "to_lower",
    "len",
    "append",
    "pop",
    "insert",
    "remove",
    "sqrt",
    "pow",
    "sin",
    "cos",
    "tan",
    "log",
    "abs",
    "int",
    "float",
    "str",
    "bool",
    "open",
    "read",
    "write",
    "close",
    "exit",
    "time",
    "type",
    "range",
    "enumerate",
];

/// Register the whole library on a VM.
pub fn install(vm: &mut Vm) {
    vm.register_native("print", native_print);
    vm.register_native("split", native_split);
    vm.register_native("join", native_join);
    vm.register_native("substring", native_substring);
    vm.register_native("replace", native_replace);
    vm.register_native("to_upper", native_to_upper);
    vm.register_native("to_lower", native_to_lower);
    vm.register_native("len", native_len);
    vm.register_native("append", native_append);
    vm.register_native("pop", native_pop);
    vm.register_native("insert", native_insert);
    vm.register_native("remove", native_remove);
    vm.register_native("sqrt", native_sqrt);
    vm.register_native("pow", native_pow);
    vm.register_native("sin", native_sin);
    vm.register_native("cos", native_cos);
    vm.register_native("tan", native_tan);
    vm.register_native("log", native_log);
    vm.register_native("abs", native_abs);
    vm.register_native("int", native_int);
    vm.register_native("float", native_float);
    vm.register_native("str", native_str);
    vm.register_native("bool", native_bool);
    vm.register_native("open", native_open);
    vm.register_native("read", native_read);
    vm.register_native("write", native_write);
    vm.register_native("close", native_close);
    vm.register_native("exit", native_exit);
    vm.register_native("time", native_time);
    vm.register_native("type", native_type);
    vm.register_native("range", native_range);
    vm.register_native("enumerate", native_enumerate);
}

// ---------------------------------------------------------------------
// I/O
// ---------------------------------------------------------------------

/// Print all arguments space-separated, then a newline.
fn native_print(args: &[Value]) -> Value {
    let line: Vec<String> = args.iter().map(|v| v.to_string()).collect();
    println!("{}", line.join(" "));
    Value::Null
}

// ---------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------

fn native_split(args: &[Value]) -> Value {
    let (s, delim) = match (args.first(), args.get(1)) {
        (Some(Value::Str(s)), Some(Value::Str(d))) => (s, d),
        _ => return Value::Null,
    };
    if delim.is_empty() {
        return Value::List(vec![Value::Str(s.clone())]);
    }
    let parts = s
        .split(delim.as_str())
        .filter(|part| !part.is_empty())
        .map(|part| Value::Str(part.to_string()))
        .collect();
    Value::List(parts)
}

fn native_join(args: &[Value]) -> Value {
    let (items, delim) = match (args.first(), args.get(1)) {
        (Some(Value::List(items)), Some(Value::Str(d))) => (items, d),
        _ => return Value::Null,
    };
    let joined: Vec<String> = items.iter().map(|v| v.to_string()).collect();
    Value::Str(joined.join(delim))
}

/// `substring(str, start, length)` with clamping at both ends.
fn native_substring(args: &[Value]) -> Value {
    let (s, start, length) = match (args.first(), args.get(1), args.get(2)) {
        (Some(Value::Str(s)), Some(Value::Int(start)), Some(Value::Int(length))) => {
            (s, *start, *length)
        }
        _ => return Value::Null,
    };
    let bytes = s.as_bytes();
    let start = start.max(0) as usize;
    if start >= bytes.len() {
        return Value::Str(String::new());
    }
    let length = length.max(0) as usize;
    let end = (start + length).min(bytes.len());
    Value::Str(String::from_utf8_lossy(&bytes[start..end]).into_owned())
}

fn native_replace(args: &[Value]) -> Value {
    match (args.first(), args.get(1), args.get(2)) {
        (Some(Value::Str(s)), Some(Value::Str(target)), Some(Value::Str(repl))) => {
            if target.is_empty() {
                return Value::Str(s.clone());
            }
            Value::Str(s.replace(target.as_str(), repl))
        }
        _ => Value::Null,
    }
}

fn native_to_upper(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Str(s)) => Value::Str(s.to_ascii_uppercase()),
        _ => Value::Null,
    }
}

fn native_to_lower(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Str(s)) => Value::Str(s.to_ascii_lowercase()),
        _ => Value::Null,
    }
}

// ---------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------

fn native_len(args: &[Value]) -> Value {
    let length = match args.first() {
        Some(Value::Str(s)) => s.len() as i64,
        Some(Value::List(items)) => items.len() as i64,
        _ => 0,
    };
    Value::Int(length)
}

/// `append(list, item)` returns the extended list.
fn native_append(args: &[Value]) -> Value {
    match (args.first(), args.get(1)) {
        (Some(Value::List(items)), Some(item)) => {
            let mut items = items.clone();
            items.push(item.clone());
            Value::List(items)
        }
        _ => Value::Null,
    }
}

/// `pop(list)` returns the last item, not the shortened list.
fn native_pop(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::List(items)) => items.last().cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// `insert(list, index, value)` returns the modified list; the index is
/// clamped into range.
fn native_insert(args: &[Value]) -> Value {
    match (args.first(), args.get(1), args.get(2)) {
        (Some(Value::List(items)), Some(Value::Int(index)), Some(value)) => {
            let mut items = items.clone();
            let index = (*index).clamp(0, items.len() as i64) as usize;
            items.insert(index, value.clone());
            Value::List(items)
        }
        _ => Value::Null,
    }
}

/// `remove(list, value)` removes the first int or string match.
fn native_remove(args: &[Value]) -> Value {
    match (args.first(), args.get(1)) {
        (Some(Value::List(items)), Some(needle)) => {
            let mut items = items.clone();
            let position = items.iter().position(|item| match (item, needle) {
                (Value::Int(a), Value::Int(b)) => a == b,
                (Value::Str(a), Value::Str(b)) => a == b,
                _ => false,
            });
            if let Some(position) = position {
                items.remove(position);
            }
            Value::List(items)
        }
        _ => Value::Null,
    }
}

// ---------------------------------------------------------------------
// Math
// ---------------------------------------------------------------------

fn native_sqrt(args: &[Value]) -> Value {
    match args.first().and_then(|v| v.as_number()) {
        Some(n) => Value::Float(n.sqrt()),
        None => Value::Null,
    }
}

fn native_pow(args: &[Value]) -> Value {
    let (base, exp) = match (
        args.first().and_then(|v| v.as_number()),
        args.get(1).and_then(|v| v.as_number()),
    ) {
        (Some(base), Some(exp)) => (base, exp),
        _ => return Value::Null,
    };
    Value::Float(base.powf(exp))
}

fn native_sin(args: &[Value]) -> Value {
    match args.first().and_then(|v| v.as_number()) {
        Some(n) => Value::Float(n.sin()),
        None => Value::Null,
    }
}

fn native_cos(args: &[Value]) -> Value {
    match args.first().and_then(|v| v.as_number()) {
        Some(n) => Value::Float(n.cos()),
        None => Value::Null,
    }
}

fn native_tan(args: &[Value]) -> Value {
    match args.first().and_then(|v| v.as_number()) {
        Some(n) => Value::Float(n.tan()),
        None => Value::Null,
    }
}

fn native_log(args: &[Value]) -> Value {
    match args.first().and_then(|v| v.as_number()) {
        Some(n) => Value::Float(n.ln()),
        None => Value::Null,
    }
}

fn native_abs(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Int(n)) => Value::Int(n.wrapping_abs()),
        Some(Value::Float(n)) => Value::Float(n.abs()),
        _ => Value::Null,
    }
}

// ---------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------

/// Leading-integer parse: sign plus digits, anything else stops the scan.
fn parse_int_prefix(s: &str) -> i64 {
    let s = s.trim_start();
    let mut end = 0;
    for (i, c) in s.char_indices() {
        if c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+')) {
            end = i + c.len_utf8();
        } else {
            break;
        }
    }
    s[..end].parse().unwrap_or(0)
}

fn native_int(args: &[Value]) -> Value {
    let value = match args.first() {
        Some(Value::Int(n)) => *n,
        Some(Value::Float(n)) => *n as i64,
        Some(Value::Bool(b)) => i64::from(*b),
        Some(Value::Str(s)) => parse_int_prefix(s),
        _ => 0,
    };
    Value::Int(value)
}

fn native_float(args: &[Value]) -> Value {
    let value = match args.first() {
        Some(Value::Int(n)) => *n as f64,
        Some(Value::Float(n)) => *n,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Str(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    Value::Float(value)
}

/// Stringify and concatenate every argument. With one argument this is a
/// plain coercion; interpolation lowers onto the multi-argument form.
fn native_str(args: &[Value]) -> Value {
    let mut out = String::new();
    for arg in args {
        out.push_str(&arg.to_string());
    }
    Value::Str(out)
}

fn native_bool(args: &[Value]) -> Value {
    let value = match args.first() {
        Some(Value::Int(n)) => *n != 0,
        Some(Value::Float(n)) => *n != 0.0,
        Some(Value::Bool(b)) => *b,
        Some(Value::Str(s)) => !s.is_empty(),
        Some(Value::Null) | None => false,
        _ => true,
    };
    Value::Bool(value)
}

// ---------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------

fn native_open(args: &[Value]) -> Value {
    let (path, mode) = match (args.first(), args.get(1)) {
        (Some(Value::Str(path)), Some(Value::Str(mode))) => (path, mode.as_str()),
        _ => return Value::Null,
    };
    let file = match mode.chars().next() {
        Some('r') => std::fs::File::open(path),
        Some('w') => std::fs::File::create(path),
        Some('a') => std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path),
        _ => return Value::Null,
    };
    match file {
        Ok(file) => Value::File(FileRef::new(file)),
        Err(_) => Value::Null,
    }
}

/// Read the whole file from the start.
fn native_read(args: &[Value]) -> Value {
    let file_ref = match args.first() {
        Some(Value::File(file_ref)) => file_ref,
        _ => return Value::Null,
    };
    let mut guard = file_ref.borrow_mut();
    let file = match guard.as_mut() {
        Some(file) => file,
        None => return Value::Null,
    };
    if file.seek(SeekFrom::Start(0)).is_err() {
        return Value::Null;
    }
    let mut contents = String::new();
    match file.read_to_string(&mut contents) {
        Ok(_) => Value::Str(contents),
        Err(_) => Value::Null,
    }
}

/// Write a string, returning the number of bytes written.
fn native_write(args: &[Value]) -> Value {
    let (file_ref, text) = match (args.first(), args.get(1)) {
        (Some(Value::File(file_ref)), Some(Value::Str(text))) => (file_ref, text),
        _ => return Value::Null,
    };
    let mut guard = file_ref.borrow_mut();
    let file = match guard.as_mut() {
        Some(file) => file,
        None => return Value::Null,
    };
    match file.write_all(text.as_bytes()) {
        Ok(()) => Value::Int(text.len() as i64),
        Err(_) => Value::Null,
    }
}

fn native_close(args: &[Value]) -> Value {
    if let Some(Value::File(file_ref)) = args.first() {
        file_ref.close();
    }
    Value::Null
}

// ---------------------------------------------------------------------
// System
// ---------------------------------------------------------------------

fn native_exit(args: &[Value]) -> Value {
    let code = match args.first() {
        Some(Value::Int(n)) => *n as i32,
        _ => 0,
    };
    std::process::exit(code);
}

fn native_time(_args: &[Value]) -> Value {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Value::Float(seconds)
}

fn native_type(args: &[Value]) -> Value {
    let name = match args.first() {
        Some(value) => value.type_name(),
        None => "null",
    };
    Value::Str(name.to_string())
}

/// `range(start, end, step)` — arguments optional from the right; a zero
/// step is treated as one.
fn native_range(args: &[Value]) -> Value {
    let start = args.first().and_then(|v| v.as_int()).unwrap_or(0);
    let end = args.get(1).and_then(|v| v.as_int()).unwrap_or(0);
    let mut step = args.get(2).and_then(|v| v.as_int()).unwrap_or(1);
    if step == 0 {
        step = 1;
    }
    let mut items = Vec::new();
    let mut i = start;
    while if step > 0 { i < end } else { i > end } {
        items.push(Value::Int(i));
        i += step;
    }
    Value::List(items)
}

/// `enumerate(list)` — `[[0, item0], [1, item1], …]`.
fn native_enumerate(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::List(items)) => Value::List(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| Value::List(vec![Value::Int(i as i64), item.clone()]))
                .collect(),
        ),
        _ => Value::Null,
    }
}
