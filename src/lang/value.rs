use std::cell::RefCell;
use std::fs::File;
use std::rc::Rc;

/// Shared handle to a host file. Cloning shares the handle; `close`
/// drops the underlying file for every holder.
#[derive(Clone)]
pub struct FileRef(Rc<RefCell<Option<File>>>);

impl FileRef {
    pub fn new(file: File) -> Self {
        FileRef(Rc::new(RefCell::new(Some(file))))
    }

    pub fn borrow_mut(&self) -> std::cell::RefMut<'_, Option<File>> {
        self.0.borrow_mut()
    }

    pub fn close(&self) {
        *self.0.borrow_mut() = None;
    }

    pub fn is_open(&self) -> bool {
        self.0.borrow().is_some()
    }
}

impl PartialEq for FileRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for FileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_open() {
            f.write_str("<file>")
        } else {
            f.write_str("<file closed>")
        }
    }
}

/// Runtime value.
///
/// `Object` carries a handle into the VM's object registry; its refcount
/// lives with the registered object, not with the handle. The remaining
/// reference-typed variants (`Str`, `List`, `File`) express their
/// retain/release lifecycle through ordinary ownership.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    List(Vec<Value>),
    File(FileRef),
    Object(usize),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::File(_) => "file",
            Value::Object(_) => "object",
        }
    }

    /// Numeric coercion used by the math natives: ints widen to floats,
    /// anything else is rejected.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::File(file) => write!(f, "{:?}", file),
            Value::Object(handle) => write!(f, "<object #{}>", handle),
        }
    }
}
