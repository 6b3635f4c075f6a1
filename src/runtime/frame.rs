use crate::lang::value::Value;

/// Locals allocated per activation.
pub const FRAME_LOCALS: usize = 8;

/// Per-call activation record.
///
/// `parent` is the call-stack index of the enclosing activation (or
/// `None` for the outermost call), supporting lexical-style walks without
/// pointer cycles. Created at call entry, dropped at return.
#[derive(Debug)]
pub struct Frame {
    pub locals: Vec<Value>,
    pub parent: Option<usize>,
}

impl Frame {
    pub fn new(local_count: usize, parent: Option<usize>) -> Self {
        Frame {
            locals: vec![Value::Null; local_count],
            parent,
        }
    }
}
