use thiserror::Error;

use crate::frontend::token::SourceLocation;

#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// The fixed function table (64 entries) is full.
    #[error("{location}: function table overflow while adding '{name}'")]
    FunctionTableOverflow {
        name: String,
        location: SourceLocation,
    },

    /// An expression needed more registers than the VM's register file.
    #[error("{location}: expression requires more than 16 registers")]
    RegisterOverflow { location: SourceLocation },

    /// Only identifier callees can be compiled.
    #[error("{location}: unsupported callee kind in function call")]
    UnsupportedCallee { location: SourceLocation },

    /// An operation the instruction set cannot express.
    #[error("{location}: unsupported operation: {what}")]
    UnsupportedOperation {
        what: String,
        location: SourceLocation,
    },

    /// An integer literal outside the 32-bit operand range.
    #[error("{location}: integer literal {value} does not fit in an instruction operand")]
    OperandOverflow {
        value: i64,
        location: SourceLocation,
    },

    /// A `Main` frame was compiled but declared no `main` function.
    #[error("frame 'Main' does not declare a 'main' function")]
    MissingMain,
}

impl CompileError {
    pub fn unsupported(what: impl Into<String>, location: &SourceLocation) -> Self {
        CompileError::UnsupportedOperation {
            what: what.into(),
            location: location.clone(),
        }
    }

    /// Source position, when the error has one.
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            CompileError::FunctionTableOverflow { location, .. }
            | CompileError::RegisterOverflow { location }
            | CompileError::UnsupportedCallee { location }
            | CompileError::UnsupportedOperation { location, .. }
            | CompileError::OperandOverflow { location, .. } => Some(location),
            CompileError::MissingMain => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_location() {
        let err = CompileError::RegisterOverflow {
            location: SourceLocation::new("a.osfl".into(), 4, 9),
        };
        let msg = err.to_string();
        assert!(msg.contains("a.osfl:4:9"));
        assert!(msg.contains("16 registers"));
    }

    #[test]
    fn test_unsupported_helper() {
        let err = CompileError::unsupported("operator '<'", &SourceLocation::unknown());
        assert!(err.to_string().contains("operator '<'"));
    }

    #[test]
    fn test_error_implements_std_error() {
        let err = CompileError::MissingMain;
        let _: &dyn std::error::Error = &err;
        assert!(err.to_string().contains("'main'"));
    }
}
