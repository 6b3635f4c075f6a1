//! Stage sequencing: source text → tokens → AST → semantic checks →
//! bytecode → execution.
//!
//! Each stage reports its own errors and halts the pipeline if any
//! occurred. The last error stays retrievable from the pipeline value
//! until explicitly cleared.

use std::path::{Path, PathBuf};

use log::{error, trace};
use thiserror::Error;

use crate::bytecode::compile::Compiler;
use crate::bytecode::compile_error::CompileError;
use crate::bytecode::disasm;
use crate::frontend::lexer::{Lexer, LexerConfig, LexerError};
use crate::frontend::parser::Parser;
use crate::frontend::parser_error::ParserError;
use crate::frontend::token::SourceLocation;
use crate::runtime::natives;
use crate::runtime::runtime_error::RuntimeError;
use crate::runtime::vm::Vm;
use crate::sema::{SemanticAnalyzer, SemanticError};

/// Toolchain configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub tab_width: usize,
    pub include_comments: bool,
    pub input_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub debug_mode: bool,
    pub optimize: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tab_width: 4,
            include_comments: false,
            input_file: None,
            output_file: None,
            debug_mode: false,
            optimize: true,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Lexer(LexerError),

    /// First parser diagnostic; the rest were already reported.
    #[error("{first} ({count} parse error(s))")]
    Parser { count: usize, first: ParserError },

    #[error("{first} ({count} semantic error(s))")]
    Semantic { count: usize, first: SemanticError },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("{message}")]
    Io { message: String },
}

impl PipelineError {
    /// Source position for the `Error in <file> at line L, column C:`
    /// diagnostic line, when the stage has one.
    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            PipelineError::Lexer(err) => Some(&err.location),
            PipelineError::Parser { first, .. } => Some(&first.location),
            PipelineError::Semantic { first, .. } => Some(&first.location),
            PipelineError::Compile(err) => err.location(),
            PipelineError::Runtime(_) | PipelineError::Io { .. } => None,
        }
    }
}

pub struct Pipeline {
    config: Config,
    last_error: Option<PipelineError>,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Pipeline {
            config,
            last_error: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The most recent pipeline error, until cleared.
    pub fn last_error(&self) -> Option<&PipelineError> {
        self.last_error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Read and run a source file.
    pub fn run_file(&mut self, path: &Path) -> Result<(), PipelineError> {
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) => {
                let failure = PipelineError::Io {
                    message: format!("could not read '{}': {}", path.display(), err),
                };
                self.last_error = Some(failure.clone());
                return Err(failure);
            }
        };
        self.run_source(&source, &path.display().to_string())
    }

    /// Run source text under the given file name.
    pub fn run_source(&mut self, source: &str, file_name: &str) -> Result<(), PipelineError> {
        self.run_source_with(source, file_name, |_| {})
    }

    /// Run source text, letting the host adjust the VM (typically to
    /// register or replace natives) after the default library is
    /// installed and before execution starts.
    pub fn run_source_with(
        &mut self,
        source: &str,
        file_name: &str,
        configure: impl FnOnce(&mut Vm),
    ) -> Result<(), PipelineError> {
        let result = self.execute(source, file_name, configure);
        if let Err(err) = &result {
            self.last_error = Some(err.clone());
        }
        result
    }

    fn execute(
        &self,
        source: &str,
        file_name: &str,
        configure: impl FnOnce(&mut Vm),
    ) -> Result<(), PipelineError> {
        trace!("lexing {}", file_name);
        let lexer_config = LexerConfig {
            file_name: file_name.to_string(),
            tab_width: self.config.tab_width,
            include_comments: self.config.include_comments,
            ..LexerConfig::default()
        };
        let mut lexer = Lexer::new(source, lexer_config);
        let tokens = lexer.tokenize();
        if lexer.error().is_error() {
            return Err(PipelineError::Lexer(lexer.error().clone()));
        }

        trace!("parsing {} tokens", tokens.len());
        let mut parser = Parser::new(tokens);
        let program = parser.parse();
        if !parser.errors().is_empty() {
            for err in parser.errors() {
                error!("parse error: {}", err);
            }
            let first = parser.errors()[0].clone();
            return Err(PipelineError::Parser {
                count: parser.errors().len(),
                first,
            });
        }

        trace!("semantic analysis");
        let mut analyzer = SemanticAnalyzer::new();
        let count = analyzer.analyze(&program);
        if count > 0 {
            for err in analyzer.errors() {
                error!("semantic error: {}", err);
            }
            let first = analyzer.errors()[0].clone();
            return Err(PipelineError::Semantic { count, first });
        }

        trace!("compiling");
        let bytecode = Compiler::new().compile(&program)?;
        if self.config.debug_mode {
            disasm::print_bc(&bytecode);
        }

        trace!("executing {} instructions", bytecode.len());
        let mut vm = Vm::new(bytecode);
        natives::install(&mut vm);
        configure(&mut vm);
        vm.set_trace(self.config.debug_mode);
        vm.run()?;
        Ok(())
    }
}
