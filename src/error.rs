//! Error taxonomy and the traceback reporter.
//!
//! Every failure inside the interpreter is a [`VmError`] with a kind drawn
//! from the fixed taxonomy below. The dispatch loop never recovers on its
//! own; errors propagate out of `ZataVm::run` and the embedding entry point
//! decides whether to report and exit or hand the error back to the host.

use std::fmt::{self, Display, Formatter};
use std::io;

/// ANSI escape sequences used by the reporter.
pub mod fore {
    pub const RESET: &str = "\x1b[0m";
    pub const RED: &str = "\x1b[31m";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Generic,
    CallStack,
    OpStack,
    Calc,
    Runtime,
    Memory,
    Io,
    Bytecode,
    Type,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Generic => "ZataError",
            ErrorKind::CallStack => "ZataCallStackError",
            ErrorKind::OpStack => "ZataOpStackError",
            ErrorKind::Calc => "ZataCalcError",
            ErrorKind::Runtime => "ZataRuntimeError",
            ErrorKind::Memory => "ZataMemoryError",
            ErrorKind::Io => "ZataIOError",
            ErrorKind::Bytecode => "ZataBytecodeError",
            ErrorKind::Type => "ZataTypeError",
        }
    }

    /// Process exit status for this kind. Never zero; a failed run must not
    /// report success to the host shell.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Generic => 1,
            ErrorKind::CallStack | ErrorKind::OpStack => 2,
            ErrorKind::Type => 3,
            ErrorKind::Calc => 4,
            ErrorKind::Memory => 5,
            ErrorKind::Io => 6,
            ErrorKind::Bytecode => 7,
            ErrorKind::Runtime => 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VmError {
    pub kind: ErrorKind,
    pub message: String,
    pub code: i32,
}

impl VmError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        VmError {
            kind,
            message: message.into(),
            code: kind.exit_code(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        VmError::new(ErrorKind::Generic, message)
    }

    pub fn call_stack(message: impl Into<String>) -> Self {
        VmError::new(ErrorKind::CallStack, message)
    }

    pub fn op_stack(message: impl Into<String>) -> Self {
        VmError::new(ErrorKind::OpStack, message)
    }

    pub fn calc(message: impl Into<String>) -> Self {
        VmError::new(ErrorKind::Calc, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        VmError::new(ErrorKind::Runtime, message)
    }

    pub fn memory(message: impl Into<String>) -> Self {
        VmError::new(ErrorKind::Memory, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        VmError::new(ErrorKind::Io, message)
    }

    pub fn bytecode(message: impl Into<String>) -> Self {
        VmError::new(ErrorKind::Bytecode, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        VmError::new(ErrorKind::Type, message)
    }
}

impl Display for VmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)
    }
}

impl std::error::Error for VmError {}

impl From<io::Error> for VmError {
    fn from(err: io::Error) -> Self {
        VmError::io(err.to_string())
    }
}

impl From<libloading::Error> for VmError {
    fn from(err: libloading::Error) -> Self {
        VmError::io(err.to_string())
    }
}

/// One entry of a rendered traceback, innermost frame first.
pub struct TracebackFrame {
    pub name: String,
    pub line: Option<usize>,
}

/// Prints the red traceback block for an error raised while the given
/// frames were active. Termination is left to the caller so library users
/// can keep the process alive.
pub fn report_traceback(frames: &[TracebackFrame], error: &VmError) {
    println!("{}\n-- [ Trace Back ] --{}", fore::RED, fore::RESET);

    for frame in frames {
        match frame.line {
            Some(line) => println!(
                "{} at function {} (line {}){}",
                fore::RED,
                frame.name,
                line,
                fore::RESET
            ),
            None => println!("{} at function {}{}", fore::RED, frame.name, fore::RESET),
        }
    }

    println!("{}\n-- [ Infos ] --{}", fore::RED, fore::RESET);
    println!(
        "{}{}: {} err_code={}{}",
        fore::RED,
        error.kind.label(),
        error.message,
        error.code,
        fore::RESET
    );

    println!("{}\n-- [ End ] --{}", fore::RED, fore::RESET);
}
