use std::error;
use std::fmt;
use std::result;

use crate::byteset::escape_bytes;

/// A type alias for `Result<T, regex_machine::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that occurred while compiling a regex into a machine or while
/// emitting matcher code for one.
#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
}

/// The kind of error that occurred.
#[derive(Clone, Debug)]
pub enum ErrorKind {
    /// An error that occurred while parsing a regular expression. Note that
    /// this error may be printed over multiple lines, and is generally
    /// intended to be end user readable on its own.
    Syntax(String),
    /// An error that occurred because an unsupported regex feature was used.
    /// The message string describes which unsupported feature was used.
    Unsupported(String),
    /// A `Symbol` node carried an empty byte set. Such a node matches no
    /// input at all and is almost certainly a bug in the caller.
    EmptyByteSet,
    /// An annotation referenced a precondition name that was never declared
    /// in the compilation context.
    UnknownPrecondition {
        /// The name that was referenced.
        name: String,
    },
    /// Two distinct action lists compete for the same transition while an
    /// unambiguous machine was requested.
    Ambiguous {
        /// The name of one conflicting action.
        left: String,
        /// The name of the other conflicting action.
        right: String,
        /// A shortest input that reaches the conflict.
        witness: Vec<u8>,
    },
    /// Subset construction exceeded the configured state limit.
    TooManyStates {
        /// The limit on the number of DFA states.
        limit: usize,
        /// A rendering of the sub-expression being determinized.
        pattern: String,
    },
    /// More distinct preconditions guard a single byte of a single state
    /// than the determinizer is willing to expand.
    TooManyGuards {
        /// The number of distinct preconditions observed.
        given: usize,
        /// The limit on distinct preconditions per state and byte.
        limit: usize,
    },
    /// Code emission was asked to splice an action with no supplied body.
    MissingActionBody {
        /// The action name with no body.
        name: String,
    },
    /// Code emission was asked to guard on a precondition with no supplied
    /// expression.
    MissingPrecondition {
        /// The precondition name with no expression.
        name: String,
    },
    /// An emitter configuration value could not be used, e.g. a variable
    /// override that is not a valid identifier.
    InvalidCodeGenConfig(String),
}

impl Error {
    /// Return the kind of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub(crate) fn syntax(err: regex_syntax::Error) -> Error {
        Error { kind: ErrorKind::Syntax(err.to_string()) }
    }

    pub(crate) fn unsupported(msg: &str) -> Error {
        Error { kind: ErrorKind::Unsupported(msg.to_string()) }
    }

    pub(crate) fn empty_byte_set() -> Error {
        Error { kind: ErrorKind::EmptyByteSet }
    }

    pub(crate) fn unknown_precondition(name: &str) -> Error {
        Error {
            kind: ErrorKind::UnknownPrecondition { name: name.to_string() },
        }
    }

    pub(crate) fn ambiguous(
        left: String,
        right: String,
        witness: Vec<u8>,
    ) -> Error {
        Error { kind: ErrorKind::Ambiguous { left, right, witness } }
    }

    pub(crate) fn too_many_states(limit: usize, pattern: String) -> Error {
        Error { kind: ErrorKind::TooManyStates { limit, pattern } }
    }

    pub(crate) fn too_many_guards(given: usize, limit: usize) -> Error {
        Error { kind: ErrorKind::TooManyGuards { given, limit } }
    }

    pub(crate) fn missing_action_body(name: &str) -> Error {
        Error {
            kind: ErrorKind::MissingActionBody { name: name.to_string() },
        }
    }

    pub(crate) fn missing_precondition(name: &str) -> Error {
        Error {
            kind: ErrorKind::MissingPrecondition { name: name.to_string() },
        }
    }

    pub(crate) fn codegen_config(msg: String) -> Error {
        Error { kind: ErrorKind::InvalidCodeGenConfig(msg) }
    }

    /// Fill in the offending sub-expression on a state-limit error raised
    /// somewhere the expression was not known.
    pub(crate) fn for_pattern(mut self, re: &crate::regex::Regex) -> Error {
        if let ErrorKind::TooManyStates { ref mut pattern, .. } = self.kind {
            if pattern.is_empty() {
                *pattern = format!("`{}`", re);
            }
        }
        self
    }
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            ErrorKind::Syntax(ref msg) => write!(f, "{}", msg),
            ErrorKind::Unsupported(ref msg) => write!(f, "{}", msg),
            ErrorKind::EmptyByteSet => {
                write!(f, "symbol with an empty byte set matches nothing")
            }
            ErrorKind::UnknownPrecondition { ref name } => write!(
                f,
                "precondition {:?} is referenced but was never declared",
                name,
            ),
            ErrorKind::Ambiguous { ref left, ref right, ref witness } => {
                write!(
                    f,
                    "actions {:?} and {:?} both fire on input \"{}\", \
                     but only one can run; assign distinct priorities or \
                     compile without requesting an unambiguous machine",
                    left,
                    right,
                    escape_bytes(witness),
                )
            }
            ErrorKind::TooManyStates { limit, ref pattern } => write!(
                f,
                "determinizing {} exceeded the limit of {} states",
                pattern, limit,
            ),
            ErrorKind::TooManyGuards { given, limit } => write!(
                f,
                "{} distinct preconditions guard one transition, \
                 which exceeds the limit of {}",
                given, limit,
            ),
            ErrorKind::MissingActionBody { ref name } => write!(
                f,
                "no code body was supplied for action {:?}",
                name,
            ),
            ErrorKind::MissingPrecondition { ref name } => write!(
                f,
                "no boolean expression was supplied for precondition {:?}",
                name,
            ),
            ErrorKind::InvalidCodeGenConfig(ref msg) => {
                write!(f, "{}", msg)
            }
        }
    }
}
