mod class;
mod encoder;
mod error;
mod expression;
mod grammar;
mod instruction;
mod machine;
mod program;
mod semantics;
pub mod utf8;

pub use sprig_ucd as ucd;

pub use error::{Error, Result};
pub use expression::*;
pub use grammar::{start, Grammar, Rule, RuleRef};
pub use instruction::{alt, Instr, Opcode, MAX_STR_LEN};
pub use machine::{parse, parse_lines, parse_stdin, parse_with, Parser, Registers};
pub use program::{Program, SemanticAction, SemanticCapture, SemanticPredicate};
pub use semantics::{Semantics, SyntaxPosition, SyntaxRange, SyntaxView, Variable};
