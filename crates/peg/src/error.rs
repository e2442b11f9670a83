use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("length or offset of program exceeds internal limit")]
    ProgramLimit,

    #[error("number of semantic resources exceeds internal limit")]
    ResourceLimit,

    #[error("invalid or empty grammar")]
    BadGrammar,

    #[error("invalid opcode")]
    BadOpcode,

    #[error("invalid string expression: {0:?}")]
    BadStringExpression(String),

    #[error("invalid character class: {0:?}")]
    BadCharacterClass(String),

    #[error("parsing is not reentrant")]
    ReentrantParse,

    #[error("attempted to read or modify the input source while reading")]
    ReentrantRead,
}

pub type Result<T> = std::result::Result<T, Error>;
