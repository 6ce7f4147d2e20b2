#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid use of '%{0}'")]
    InvalidOperandUse(char),

    #[error("'%{0}' is not a valid operand prefix")]
    InvalidOperandPrefix(char),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
