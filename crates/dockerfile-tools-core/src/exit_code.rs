use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Lex = 2,
    Parse = 3,
    PathResolution = 4,
    OptionParse = 5,
    Read = 6,
    Usage = 64,
    Internal = 70,
    Output = 74,
}

impl ExitCode {
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<&Error> for ExitCode {
    fn from(value: &Error) -> Self {
        match value {
            Error::PathResolution { .. } => Self::PathResolution,
            Error::Read { .. } => Self::Read,
            Error::Lex { .. } => Self::Lex,
            Error::Parse { .. } => Self::Parse,
            Error::OptionParse { .. } => Self::OptionParse,
        }
    }
}
