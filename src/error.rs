use nix::errno::Errno;
use std::io;
use thiserror::Error;

/// Malformed command lines. The command is dropped before anything runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid input redirection")]
    InvalidInputRedirection,
    #[error("invalid output redirection")]
    InvalidOutputRedirection,
    #[error("invalid pipe usage")]
    InvalidPipe,
    #[error("only a single pipe is supported")]
    MultiplePipes,
    #[error("missing command")]
    MissingCommand,
    #[error("too many arguments (limit {0})")]
    TooManyArguments(usize),
    #[error("line too long (limit {0} characters)")]
    LineTooLong(usize),
}

/// Failures while resolving, launching or waiting on commands.
///
/// Displays as `context: message`, the way `perror` would.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("{context}: {source}")]
    Sys {
        context: &'static str,
        #[source]
        source: Errno,
    },
}

impl ShellError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        ShellError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn sys(context: &'static str, source: Errno) -> Self {
        ShellError::Sys { context, source }
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_like_perror() {
        let err = ShellError::io("open: out.txt", io::Error::from(io::ErrorKind::NotFound));
        assert!(err.to_string().starts_with("open: out.txt: "));

        let err = ShellError::sys("dup2", Errno::EBADF);
        assert!(err.to_string().starts_with("dup2: "));
    }

    #[test]
    fn parse_errors_name_the_problem() {
        assert_eq!(ParseError::InvalidPipe.to_string(), "invalid pipe usage");
        assert_eq!(
            ParseError::TooManyArguments(127).to_string(),
            "too many arguments (limit 127)"
        );
    }
}
