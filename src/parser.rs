use crate::config::{MAX_ARGS, MAX_LINE_LEN};
use crate::error::ParseError;

const REDIRECT_IN: &str = "<";
const REDIRECT_OUT: &str = ">";
const PIPE: &str = "|";
const BACKGROUND: &str = "&";

/// One program invocation within a command line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Command {
    /// Program name followed by its arguments.
    pub argv: Vec<String>,
    /// Input redirection file, if any.
    pub infile: Option<String>,
    /// Output redirection file, if any.
    pub outfile: Option<String>,
}

impl Command {
    /// Creates a new, empty command.
    pub fn new() -> Self {
        Command::default()
    }

    pub fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }
}

/// A parsed line: the pipeline stages in order, upstream first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub stages: Vec<Command>,
    pub background: bool,
}

impl CommandLine {
    /// The stage whose completion ends the job (the rightmost one).
    pub fn primary(&self) -> &Command {
        &self.stages[self.stages.len() - 1]
    }

    pub fn is_pipeline(&self) -> bool {
        self.stages.len() > 1
    }

    /// Rebuilds a printable form of the line for diagnostics.
    pub fn display(&self) -> String {
        let mut out = self
            .stages
            .iter()
            .map(|stage| stage.argv.join(" "))
            .collect::<Vec<_>>()
            .join(" | ");
        if self.background {
            out.push_str(" &");
        }
        out
    }
}

/// Parses one input line.
///
/// Returns `Ok(None)` for a line with nothing to run. Tokens are separated by
/// whitespace only; a trailing `&` requests background execution, `<` and `>`
/// take the following token as a path and `|` splits the line into two stages.
pub fn parse_command_line(cmdline: &str) -> Result<Option<CommandLine>, ParseError> {
    let content = cmdline.trim_end_matches(&['\n', '\r'][..]);
    if content.len() >= MAX_LINE_LEN {
        return Err(ParseError::LineTooLong(MAX_LINE_LEN - 1));
    }

    let mut tokens = tokenize(content);
    if tokens.len() > MAX_ARGS - 1 {
        return Err(ParseError::TooManyArguments(MAX_ARGS - 1));
    }

    let background = tokens.last() == Some(&BACKGROUND);
    if background {
        tokens.pop();
    }
    if tokens.is_empty() {
        return Ok(None);
    }

    let mut stages = Vec::new();
    let mut current = Command::new();
    let mut iter = tokens.into_iter();

    while let Some(token) = iter.next() {
        match token {
            REDIRECT_IN => match iter.next() {
                Some(path) if !is_operator(path) => current.infile = Some(path.to_string()),
                _ => return Err(ParseError::InvalidInputRedirection),
            },
            REDIRECT_OUT => match iter.next() {
                Some(path) if !is_operator(path) => current.outfile = Some(path.to_string()),
                _ => return Err(ParseError::InvalidOutputRedirection),
            },
            PIPE => {
                if current.argv.is_empty() {
                    return Err(ParseError::InvalidPipe);
                }
                if !stages.is_empty() {
                    return Err(ParseError::MultiplePipes);
                }
                stages.push(std::mem::take(&mut current));
            }
            word => current.argv.push(word.to_string()),
        }
    }

    if current.argv.is_empty() {
        return Err(if stages.is_empty() {
            ParseError::MissingCommand
        } else {
            ParseError::InvalidPipe
        });
    }
    stages.push(current);

    Ok(Some(CommandLine { stages, background }))
}

/// Splits the line on whitespace. There is no quoting or escaping.
fn tokenize(input: &str) -> Vec<&str> {
    input.split_whitespace().collect()
}

fn is_operator(token: &str) -> bool {
    matches!(token, REDIRECT_IN | REDIRECT_OUT | PIPE)
}
