use crate::error::{Result, ShellError};
use nix::libc::STDIN_FILENO;
use nix::unistd::isatty;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::{self, BufRead, StdinLock, Write};
use tracing::warn;

/// One read from the line source.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Line(String),
    /// Ctrl-C at the prompt, or a read cut short by a signal.
    Interrupted,
    Eof,
}

/// Where command lines come from: a line editor on a terminal, plain
/// buffered reads otherwise.
pub enum LineSource {
    Editor(DefaultEditor),
    Stdin(StdinLock<'static>),
}

impl LineSource {
    pub fn open() -> Self {
        if isatty(STDIN_FILENO).unwrap_or(false) {
            match DefaultEditor::new() {
                Ok(editor) => return LineSource::Editor(editor),
                Err(e) => warn!(error = %e, "line editor unavailable, reading plain stdin"),
            }
        }
        LineSource::Stdin(io::stdin().lock())
    }

    /// Reads one line, showing `prompt` first when given.
    pub fn read_line(&mut self, prompt: Option<&str>) -> Result<Input> {
        match self {
            LineSource::Editor(editor) => match editor.readline(prompt.unwrap_or_default()) {
                Ok(line) => Ok(Input::Line(line)),
                Err(ReadlineError::Interrupted) => Ok(Input::Interrupted),
                Err(ReadlineError::Eof) => Ok(Input::Eof),
                Err(ReadlineError::Io(e)) if e.kind() == io::ErrorKind::Interrupted => {
                    Ok(Input::Interrupted)
                }
                Err(e) => Err(ShellError::io(
                    "readline",
                    io::Error::new(io::ErrorKind::Other, e.to_string()),
                )),
            },
            LineSource::Stdin(stdin) => {
                if let Some(prompt) = prompt {
                    let mut stdout = io::stdout();
                    write!(stdout, "{}", prompt)
                        .and_then(|()| stdout.flush())
                        .map_err(|e| ShellError::io("write", e))?;
                }
                read_plain(stdin)
            }
        }
    }
}

/// Reads one line from a non-terminal source.
///
/// `BufRead::read_line` retries reads cut short by a signal, so a SIGINT at
/// the prompt only takes effect once the next line (or end of input) arrives.
fn read_plain(reader: &mut impl BufRead) -> Result<Input> {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) => Ok(Input::Eof),
        Ok(_) => Ok(Input::Line(line)),
        Err(e) => Err(ShellError::io("read", e)),
    }
}
