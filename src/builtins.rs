use crate::error::{Result, ShellError};
use crate::parser::Command;
use crate::redirect::open_output;
use crate::utils::report;
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

pub const SETENV_USAGE: &str = "Usage: setenv VARIABLE VALUE";

/// Commands the shell runs itself, without spawning a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Cd,
    Pwd,
    Echo,
    Exit,
    Env,
    Setenv,
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "cd" => Some(Builtin::Cd),
            "pwd" => Some(Builtin::Pwd),
            "echo" => Some(Builtin::Echo),
            "exit" => Some(Builtin::Exit),
            "env" => Some(Builtin::Env),
            "setenv" => Some(Builtin::Setenv),
            _ => None,
        }
    }

    /// Runs the built-in with `argv` (name included), writing output to `out`.
    pub fn run(self, argv: &[String], out: &mut dyn Write) -> Result<()> {
        let write_err = |e: io::Error| ShellError::io("write", e);
        match self {
            Builtin::Cd => {
                let dir = match argv.get(1) {
                    Some(dir) => PathBuf::from(dir),
                    None => home_dir().ok_or_else(|| {
                        ShellError::io("cd", io::Error::new(io::ErrorKind::NotFound, "HOME not set"))
                    })?,
                };
                env::set_current_dir(&dir)
                    .map_err(|e| ShellError::io(format!("cd: {}", dir.display()), e))
            }
            Builtin::Pwd => {
                let cwd = env::current_dir().map_err(|e| ShellError::io("getcwd", e))?;
                writeln!(out, "{}", cwd.display()).map_err(write_err)
            }
            Builtin::Echo => {
                for arg in &argv[1..] {
                    write!(out, "{} ", arg).map_err(write_err)?;
                }
                writeln!(out).map_err(write_err)
            }
            Builtin::Exit => {
                let _ = out.flush();
                let _ = io::stdout().flush();
                process::exit(0);
            }
            Builtin::Env => {
                for (key, value) in env::vars_os() {
                    writeln!(out, "{}={}", key.to_string_lossy(), value.to_string_lossy())
                        .map_err(write_err)?;
                }
                Ok(())
            }
            Builtin::Setenv => {
                if argv.len() != 3 {
                    return writeln!(out, "{}", SETENV_USAGE).map_err(write_err);
                }
                let (name, value) = (&argv[1], &argv[2]);
                if name.is_empty() || name.contains('=') || name.contains('\0') || value.contains('\0') {
                    return Err(ShellError::io(
                        "setenv",
                        io::Error::from(io::ErrorKind::InvalidInput),
                    ));
                }
                env::set_var(name, value);
                Ok(())
            }
        }
    }
}

/// `HOME`, or the platform's idea of it when the variable is unset.
fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs_next::home_dir)
}

/// Checks if the command is a built-in command and, if so, executes it.
/// Output goes to the `>` target when one is given, stdout otherwise.
/// Returns true if the command was built-in and handled; false otherwise.
pub fn handle_builtin(cmd: &Command) -> bool {
    let Some(builtin) = Builtin::lookup(cmd.name()) else {
        return false;
    };

    let result = match cmd.outfile.as_deref() {
        Some(path) => open_output(path)
            .map_err(|e| ShellError::io(format!("open: {}", path), e))
            .and_then(|mut file| builtin.run(&cmd.argv, &mut file)),
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            builtin
                .run(&cmd.argv, &mut out)
                .and_then(|()| out.flush().map_err(|e| ShellError::io("write", e)))
        }
    };
    if let Err(e) = result {
        report(&e);
    }
    true
}
