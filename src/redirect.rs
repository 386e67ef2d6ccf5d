use crate::error::{Result, ShellError};
use crate::parser::Command;
use crate::utils::report;
use nix::errno::Errno;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::process::Stdio;

/// Owner read/write, the mode given to files created by `>`.
const OUTPUT_MODE: u32 = 0o600;

/// A resolved redirection target.
#[derive(Debug)]
pub enum Redirect {
    File(File),
    /// The open failed and was already reported. Launching a stage that
    /// needs this descriptor fails instead of running with the wrong stream.
    Unavailable,
}

impl Redirect {
    fn from_open(path: &str, opened: std::io::Result<File>) -> Self {
        match opened {
            Ok(file) => Redirect::File(file),
            Err(e) => {
                report(&ShellError::io(format!("open: {}", path), e));
                Redirect::Unavailable
            }
        }
    }

    /// Converts into the stream the child's descriptor is duplicated from.
    pub fn into_stdio(self) -> Result<Stdio> {
        match self {
            Redirect::File(file) => Ok(Stdio::from(file)),
            Redirect::Unavailable => Err(ShellError::sys("dup2", Errno::EBADF)),
        }
    }
}

/// Descriptor substitutions for one stage.
#[derive(Debug, Default)]
pub struct Redirections {
    pub input: Option<Redirect>,
    pub output: Option<Redirect>,
}

/// Opens `path` read-only for `<`.
pub fn open_input(path: &str) -> std::io::Result<File> {
    File::open(path)
}

/// Opens `path` for `>`: write-only, created if absent, truncated if present.
pub fn open_output(path: &str) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(OUTPUT_MODE)
        .open(path)
}

/// Opens the files named by a stage's `<` and `>`.
///
/// Open failures are reported here; the matching slot is left
/// `Unavailable` and resolution carries on with the other one.
pub fn resolve(cmd: &Command) -> Redirections {
    Redirections {
        input: cmd
            .infile
            .as_deref()
            .map(|path| Redirect::from_open(path, open_input(path))),
        output: cmd
            .outfile
            .as_deref()
            .map(|path| Redirect::from_open(path, open_output(path))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn command(infile: Option<&str>, outfile: Option<&str>) -> Command {
        Command {
            argv: vec!["cat".into()],
            infile: infile.map(str::to_string),
            outfile: outfile.map(str::to_string),
        }
    }

    #[test]
    fn no_redirection_resolves_to_nothing() {
        let redirs = resolve(&command(None, None));
        assert!(redirs.input.is_none());
        assert!(redirs.output.is_none());
    }

    #[test]
    fn output_is_created_with_owner_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let redirs = resolve(&command(None, path.to_str()));

        assert!(matches!(redirs.output, Some(Redirect::File(_))));
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, OUTPUT_MODE);
    }

    #[test]
    fn output_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "old contents").unwrap();

        let redirs = resolve(&command(None, path.to_str()));
        assert!(matches!(redirs.output, Some(Redirect::File(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn missing_input_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        let out = dir.path().join("out.txt");
        let redirs = resolve(&command(missing.to_str(), out.to_str()));

        let input = redirs.input.unwrap();
        assert!(matches!(input, Redirect::Unavailable));
        assert!(input.into_stdio().is_err());
        // the other direction is still resolved
        assert!(matches!(redirs.output, Some(Redirect::File(_))));
    }
}
