use crate::error::{Result, ShellError};
use crate::signals;
use nix::libc::STDIN_FILENO;
use nix::unistd::{self, Pid};
use std::io::ErrorKind;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use tracing::debug;

/// Where a stage's standard streams come from. `None` inherits the shell's.
#[derive(Debug, Default)]
pub struct StageIo {
    pub stdin: Option<Stdio>,
    pub stdout: Option<Stdio>,
}

/// Process-group placement of a new stage.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    /// Group to join; `None` starts a new group led by the stage.
    pub pgid: Option<Pid>,
    /// Hand the terminal to the group before exec.
    pub take_terminal: bool,
}

/// Spawns one program in a new process, applying the descriptor substitutions
/// in `io` and the group placement, then replacing the child's image with
/// `argv[0]` looked up on `PATH`.
///
/// An exec failure in the child is reported back through `spawn` and the
/// child exits non-zero; it never returns into shell code.
pub fn launch(argv: &[String], io: StageIo, placement: Placement) -> Result<Child> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| ShellError::io("execvp", ErrorKind::InvalidInput.into()))?;

    let mut command = Command::new(program);
    command.args(args);
    if let Some(stdin) = io.stdin {
        command.stdin(stdin);
    }
    if let Some(stdout) = io.stdout {
        command.stdout(stdout);
    }

    let target = placement.pgid.unwrap_or_else(|| Pid::from_raw(0));
    let take_terminal = placement.take_terminal;
    unsafe {
        command.pre_exec(move || {
            let pid = unistd::getpid();
            let pgid = if target.as_raw() == 0 { pid } else { target };
            let _ = unistd::setpgid(pid, pgid);
            if take_terminal {
                let _ = unistd::tcsetpgrp(STDIN_FILENO, pgid);
            }
            signals::restore_default();
            Ok(())
        });
    }

    let child = command.spawn().map_err(|e| {
        let context = if e.kind() == ErrorKind::NotFound {
            format!("{}: command not found", program)
        } else {
            format!("execvp: {}", program)
        };
        ShellError::io(context, e)
    })?;

    // Also set the group from the parent so it is in place before we signal it.
    let pid = Pid::from_raw(child.id() as i32);
    let pgid = placement.pgid.unwrap_or(pid);
    let _ = unistd::setpgid(pid, pgid);
    debug!(pid = pid.as_raw(), pgid = pgid.as_raw(), program = %program, "launched");
    Ok(child)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn argv(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn placement() -> Placement {
        Placement {
            pgid: None,
            take_terminal: false,
        }
    }

    #[test]
    fn runs_in_its_own_process_group() {
        let io = StageIo {
            stdin: Some(Stdio::null()),
            stdout: None,
        };
        let mut child = launch(&argv(&["sleep", "5"]), io, placement()).unwrap();
        let pid = Pid::from_raw(child.id() as i32);
        assert_eq!(unistd::getpgid(Some(pid)).unwrap(), pid);
        assert_ne!(pid, unistd::getpgrp());
        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[test]
    fn joins_an_existing_group() {
        let mut leader = launch(&argv(&["sleep", "5"]), StageIo::default(), placement()).unwrap();
        let pgid = Pid::from_raw(leader.id() as i32);
        let mut member = launch(
            &argv(&["sleep", "5"]),
            StageIo::default(),
            Placement {
                pgid: Some(pgid),
                take_terminal: false,
            },
        )
        .unwrap();
        let pid = Pid::from_raw(member.id() as i32);
        assert_eq!(unistd::getpgid(Some(pid)).unwrap(), pgid);
        member.kill().unwrap();
        leader.kill().unwrap();
        member.wait().unwrap();
        leader.wait().unwrap();
    }

    #[test]
    fn substitutes_stdout() {
        let io = StageIo {
            stdin: None,
            stdout: Some(Stdio::piped()),
        };
        let mut child = launch(&argv(&["echo", "hello"]), io, placement()).unwrap();
        let mut out = String::new();
        child.stdout.take().unwrap().read_to_string(&mut out).unwrap();
        assert!(child.wait().unwrap().success());
        assert_eq!(out, "hello\n");
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = launch(
            &argv(&["definitely-not-a-real-program-xyz"]),
            StageIo::default(),
            placement(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("command not found"));
    }

    #[test]
    fn empty_argv_is_an_error() {
        assert!(launch(&[], StageIo::default(), placement()).is_err());
    }
}
