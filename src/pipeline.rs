use crate::error::Result;
use crate::exec::{launch, Placement, StageIo};
use crate::jobs::Job;
use crate::parser::CommandLine;
use crate::redirect::{self, Redirect};
use nix::unistd::Pid;
use std::process::{Child, ChildStdout, Stdio};
use tracing::debug;

/// Launches every stage of `line` as one job.
///
/// Stages run in a single process group led by the first one. Each stage but
/// the last writes into a fresh pipe whose read end becomes the next stage's
/// standard input; the parent's copies of both ends are closed once the
/// reading stage has been spawned. Explicit `<`/`>` redirections take
/// precedence over the pipe; a stage left without a pipe or redirected input
/// reads from `/dev/null`, except the first stage of a foreground job, which
/// inherits the shell's standard input.
///
/// If any stage cannot be launched, the stages already running are killed
/// and reaped before the error is returned.
pub fn launch_job(line: &CommandLine, take_terminal: bool) -> Result<Job> {
    let last = line.stages.len() - 1;
    let mut children: Vec<Child> = Vec::with_capacity(line.stages.len());
    let mut pgid: Option<Pid> = None;
    let mut pipe_read: Option<ChildStdout> = None;

    for (i, stage) in line.stages.iter().enumerate() {
        let redirs = redirect::resolve(stage);
        let from_upstream = pipe_read.take();

        let launched = stage_io(
            redirs.input,
            redirs.output,
            from_upstream,
            i > 0 || line.background,
            i < last,
        )
        .and_then(|io| {
            launch(
                &stage.argv,
                io,
                Placement {
                    pgid,
                    take_terminal,
                },
            )
        });

        let mut child = match launched {
            Ok(child) => child,
            Err(e) => {
                abort(children);
                return Err(e);
            }
        };

        if i < last {
            pipe_read = child.stdout.take();
        }
        let pid = Pid::from_raw(child.id() as i32);
        pgid.get_or_insert(pid);
        children.push(child);
    }

    let pids: Vec<Pid> = children
        .iter()
        .map(|child| Pid::from_raw(child.id() as i32))
        .collect();
    let job = Job {
        pgid: pgid.unwrap_or(pids[0]),
        pids,
        cmdline: line.display(),
    };
    debug!(pgid = job.pgid.as_raw(), stages = job.pids.len(), cmd = %job.cmdline, "job started");
    Ok(job)
}

fn stage_io(
    input: Option<Redirect>,
    output: Option<Redirect>,
    from_upstream: Option<ChildStdout>,
    null_input: bool,
    feeds_pipe: bool,
) -> Result<StageIo> {
    let stdin = match input {
        Some(redirect) => Some(redirect.into_stdio()?),
        None => match from_upstream {
            Some(read_end) => Some(Stdio::from(read_end)),
            None if null_input => Some(Stdio::null()),
            None => None,
        },
    };
    let stdout = match output {
        Some(redirect) => Some(redirect.into_stdio()?),
        None if feeds_pipe => Some(Stdio::piped()),
        None => None,
    };
    Ok(StageIo { stdin, stdout })
}

fn abort(children: Vec<Child>) {
    for mut child in children {
        let _ = child.kill();
        let _ = child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_command_line;
    use nix::sys::wait::{waitpid, WaitStatus};
    use std::fs;

    fn parse(line: &str) -> CommandLine {
        parse_command_line(line).unwrap().unwrap()
    }

    fn wait_all(job: &Job) {
        for &pid in &job.pids {
            let status = waitpid(pid, None).unwrap();
            assert!(matches!(status, WaitStatus::Exited(_, 0)), "{:?}", status);
        }
    }

    #[test]
    fn pipes_left_stage_into_right_stage() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        fs::write(&input, "b\na\nc\n").unwrap();

        let line = parse(&format!(
            "cat {} | sort > {}",
            input.display(),
            output.display()
        ));
        let job = launch_job(&line, false).unwrap();
        assert_eq!(job.pids.len(), 2);
        assert_eq!(job.pgid, job.pids[0]);
        assert_eq!(job.upstream(), &job.pids[..1]);
        wait_all(&job);

        assert_eq!(fs::read_to_string(&output).unwrap(), "a\nb\nc\n");
    }

    #[test]
    fn single_stage_with_both_redirections() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        fs::write(&input, "hello\n").unwrap();

        let line = parse(&format!("cat < {} > {}", input.display(), output.display()));
        let job = launch_job(&line, false).unwrap();
        assert_eq!(job.pids.len(), 1);
        wait_all(&job);

        assert_eq!(fs::read_to_string(&output).unwrap(), "hello\n");
    }

    #[test]
    fn unavailable_input_launches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        let line = parse(&format!(
            "cat < {} > {}",
            dir.path().join("missing").display(),
            output.display()
        ));
        assert!(launch_job(&line, false).is_err());
        // the output side was still opened and truncated
        assert_eq!(fs::read_to_string(&output).unwrap(), "");
    }

    #[test]
    fn failing_right_stage_reaps_left_stage() {
        let line = parse("sleep 5 | definitely-not-a-real-program-xyz");
        assert!(launch_job(&line, false).is_err());
    }
}
