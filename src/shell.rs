use crate::builtins::handle_builtin;
use crate::config::{Config, FALLBACK_PROMPT};
use crate::error::{Result, ShellError};
use crate::input::{Input, LineSource};
use crate::jobs::init_jobs;
use crate::parser::parse_command_line;
use crate::signals::{spawn_reaper, SIGNALS};
use crate::supervisor::Supervisor;
use crate::utils::{report, report_input};
use nix::libc::STDIN_FILENO;
use nix::unistd::isatty;
use std::env;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// The prompt: the working directory followed by `> `.
pub fn prompt() -> String {
    match env::current_dir() {
        Ok(cwd) => format!("{}> ", cwd.display()),
        Err(e) => {
            report(&ShellError::io("getcwd", e));
            FALLBACK_PROMPT.to_string()
        }
    }
}

/// Runs the main shell loop: prints the prompt (if enabled), handles pending
/// signal flags, reads input, parses it, and evaluates commands.
///
/// Returns `Ok(())` at end of input and an error if reading fails.
pub fn run_shell(config: &Config) -> Result<()> {
    // Processes that are never waited on explicitly.
    let job_list = Arc::new(Mutex::new(init_jobs()));
    if let Err(e) = spawn_reaper(Arc::clone(&job_list)) {
        warn!(error = %e, "background reaper not started; detached jobs are reaped between prompts only");
    }

    let terminal = isatty(STDIN_FILENO).unwrap_or(false);
    let mut supervisor = Supervisor::new(job_list, config.timeout_secs, terminal);
    let mut source = LineSource::open();

    loop {
        let shown = config.emit_prompt.then(prompt);

        // Flags are handled before the read; the line editor prints the
        // prompt itself, so a timeout notice lands above it.
        if SIGNALS.take_interrupt() {
            debug!("interrupt pending at prompt");
        }
        if SIGNALS.take_timeout() || supervisor.has_expired() {
            supervisor.terminate_expired();
        }
        supervisor.reap_background();

        let cmdline = match source.read_line(shown.as_deref())? {
            Input::Line(line) => line,
            Input::Interrupted => continue,
            Input::Eof => break,
        };
        if config.verbose {
            debug!(line = cmdline.trim(), "received command");
        }
        eval(&cmdline, &mut supervisor);
    }

    println!();
    let _ = io::stdout().flush();
    Ok(())
}

/// Parses and runs one command line.
fn eval(cmdline: &str, supervisor: &mut Supervisor) {
    let line = match parse_command_line(cmdline) {
        Ok(Some(line)) => line,
        Ok(None) => return,
        Err(e) => {
            report_input(&e);
            return;
        }
    };

    // Built-ins only run in-process as a lone stage.
    if !line.is_pipeline() && handle_builtin(line.primary()) {
        return;
    }
    let outcome = supervisor.run(&line);
    debug!(?outcome, cmd = %line.display(), "command done");
}
