use crate::error::{Result, ShellError};
use crate::jobs::{reap_jobs, JobList};
use nix::libc::c_int;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use once_cell::sync::OnceCell;
use signal_hook::{consts::signal::SIGCHLD, iterator::Signals};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tracing::{debug, trace};

/// Flags raised from signal context and consumed by the interactive loop.
pub struct SignalState {
    interrupt: AtomicBool,
    timeout: AtomicBool,
}

impl SignalState {
    const fn new() -> Self {
        SignalState {
            interrupt: AtomicBool::new(false),
            timeout: AtomicBool::new(false),
        }
    }

    pub fn interrupt_pending(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    /// Clears the interrupt flag, returning whether it was set.
    pub fn take_interrupt(&self) -> bool {
        self.interrupt.swap(false, Ordering::SeqCst)
    }

    pub fn timeout_pending(&self) -> bool {
        self.timeout.load(Ordering::SeqCst)
    }

    /// Clears the timeout flag, returning whether it was set.
    pub fn take_timeout(&self) -> bool {
        self.timeout.swap(false, Ordering::SeqCst)
    }
}

pub static SIGNALS: SignalState = SignalState::new();

static INSTALLED: OnceCell<()> = OnceCell::new();

extern "C" fn on_interrupt(_: c_int) {
    SIGNALS.interrupt.store(true, Ordering::SeqCst);
}

extern "C" fn on_alarm(_: c_int) {
    SIGNALS.timeout.store(true, Ordering::SeqCst);
}

/// Installs the shell's signal dispositions:
/// - SIGINT: (Ctrl-C) raises the interrupt flag.
/// - SIGALRM: (foreground countdown) raises the timeout flag.
/// - SIGTTOU: ignored, so the shell can take the terminal back from a job.
///
/// The handlers are installed without `SA_RESTART`, so a blocking wait on a
/// foreground job returns `EINTR` when either flag is raised. Safe to call
/// more than once; only the first call installs anything.
pub fn install_signal_handlers() -> Result<()> {
    INSTALLED
        .get_or_try_init(|| {
            let interrupt = SigAction::new(
                SigHandler::Handler(on_interrupt),
                SaFlags::empty(),
                SigSet::empty(),
            );
            let alarm = SigAction::new(
                SigHandler::Handler(on_alarm),
                SaFlags::empty(),
                SigSet::empty(),
            );
            unsafe {
                signal::sigaction(Signal::SIGINT, &interrupt)
                    .map_err(|e| ShellError::sys("sigaction", e))?;
                signal::sigaction(Signal::SIGALRM, &alarm)
                    .map_err(|e| ShellError::sys("sigaction", e))?;
                signal::signal(Signal::SIGTTOU, SigHandler::SigIgn)
                    .map_err(|e| ShellError::sys("signal", e))?;
            }
            Ok(())
        })
        .map(|_| ())
}

/// Restores default dispositions in a freshly forked child, before exec.
///
/// Only async-signal-safe calls are made; failures are ignored.
pub fn restore_default() {
    unsafe {
        let _ = signal::signal(Signal::SIGINT, SigHandler::SigDfl);
        let _ = signal::signal(Signal::SIGALRM, SigHandler::SigDfl);
        let _ = signal::signal(Signal::SIGTTOU, SigHandler::SigDfl);
    }
}

/// Starts the thread that reaps background processes on SIGCHLD.
///
/// SIGINT and SIGALRM are blocked in the new thread so they are always
/// delivered to the main thread, where they interrupt the foreground wait.
pub fn spawn_reaper(job_list: Arc<Mutex<JobList>>) -> Result<()> {
    let mut signals = Signals::new([SIGCHLD]).map_err(|e| ShellError::io("signals", e))?;

    let mut mask = SigSet::empty();
    mask.add(Signal::SIGINT);
    mask.add(Signal::SIGALRM);
    mask.thread_block()
        .map_err(|e| ShellError::sys("pthread_sigmask", e))?;

    let spawned = thread::Builder::new()
        .name("reaper".into())
        .spawn(move || {
            for _ in signals.forever() {
                trace!("SIGCHLD received");
                let mut jl = job_list.lock().unwrap_or_else(PoisonError::into_inner);
                reap_jobs(&mut jl);
            }
        });

    mask.thread_unblock()
        .map_err(|e| ShellError::sys("pthread_sigmask", e))?;
    spawned.map_err(|e| ShellError::io("spawn reaper", e))?;
    debug!("background reaper started");
    Ok(())
}
