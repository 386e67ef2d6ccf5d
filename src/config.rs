/// Longest accepted command line, newline included.
pub const MAX_LINE_LEN: usize = 1024;

/// Size of the argument table; one slot stays reserved, as for an argv terminator.
pub const MAX_ARGS: usize = 128;

/// Seconds a foreground command may run before its job is terminated.
pub const FOREGROUND_TIMEOUT_SECS: u32 = 10;

/// Prompt used when the working directory cannot be read.
pub const FALLBACK_PROMPT: &str = "> ";

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "TISH_LOG";

/// Options taken from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Print a prompt before every read.
    pub emit_prompt: bool,
    /// Log at debug level.
    pub verbose: bool,
    /// Foreground countdown in seconds; zero disables it.
    pub timeout_secs: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            emit_prompt: true,
            verbose: false,
            timeout_secs: FOREGROUND_TIMEOUT_SECS,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, PartialEq, Eq)]
pub enum Invocation {
    Run(Config),
    Usage,
}

impl Config {
    /// Parses `-h`, `-v`, `-p` and `-t SECS`. Anything unrecognised asks for usage.
    pub fn from_args<I, S>(args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Config::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_ref() {
                "-v" => config.verbose = true,
                "-p" => config.emit_prompt = false,
                "-t" => match args.next().and_then(|secs| secs.as_ref().parse().ok()) {
                    Some(secs) => config.timeout_secs = secs,
                    None => return Invocation::Usage,
                },
                _ => return Invocation::Usage,
            }
        }
        Invocation::Run(config)
    }
}
