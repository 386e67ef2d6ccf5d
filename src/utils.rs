use std::fmt::Display;
use std::process;

pub const SHELL_NAME: &str = "tish";

pub fn print_usage() -> ! {
    println!("Usage: {} [-hvp] [-t SECS]", SHELL_NAME);
    println!("   -h        Print this help message");
    println!("   -v        Enable verbose mode");
    println!("   -p        Do not print a command prompt");
    println!("   -t SECS   Foreground command timeout (0 disables it)");
    process::exit(1);
}

/// Reports a non-fatal error on stderr.
pub fn report(err: &dyn Display) {
    eprintln!("{}", err);
}

/// Reports a malformed command line on stderr.
pub fn report_input(err: &dyn Display) {
    eprintln!("{}: {}", SHELL_NAME, err);
}

/// Reports a fatal error and exits.
pub fn error(msg: &dyn Display) -> ! {
    eprintln!("{}: {}", SHELL_NAME, msg);
    process::exit(1);
}
