//! ANSI color helpers for `dslx` output.
//!
//! Results go to stdout, diagnostics to stderr; both use these wrappers.

const RESET: &str = "\x1b[0m";

fn paint(code: &str, s: &str) -> String {
    format!("\x1b[{}m{}{}", code, s, RESET)
}

/// Passing tests and successful checks.
pub fn green(s: &str) -> String {
    paint("32", s)
}

/// Failures and `error:` prefixes.
pub fn red(s: &str) -> String {
    paint("31", s)
}

/// De-emphasized context such as file names.
pub fn gray(s: &str) -> String {
    paint("90", s)
}

pub fn bold(s: &str) -> String {
    paint("1", s)
}

/// Right-aligned bold green label, e.g. `     Running`.
pub fn status_label(label: &str) -> String {
    paint("1;32", &format!("{:>12}", label))
}
