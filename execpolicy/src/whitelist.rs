//! Prefix matching for command whitelists and permission lists.
//!
//! A prefix matches a command when the normalized command equals the
//! normalized prefix, or starts with it followed by a space or tab. Both sides
//! are normalized by trimming surrounding whitespace and lower-casing, so
//! `git status` matches `GIT STATUS --short` but not `git statusx`.

/// Read-only and inspection commands that run without approval in whitelist
/// mode unless the configuration supplies its own list.
pub const DEFAULT_WHITELIST: &[&str] = &[
    "echo",
    "cat",
    "ls",
    "dir",
    "pwd",
    "whoami",
    "hostname",
    "date",
    "uname",
    "type",
    "which",
    "where",
    "env",
    "set",
    "printenv",
    "ping",
    "nslookup",
    "dig",
    "curl",
    "head",
    "tail",
    "wc",
    "df",
    "free",
    "uptime",
    "python --version",
    "python3 --version",
    "node --version",
    "git status",
    "git log",
    "git diff",
    "git branch",
    "pip list",
    "pip show",
    "npm list",
    "systeminfo",
    "ver",
    "Get-Process",
    "Get-Service",
    "Get-Date",
    "Get-ChildItem",
    "wsl --list",
    "wsl --status",
];

pub fn default_whitelist() -> Vec<String> {
    DEFAULT_WHITELIST.iter().map(ToString::to_string).collect()
}

/// Whether `command` matches any of `prefixes`.
pub fn matches<S: AsRef<str>>(command: &str, prefixes: &[S]) -> bool {
    find_match(command, prefixes).is_some()
}

/// Returns the first entry of `prefixes` matching `command`, as written in the
/// list.
pub fn find_match<'a, S: AsRef<str>>(command: &str, prefixes: &'a [S]) -> Option<&'a str> {
    let command = command.trim().to_lowercase();
    if command.is_empty() {
        return None;
    }
    prefixes
        .iter()
        .map(AsRef::as_ref)
        .find(|prefix| prefix_matches(&command, &prefix.trim().to_lowercase()))
}

fn prefix_matches(command: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    match command.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with([' ', '\t']),
        None => false,
    }
}
