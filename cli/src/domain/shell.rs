//! Quoting for commands sent to the remote shell and the sftp batch parser.

/// Wraps `arg` in single quotes for a POSIX shell.
#[must_use]
pub fn quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Wraps `path` in double quotes for an sftp batch command.
#[must_use]
pub fn sftp_quote(path: &str) -> String {
    format!("\"{}\"", path.replace('\\', r"\\").replace('"', "\\\""))
}

/// Reduces a client name to characters safe in a local file name.
#[must_use]
pub fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() { "client".to_string() } else { stem }
}
