//! JSON output helpers.
//!
//! Every `--json` result is a single pretty-printed object on stdout; a
//! failure is the error object produced by [`format_error`].

use anyhow::{Context, Result};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::{Value, json};

use crate::application::services::IssuedCredential;

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Result object for `add`. The AmneziaWG private key is included only when
/// `show_private_key` is set.
#[must_use]
pub fn issued_value(server: &str, issued: &IssuedCredential, show_private_key: bool) -> Value {
    let mut value = json!({ "server": server, "issued": issued });
    if let (true, Some(key)) = (show_private_key, issued.private_key()) {
        value["issued"]["private_key"] = Value::String(key.expose_secret().to_string());
    }
    value
}

/// Writes command results as JSON to stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    /// Print `value` pretty-printed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let text = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
        println!("{text}");
        Ok(())
    }
}
