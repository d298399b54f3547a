//! Colors for human output.

use owo_colors::Style;

/// Stylesheet shared by every human renderer.
///
/// All styles are plain until [`Styles::colorize`] is called, which keeps
/// piped output and `--no-color` free of escape codes.
#[derive(Default, Clone)]
pub struct Styles {
    /// Completed changes and open servers
    pub success: Style,
    /// Stray clients and other findings worth a look
    pub warning: Style,
    /// Failures and full servers
    pub error: Style,
    pub info: Style,
    /// Labels, disabled clients and inactive servers
    pub dim: Style,
    /// Server names
    pub header: Style,
    /// Links and client files meant to be copied
    pub secret: Style,
}

impl Styles {
    pub fn colorize(&mut self) {
        self.success = Style::new().green();
        self.warning = Style::new().yellow();
        self.error = Style::new().red();
        self.info = Style::new().blue();
        self.dim = Style::new().dimmed();
        self.header = Style::new().bold().cyan();
        self.secret = Style::new().bold().magenta();
    }
}
