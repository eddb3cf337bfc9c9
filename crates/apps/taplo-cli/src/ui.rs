use crossterm::style::{Color, Stylize};

/// Terminal output for human-facing messages.
///
/// Everything goes to stderr: stdout is reserved for converted documents so
/// the relay commands compose with pipes.
#[derive(Debug, Clone)]
pub struct Layout {
    accent: Color,
    text: Color,
    muted: Color,
    success: Color,
    warning: Color,
    error: Color,
    info: Color,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new()
    }
}

impl Layout {
    pub fn new() -> Self {
        Self {
            accent: Color::Magenta,
            text: Color::White,
            muted: Color::DarkGrey,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
        }
    }

    pub fn header_dashboard(&self, title: &str) {
        eprintln!();
        eprintln!("  {}", title.to_uppercase().with(self.info).bold());
        let bar = "━".repeat(title.len() + 4);
        eprintln!("  {}", bar.with(self.info));
        eprintln!("{}", "│".with(self.text));
    }

    pub fn section_timeline(&self, code: &str, title: &str) {
        eprintln!(
            "{}╭┄ {} [{}]",
            "│".with(self.text),
            code.with(self.accent).bold(),
            title.with(self.text).bold()
        );
    }

    pub fn section_end(&self) {
        eprintln!("{}", "├╯".with(self.text));
        eprintln!("{}", "│".with(self.text));
    }

    pub fn row_labeled(&self, icon: &str, label: &str, value: &str) {
        eprintln!(
            "{} {} {} {}",
            "│".with(self.text),
            icon.with(self.text),
            label.with(self.muted),
            value.with(self.text).bold()
        );
    }

    /// Numbered picker entry: `[n] trigger  annotation` with details on the next line.
    pub fn row_choice(&self, index: usize, trigger: &str, annotation: &str, details: &str) {
        eprintln!(
            "{}  {} {}  {}",
            "┊".with(self.text),
            format!("[{}]", index).with(self.accent).bold(),
            trigger.with(self.text).bold(),
            annotation.with(self.muted)
        );
        if !details.is_empty() {
            eprintln!("{}      {}", "┊".with(self.text), details.with(self.muted));
        }
    }

    pub fn prompt(&self, message: &str) {
        eprint!("{} {} ", "?".with(self.accent).bold(), message.with(self.text));
    }

    pub fn success(&self, message: &str) {
        self.line("✓", message, self.success);
    }

    pub fn warning(&self, message: &str) {
        self.line("⚠", message, self.warning);
    }

    pub fn error(&self, message: &str) {
        for (i, line) in message.lines().enumerate() {
            self.line(if i == 0 { "✗" } else { " " }, line, self.error);
        }
    }

    pub fn info(&self, message: &str) {
        self.line("ℹ", message, self.info);
    }

    fn line(&self, icon: &str, message: &str, color: Color) {
        eprintln!(
            "{}   {} {}",
            "┊".with(self.text),
            icon.with(color),
            message.with(color)
        );
    }
}
