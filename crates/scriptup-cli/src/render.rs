use std::io::IsTerminal;

use anstyle::{AnsiColor, Style};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl StatusLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "ok",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }

    fn style(self) -> Style {
        let color = match self {
            Self::Info => AnsiColor::Cyan,
            Self::Success => AnsiColor::Green,
            Self::Warning => AnsiColor::Yellow,
            Self::Error => AnsiColor::Red,
        };
        Style::new().bold().fg_color(Some(color.into()))
    }
}

pub fn current_output_style() -> OutputStyle {
    if std::env::var_os("NO_COLOR").is_some() || !std::io::stdout().is_terminal() {
        OutputStyle::Plain
    } else {
        OutputStyle::Rich
    }
}

pub fn render_status_line(style: OutputStyle, level: StatusLevel, message: &str) -> String {
    match style {
        OutputStyle::Plain => format!("[{}] {message}", level.label()),
        OutputStyle::Rich => {
            let ansi = level.style();
            format!(
                "{}[{}]{} {message}",
                ansi.render(),
                level.label(),
                ansi.render_reset()
            )
        }
    }
}

pub fn print_status(level: StatusLevel, message: &str) {
    println!(
        "{}",
        render_status_line(current_output_style(), level, message)
    );
}
