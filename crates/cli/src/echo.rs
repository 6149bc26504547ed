use owo_colors::OwoColorize;

use ovex_core::{BreakerMetrics, BreakerState, Container, Notification, NotificationKind, Presenter, Source};

use crate::VERSION;

/// Print a styled banner for verbose mode
pub fn print_banner() {
    eprintln!("\n{} {} {}", "ovex".bold().bright_blue(), "v".dimmed(), VERSION.dimmed());
    eprintln!("{}", "Expand, extract and deliver AI overviews\n".dimmed());
}

/// Print a styled step message
pub fn print_step(step: usize, total: usize, message: &str) {
    eprintln!("{} {}", format!("[{}/{}]", step, total).dimmed(), message.bright_cyan());
}

/// Print a success message
pub fn print_success(message: &str) {
    eprintln!("{} {}", "✓".green(), message.bright_green());
}

/// Print an info message
pub fn print_info(message: &str) {
    eprintln!("{} {}", "ℹ".blue(), message.bright_blue());
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.bright_yellow());
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message.bright_red());
}

/// Print extraction details summary
pub fn print_extraction_details(sources: &[Source], search_query: Option<&str>, content_len: usize) {
    eprintln!("\n{}", "═".repeat(60).dimmed());
    eprintln!("{}", "Extraction Details".bold().cyan());
    eprintln!("{}", "═".repeat(60).dimmed());
    if let Some(query) = search_query {
        eprintln!("  {} {}", "Query:".dimmed(), query.bright_white());
    }
    eprintln!("  {} {}", "Content:".dimmed(), format_size(content_len).bright_white());
    eprintln!("  {} {}", "Sources:".dimmed(), sources.len().to_string().bright_white());
    for (i, source) in sources.iter().enumerate() {
        eprintln!("    {} {} {}", format!("{}.", i + 1).dimmed(), source.title, source.url.dimmed());
    }
    eprintln!();
}

/// Print one line per circuit breaker
pub fn print_breakers(breakers: &[BreakerMetrics]) {
    eprintln!("{}", "Circuit Breakers".bold().cyan());
    for breaker in breakers {
        let state = match breaker.state {
            BreakerState::Closed => "CLOSED".green().to_string(),
            BreakerState::HalfOpen => "HALF_OPEN".yellow().to_string(),
            BreakerState::Open => "OPEN".red().to_string(),
        };
        eprintln!(
            "  {:<24} {} {}",
            breaker.module_name,
            state,
            format!("({}/{} failures)", breaker.failures, breaker.max_failures).dimmed()
        );
    }
}

/// Format file size for display
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Shows notifications on stderr.
pub struct TerminalPresenter;

impl Presenter for TerminalPresenter {
    fn notify(&self, notification: &Notification) {
        match notification.kind {
            NotificationKind::Success => print_success(&notification.message),
            NotificationKind::Error => print_error(&notification.message),
        }
    }

    fn offer_manual_extraction(&self, _container: &Container) {
        print_warning("Automation gave up; run `ovex extract` on the snapshot to extract by hand");
    }
}
