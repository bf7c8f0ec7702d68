use console::style;
use log::info;

/// Which transition notifications the user wants. Cancellations and manual
/// gates always notify regardless of these toggles.
#[derive(Debug, Clone, Copy)]
pub struct NotificationSettings {
    pub on_success: bool,
    pub on_failure: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            on_success: true,
            on_failure: true,
        }
    }
}

/// Delivery boundary for notifications. Fire-and-forget: delivery failures are
/// the sink's concern, the monitor never depends on a return value.
pub trait NotificationSink: Send + Sync {
    fn send(&self, title: &str, body: &str, link: &str);
}

/// Writes notifications to the terminal, styled, with a copy in the log.
pub struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn send(&self, title: &str, body: &str, link: &str) {
        println!(
            "{} {} {}",
            style(title).bold(),
            body,
            style(link).dim().underlined()
        );
        info!("Notification: {title}: {body} ({link})");
    }
}
