use tracing::warn;

/// Fire-and-forget, best-effort user notification.
///
/// One sink is constructed at wiring time and shared by `Arc` with the
/// components that need it; nothing is globally reachable.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Notification sink that writes to the log.
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        warn!("{}: {}", title, body);
    }
}
