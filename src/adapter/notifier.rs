//! Notifier that writes user notifications to the log.

use tracing::{error, info, warn};

use crate::port::{Notification, NotificationLevel, Notifier};

/// Logs every notification at a level matching its severity.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        let message = notification.message.as_str();
        match notification.level {
            NotificationLevel::Success | NotificationLevel::Info => {
                info!(level = %notification.level, message, "Notification");
            }
            NotificationLevel::Warning => warn!(message, "Notification"),
            NotificationLevel::Error => error!(message, "Notification"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::NotifierRegistry;

    #[test]
    fn test_log_notifier_accepts_every_level() {
        let mut registry = NotifierRegistry::new();
        registry.register(Box::new(LogNotifier));

        registry.notify(Notification::success("Property added"));
        registry.notify(Notification::info("Showing cached data"));
        registry.notify(Notification::warning("Slow backend"));
        registry.notify(Notification::error("No internet connection"));

        assert_eq!(registry.len(), 1);
    }
}
