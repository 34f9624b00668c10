use anyhow::Result;

use crate::{
    lifecycle::notify::{Notification, Notifier},
    runtime::Runtime,
};

use super::services::Services;

/// Print recorded notifications, oldest first, optionally clearing them
pub fn notifications<R: Runtime + 'static>(services: &Services<R>, clear: bool) -> Result<()> {
    let notifier = services.notifier.as_ref();
    print!("{}", render(&notifier.list()?));
    if clear {
        notifier.clear()?;
    }
    Ok(())
}

pub(crate) fn render(notifications: &[Notification]) -> String {
    if notifications.is_empty() {
        return "No notifications.\n".to_string();
    }
    notifications
        .iter()
        .map(|n| format!("[{}] {}\n", n.level, n.message))
        .collect()
}
