//! Desktop notification backends: Windows toasts and freedesktop notifications.

use crate::error::NotifyError;
use crate::platform::{Alert, AlertHandle, NotificationCenter, Permission, UrlOpener};
use std::{
    io::{BufRead, IsTerminal, Write},
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Mutex,
    },
};
use tracing::info;

const APP_NAME: &str = "Gracious Fast Food";

pub struct DesktopNotifications {
    permission: AtomicU8,
    #[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(dead_code))]
    opener: Arc<dyn UrlOpener>,
}

impl DesktopNotifications {
    pub fn new(initial: Permission, opener: Arc<dyn UrlOpener>) -> Self {
        Self {
            permission: AtomicU8::new(initial.to_u8()),
            opener,
        }
    }
}

/// Toasts expire on their own; the toast API has no way to withdraw one.
#[cfg(windows)]
struct ExpiringAlert;

#[cfg(windows)]
impl AlertHandle for ExpiringAlert {
    fn close(&self) {}
}

/// Shared slot for a shown alert. Whoever takes it first closes it.
#[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(dead_code))]
struct DismissOnce<H>(Arc<Mutex<Option<H>>>);

#[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(dead_code))]
impl<H> DismissOnce<H> {
    fn new(handle: H) -> Self {
        Self(Arc::new(Mutex::new(Some(handle))))
    }

    fn take(&self) -> Option<H> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl<H> Clone for DismissOnce<H> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
impl AlertHandle for DismissOnce<notify_rust::NotificationHandle> {
    fn close(&self) {
        if let Some(handle) = self.take() {
            handle.close();
        }
    }
}

/// Builds the freedesktop notification for `alert`.
#[cfg(all(unix, not(target_os = "macos")))]
fn freedesktop_notification(alert: &Alert) -> notify_rust::Notification {
    use notify_rust::{Notification, Timeout, Urgency};

    let mut n = Notification::new();
    n.appname(APP_NAME).summary(&alert.title).body(&alert.body);
    if alert.require_interaction {
        // Stays up until clicked or closed by the notifier.
        n.urgency(Urgency::Critical).timeout(Timeout::Never);
    } else {
        n.timeout(Timeout::Milliseconds(
            alert.dismiss_after.as_millis().min(u32::MAX as u128) as u32,
        ));
    }
    if let Some(icon) = alert.icon.as_ref().or(alert.badge.as_ref()) {
        n.icon(&icon.to_string_lossy());
    }
    if alert.click_url.is_some() {
        n.action("default", "Call");
    }
    n
}

impl NotificationCenter for DesktopNotifications {
    fn is_supported(&self) -> bool {
        cfg!(any(windows, all(unix, not(target_os = "macos"))))
    }

    fn permission(&self) -> Permission {
        Permission::from_u8(self.permission.load(Ordering::SeqCst))
    }

    fn request_permission(&self) -> Permission {
        let current = self.permission();
        if current != Permission::Default {
            return current;
        }

        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            info!("no terminal to ask for notification permission; leaving it undecided");
            return Permission::Default;
        }

        let mut stdout = std::io::stdout();
        let _ = write!(
            stdout,
            "Allow food-ready notifications from {APP_NAME}? [y/N] "
        );
        let _ = stdout.flush();

        let mut answer = String::new();
        let decided = match stdin.lock().read_line(&mut answer) {
            Ok(_) if matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") => {
                Permission::Granted
            }
            Ok(_) => Permission::Denied,
            Err(_) => return Permission::Default,
        };
        self.permission.store(decided.to_u8(), Ordering::SeqCst);
        decided
    }

    #[cfg(windows)]
    fn show(&self, alert: &Alert) -> Result<Box<dyn AlertHandle>, NotifyError> {
        use win_toast_notify::{Duration, Scenario, WinToastNotify};

        tracing::debug!(tag = alert.tag.as_deref().unwrap_or("-"), "toast: {}", alert.title);

        let lines: Vec<&str> = alert.body.lines().filter(|l| !l.trim().is_empty()).collect();
        let mut toast = WinToastNotify::new()
            .set_duration(Duration::Long)
            .set_title(alert.title.as_str())
            .set_messages(lines);
        if alert.require_interaction {
            toast = toast.set_scenario(Scenario::Reminder);
        }
        if let Some(url) = alert.click_url.as_deref() {
            toast = toast.set_open(url);
        }
        if toast.show().is_err() {
            return Err(NotifyError::Presentation("toast rejected".to_string()));
        }
        Ok(Box::new(ExpiringAlert))
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    fn show(&self, alert: &Alert) -> Result<Box<dyn AlertHandle>, NotifyError> {
        tracing::debug!(tag = alert.tag.as_deref().unwrap_or("-"), "notification: {}", alert.title);

        let handle = freedesktop_notification(alert)
            .show()
            .map_err(|e| NotifyError::Presentation(e.to_string()))?;
        let id = handle.id();
        let shown = DismissOnce::new(handle);

        if let Some(url) = alert.click_url.clone() {
            let opener = self.opener.clone();
            let clicked = shown.clone();
            // Returns once the alert is clicked or closed by anyone.
            std::thread::spawn(move || {
                notify_rust::handle_action(id, move |action: &str| {
                    if action == "default" {
                        if let Err(e) = opener.open(&url) {
                            tracing::error!("{e}");
                        }
                        clicked.close();
                    }
                });
            });
        }
        Ok(Box::new(shown))
    }

    #[cfg(not(any(windows, all(unix, not(target_os = "macos")))))]
    fn show(&self, _alert: &Alert) -> Result<Box<dyn AlertHandle>, NotifyError> {
        Err(NotifyError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dismiss_once_hands_out_the_handle_a_single_time() {
        let shown = DismissOnce::new(7u32);
        let clicked = shown.clone();
        assert_eq!(clicked.take(), Some(7));
        assert_eq!(shown.take(), None);
        assert_eq!(clicked.take(), None);
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    mod freedesktop {
        use super::*;
        use crate::platform::Alert;
        use notify_rust::{Hint, Timeout, Urgency};
        use std::time::Duration;

        fn alert(require_interaction: bool) -> Alert {
            Alert {
                title: "Food is ready!".to_string(),
                body: "Fresh food is ready.".to_string(),
                icon: None,
                badge: None,
                tag: Some("food-ready".to_string()),
                require_interaction,
                click_url: Some("tel:+2347068071343".to_string()),
                dismiss_after: Duration::from_secs(15),
            }
        }

        #[test]
        fn interaction_alert_is_critical_and_never_times_out() {
            let n = freedesktop_notification(&alert(true));
            assert_eq!(n.timeout, Timeout::Never);
            assert!(n.hints.contains(&Hint::Urgency(Urgency::Critical)));
            // Resident would keep it on screen after the click.
            assert!(!n.hints.contains(&Hint::Resident(true)));
            assert_eq!(n.actions, vec!["default".to_string(), "Call".to_string()]);
        }

        #[test]
        fn passive_alert_expires_with_the_dismiss_delay() {
            let n = freedesktop_notification(&alert(false));
            assert_eq!(n.timeout, Timeout::Milliseconds(15_000));
            assert!(!n.hints.contains(&Hint::Urgency(Urgency::Critical)));
        }
    }
}
