use crate::audio::{self, AudioOutput, FOOD_READY_CUE};
use crate::error::NotifyError;
use crate::platform::{Alert, AlertHandle, Clock, NotificationCenter, Permission};
use crate::restaurant::{call_url, RestaurantInfo};
use crate::schedule::{scheduled_slot, NotifiedRegistry, SlotTime, FOOD_TIMES};
use crate::status::{StatusDisplay, StatusKind};
use serde::Serialize;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::{
    sync::Mutex,
    time::{interval, sleep, MissedTickBehavior},
};
use tracing::{error, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Uninitialized,
    AwaitingPermission,
    Active,
}

/// Delays and cadences of the notifier.
#[derive(Clone, Copy, Debug)]
pub struct Timing {
    pub check_every: Duration,
    pub alert_dismiss: Duration,
    pub test_alert_dismiss: Duration,
    pub test_alert_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            check_every: Duration::from_secs(60),
            alert_dismiss: Duration::from_secs(15),
            test_alert_dismiss: Duration::from_secs(10),
            test_alert_delay: Duration::from_secs(1),
        }
    }
}

/// Platform capabilities the notifier drives.
#[derive(Clone)]
pub struct Ports {
    pub notifications: Arc<dyn NotificationCenter>,
    pub audio: Arc<dyn AudioOutput>,
    pub status: Arc<dyn StatusDisplay>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    /// Permission was just granted; the test alert follows after a short delay.
    Enabled,
    /// Permission was already granted; the test alert is on screen.
    Shown,
}

struct Inner {
    phase: Phase,
    monitoring: bool,
    notified: NotifiedRegistry,
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub phase: Phase,
    pub monitoring: bool,
    pub notified_today: Vec<SlotTime>,
}

pub struct Notifier {
    ports: Ports,
    info: RestaurantInfo,
    icon: Option<PathBuf>,
    timing: Timing,
    inner: Mutex<Inner>,
}

impl Notifier {
    pub fn new(ports: Ports, info: RestaurantInfo, icon: Option<PathBuf>, timing: Timing) -> Self {
        Self {
            ports,
            info,
            icon,
            timing,
            inner: Mutex::new(Inner {
                phase: Phase::Uninitialized,
                monitoring: false,
                notified: NotifiedRegistry::default(),
            }),
        }
    }

    pub async fn snapshot(&self) -> Snapshot {
        let inner = self.inner.lock().await;
        Snapshot {
            phase: inner.phase,
            monitoring: inner.monitoring,
            notified_today: inner.notified.slots().collect(),
        }
    }

    /// Startup check. Returns whether monitoring is now running.
    pub async fn initialize(self: &Arc<Self>) -> bool {
        let status = &self.ports.status;
        if !self.ports.notifications.is_supported() {
            status.update(StatusKind::Error, "Your system does not support notifications");
            return false;
        }

        match self.ports.notifications.permission() {
            Permission::Default => {
                self.inner.lock().await.phase = Phase::AwaitingPermission;
                status.update(
                    StatusKind::Info,
                    "Click \"Test Notification\" to enable food alerts",
                );
                false
            }
            Permission::Granted => {
                self.inner.lock().await.phase = Phase::Active;
                self.start_monitoring().await;
                status.update(
                    StatusKind::Success,
                    "Food notifications are active! You'll be alerted when food is ready.",
                );
                true
            }
            Permission::Denied => {
                status.update(
                    StatusKind::Error,
                    "Notifications blocked. Please enable in system settings.",
                );
                false
            }
        }
    }

    /// Checks now, then every `check_every`, and clears the registry at each
    /// local midnight. Later calls do nothing.
    pub async fn start_monitoring(self: &Arc<Self>) {
        {
            let mut inner = self.inner.lock().await;
            if inner.monitoring {
                return;
            }
            inner.monitoring = true;
        }

        self.check_food_time().await;

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticks = interval(this.timing.check_every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticks.tick().await;
            loop {
                ticks.tick().await;
                this.check_food_time().await;
            }
        });

        let this = Arc::clone(self);
        tokio::spawn(async move { this.daily_reset_loop().await });

        info!("food notification monitor started");
    }

    /// One-shot sleeps, each recomputed from the clock, so DST days still
    /// reset at midnight.
    async fn daily_reset_loop(&self) {
        loop {
            sleep(self.ports.clock.until_next_midnight()).await;
            self.inner.lock().await.notified.clear();
            info!("daily notification reset completed");
        }
    }

    /// Alerts if the current minute is a food time not yet alerted today.
    pub async fn check_food_time(&self) {
        let now = SlotTime::from_local(&self.ports.clock.local_now());
        let Some(slot) = scheduled_slot(now) else {
            return;
        };

        if !self.inner.lock().await.notified.mark(slot) {
            return;
        }
        self.show_notification().await;
        info!("food notification sent for {slot}");
    }

    /// Presents the food-ready alert if notifications are active.
    pub async fn show_notification(&self) {
        if self.inner.lock().await.phase != Phase::Active {
            return;
        }

        let alert = self.food_ready_alert();
        let dismiss_after = alert.dismiss_after;
        match self.ports.notifications.show(&alert) {
            Ok(handle) => {
                audio::play_cue(Arc::clone(&self.ports.audio), FOOD_READY_CUE);
                schedule_close(handle, dismiss_after);
            }
            Err(e) => error!("{e}"),
        }
    }

    /// The manual "Test Notification" action.
    ///
    /// Errors are meant to be shown to the user as-is.
    pub async fn test_notification(self: &Arc<Self>) -> Result<TestOutcome, NotifyError> {
        let center = &self.ports.notifications;
        if !center.is_supported() {
            return Err(NotifyError::Unsupported);
        }

        match center.permission() {
            Permission::Default => {
                let asked = Arc::clone(center);
                let decided = tokio::task::spawn_blocking(move || asked.request_permission())
                    .await
                    .unwrap_or(Permission::Default);

                if decided != Permission::Granted {
                    self.ports.status.update(
                        StatusKind::Error,
                        "Notifications blocked. Please allow to receive food alerts.",
                    );
                    return Err(NotifyError::PermissionDenied);
                }

                self.inner.lock().await.phase = Phase::Active;
                self.start_monitoring().await;
                self.ports.status.update(
                    StatusKind::Success,
                    "Notifications enabled! Testing food alert...",
                );

                let this = Arc::clone(self);
                tokio::spawn(async move {
                    sleep(this.timing.test_alert_delay).await;
                    if let Err(e) = this.show_test_notification() {
                        error!("{e}");
                    }
                });
                Ok(TestOutcome::Enabled)
            }
            Permission::Granted => {
                self.show_test_notification()?;
                Ok(TestOutcome::Shown)
            }
            Permission::Denied => Err(NotifyError::PermissionDenied),
        }
    }

    fn show_test_notification(&self) -> Result<(), NotifyError> {
        let alert = self.test_alert();
        let dismiss_after = alert.dismiss_after;
        let handle = self.ports.notifications.show(&alert)?;
        schedule_close(handle, dismiss_after);
        Ok(())
    }

    fn food_ready_alert(&self) -> Alert {
        let phone = self.info.phone;
        Alert {
            title: "🍽️ GRACIOUS FAST FOOD - FOOD IS READY!".to_string(),
            body: format!(
                "🎯 You can call {phone} now to make enquiry or place your order.\n\n\
                 📞 Call: {phone}\n\
                 💬 WhatsApp: {}\n\n\
                 Thanks for your patronage! ❤️",
                self.info.whatsapp
            ),
            icon: self.icon.clone(),
            badge: self.icon.clone(),
            tag: Some("food-ready".to_string()),
            require_interaction: true,
            click_url: Some(call_url(&self.info)),
            dismiss_after: self.timing.alert_dismiss,
        }
    }

    fn test_alert(&self) -> Alert {
        let times: Vec<String> = FOOD_TIMES.iter().map(|t| t.to_twelve_hour()).collect();
        Alert {
            title: "🍽️ GRACIOUS FAST FOOD - TEST NOTIFICATION".to_string(),
            body: format!(
                "✅ Notifications are working perfectly!\n\n\
                 You will receive alerts when food is ready at:\n\
                 • {}\n\
                 • {}\n\n\
                 📞 Call {} to order!",
                times[..3].join(" • "),
                times[3..].join(" • "),
                self.info.phone
            ),
            icon: self.icon.clone(),
            badge: None,
            tag: None,
            require_interaction: true,
            click_url: Some(call_url(&self.info)),
            dismiss_after: self.timing.test_alert_dismiss,
        }
    }
}

fn schedule_close(handle: Box<dyn AlertHandle>, after: Duration) {
    tokio::spawn(async move {
        sleep(after).await;
        handle.close();
    });
}
