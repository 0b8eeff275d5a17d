use crate::error::NotifyError;
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::{path::PathBuf, process::Command, time::Duration};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Never asked.
    Default,
    Granted,
    Denied,
}

impl Permission {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Permission::Default => 0,
            Permission::Granted => 1,
            Permission::Denied => 2,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => Permission::Granted,
            2 => Permission::Denied,
            _ => Permission::Default,
        }
    }
}

/// Everything a backend needs to present one alert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub body: String,
    pub icon: Option<PathBuf>,
    pub badge: Option<PathBuf>,
    /// Alerts sharing a tag replace each other.
    pub tag: Option<String>,
    /// Keep the alert on screen until the user interacts with it.
    pub require_interaction: bool,
    /// Opened when the user clicks the alert; the alert is dismissed afterwards.
    pub click_url: Option<String>,
    /// When the notifier will close the alert on its own.
    pub dismiss_after: Duration,
}

pub trait AlertHandle: Send + Sync {
    /// Best effort. Backends whose alerts expire on their own may ignore it.
    fn close(&self);
}

/// The host's notification presentation subsystem.
pub trait NotificationCenter: Send + Sync {
    fn is_supported(&self) -> bool;

    fn permission(&self) -> Permission;

    /// Asks the user. May block until they answer.
    fn request_permission(&self) -> Permission;

    fn show(&self, alert: &Alert) -> Result<Box<dyn AlertHandle>, NotifyError>;
}

pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), NotifyError>;
}

/// Hands URLs to whatever the desktop has registered for their scheme.
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    /// Blocks until the launcher exits.
    fn open(&self, url: &str) -> Result<(), NotifyError> {
        // Not `cmd /C start`: cmd would split the query string at '&'.
        #[cfg(target_os = "windows")]
        let mut launcher = {
            let mut cmd = Command::new("rundll32");
            cmd.args(["url.dll,FileProtocolHandler", url]);
            cmd
        };
        #[cfg(target_os = "macos")]
        let mut launcher = {
            let mut cmd = Command::new("open");
            cmd.arg(url);
            cmd
        };
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let mut launcher = {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(url);
            cmd
        };

        run_launcher(&mut launcher, url)
    }
}

fn run_launcher(launcher: &mut Command, url: &str) -> Result<(), NotifyError> {
    let dispatch_error = |reason: String| NotifyError::Dispatch {
        url: url.to_string(),
        reason,
    };
    let status = launcher.status().map_err(|e| dispatch_error(e.to_string()))?;
    if !status.success() {
        return Err(dispatch_error(format!("launcher exited with {status}")));
    }
    Ok(())
}

pub trait Clock: Send + Sync {
    /// Local wall-clock time.
    fn local_now(&self) -> NaiveDateTime;

    fn until_next_midnight(&self) -> Duration;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn until_next_midnight(&self) -> Duration {
        crate::schedule::duration_until_next_midnight(&Local::now())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn launcher_is_waited_for_and_its_exit_checked() {
        assert!(run_launcher(&mut Command::new("true"), "tel:+2347068071343").is_ok());

        let err = run_launcher(&mut Command::new("false"), "tel:+2347068071343").unwrap_err();
        assert!(matches!(err, NotifyError::Dispatch { ref url, .. } if url == "tel:+2347068071343"));

        let err = run_launcher(
            &mut Command::new("/nonexistent/food-notifier-launcher"),
            "https://wa.me/+2347068071343",
        )
        .unwrap_err();
        assert_eq!(err.code(), "dispatch_failed");
    }

    #[test]
    fn permission_round_trips_through_storage() {
        for p in [Permission::Default, Permission::Granted, Permission::Denied] {
            assert_eq!(Permission::from_u8(p.to_u8()), p);
        }
    }
}
