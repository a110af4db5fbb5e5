use std::error::Error;
use std::fmt;
use std::process::Command;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::domain::item::SchedulableItem;
use crate::domain::kind::ItemKind;

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub body: String,
    /// Repeated alerts for one item share a tag so they replace each other.
    pub dedupe_tag: String,
}

impl Alert {
    pub fn for_item(kind: ItemKind, item: &SchedulableItem) -> Self {
        let mut body = format!("{} • {}", item.title, display_instant(item.start_at));
        if let Some(end) = item.end_at {
            body.push_str(" – ");
            body.push_str(&display_instant(end));
        }
        Self {
            title: kind.alert_title().to_string(),
            body,
            dedupe_tag: kind.dedupe_tag(&item.id),
        }
    }
}

fn display_instant(instant: OffsetDateTime) -> String {
    instant
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_else(|_| instant.to_string())
}

pub trait AlertSink {
    fn raise_alert(&self, alert: &Alert) -> Result<(), AlertError>;
}

#[derive(Debug)]
pub enum AlertError {
    Io(std::io::Error),
    Http(ureq::Error),
    CommandFailed { program: String, status: String },
    Delivery(Vec<String>),
}

impl fmt::Display for AlertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertError::Io(err) => write!(f, "alert I/O error: {}", err),
            AlertError::Http(err) => write!(f, "alert request failed: {}", err),
            AlertError::CommandFailed { program, status } => {
                write!(f, "alert command '{}' exited with {}", program, status)
            }
            AlertError::Delivery(failures) => write!(
                f,
                "alert delivery failed on {} channel(s): {}",
                failures.len(),
                failures.join("; ")
            ),
        }
    }
}

impl Error for AlertError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AlertError::Io(err) => Some(err),
            AlertError::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AlertError {
    fn from(value: std::io::Error) -> Self {
        AlertError::Io(value)
    }
}

impl From<ureq::Error> for AlertError {
    fn from(value: ureq::Error) -> Self {
        AlertError::Http(value)
    }
}

/// Alert delivery channel, configured as `[[channels]]` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Channel {
    #[serde(rename = "log")]
    Log,
    #[serde(rename = "ntfy")]
    Ntfy {
        url: String,
        #[serde(default)]
        priority: Option<String>,
    },
    #[serde(rename = "webhook")]
    Webhook { url: String },
    /// Runs a program; `{title}`, `{body}` and `{tag}` in args are substituted.
    #[serde(rename = "command")]
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl Channel {
    pub fn display_name(&self) -> String {
        match self {
            Channel::Log => "log".to_string(),
            Channel::Ntfy { url, .. } => format!("ntfy({})", url),
            Channel::Webhook { url } => format!("webhook({})", url),
            Channel::Command { program, .. } => format!("command({})", program),
        }
    }
}

/// Fans an alert out to every configured channel.
#[derive(Clone)]
pub struct ChannelSink {
    channels: Vec<Channel>,
    agent: ureq::Agent,
}

impl ChannelSink {
    pub fn new(channels: Vec<Channel>) -> Self {
        let channels = if channels.is_empty() {
            vec![Channel::Log]
        } else {
            channels
        };
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(HTTP_TIMEOUT))
            .build()
            .new_agent();
        Self { channels, agent }
    }

    #[cfg(test)]
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Sends a test alert everywhere. Returns per-channel results for display.
    pub fn test_channels(&self) -> Vec<(String, Result<(), String>)> {
        let alert = Alert {
            title: "Agenda".to_string(),
            body: "agenda-notify test alert: notifications are working".to_string(),
            dedupe_tag: "agenda-notify-test".to_string(),
        };
        self.channels
            .iter()
            .map(|channel| {
                let result = self.send(channel, &alert).map_err(|err| err.to_string());
                (channel.display_name(), result)
            })
            .collect()
    }

    fn send(&self, channel: &Channel, alert: &Alert) -> Result<(), AlertError> {
        match channel {
            Channel::Log => {
                info!(
                    title = %alert.title,
                    body = %alert.body,
                    tag = %alert.dedupe_tag,
                    "alert"
                );
                Ok(())
            }
            Channel::Ntfy { url, priority } => {
                self.agent
                    .post(url)
                    .header("Title", &alert.title)
                    .header("Tags", &alert.dedupe_tag)
                    .header("Priority", priority.as_deref().unwrap_or("high"))
                    .send(alert.body.as_str())?;
                Ok(())
            }
            Channel::Webhook { url } => {
                let payload = serde_json::json!({
                    "title": alert.title,
                    "body": alert.body,
                    "tag": alert.dedupe_tag,
                });
                self.agent
                    .post(url)
                    .header("Content-Type", "application/json")
                    .send(payload.to_string())?;
                Ok(())
            }
            Channel::Command { program, args } => {
                let status = Command::new(program)
                    .args(args.iter().map(|arg| substitute(arg, alert)))
                    .status()?;
                if status.success() {
                    Ok(())
                } else {
                    Err(AlertError::CommandFailed {
                        program: program.clone(),
                        status: status.to_string(),
                    })
                }
            }
        }
    }
}

impl AlertSink for ChannelSink {
    fn raise_alert(&self, alert: &Alert) -> Result<(), AlertError> {
        let mut failures = Vec::new();
        for channel in &self.channels {
            if let Err(err) = self.send(channel, alert) {
                let name = channel.display_name();
                warn!(channel = %name, error = %err, "alert channel failed");
                failures.push(format!("{}: {}", name, err));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(AlertError::Delivery(failures))
        }
    }
}

fn substitute(template: &str, alert: &Alert) -> String {
    template
        .replace("{title}", &alert.title)
        .replace("{body}", &alert.body)
        .replace("{tag}", &alert.dedupe_tag)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::{substitute, Alert, AlertError, AlertSink, Channel, ChannelSink};
    use crate::domain::item::SchedulableItem;
    use crate::domain::kind::ItemKind;
    use crate::domain::status::ItemStatus;

    fn item(end: Option<time::OffsetDateTime>) -> SchedulableItem {
        SchedulableItem {
            id: "42".to_string(),
            title: "Dentist".to_string(),
            start_at: datetime!(2025-01-10 10:00 UTC),
            end_at: end,
            lead_minutes: 15,
            repeat_minutes: 0,
            status: ItemStatus::Pending,
        }
    }

    #[test]
    fn alert_text_names_kind_title_and_times() {
        let alert = Alert::for_item(ItemKind::Appointment, &item(None));
        assert_eq!(alert.title, "Appointment");
        assert_eq!(alert.body, "Dentist • 2025-01-10 10:00");
        assert_eq!(alert.dedupe_tag, "appointment-42");

        let alert = Alert::for_item(
            ItemKind::Event,
            &item(Some(datetime!(2025-01-10 11:30 UTC))),
        );
        assert_eq!(alert.title, "Event");
        assert_eq!(alert.body, "Dentist • 2025-01-10 10:00 – 2025-01-10 11:30");
        assert_eq!(alert.dedupe_tag, "event-42");
    }

    #[test]
    fn channels_deserialize_from_tagged_entries() {
        let raw = r#"[
            {"type":"log"},
            {"type":"ntfy","url":"https://ntfy.sh/agenda"},
            {"type":"webhook","url":"http://localhost:9000/hook"},
            {"type":"command","program":"notify-send","args":["{title}","{body}"]}
        ]"#;
        let channels: Vec<Channel> = serde_json::from_str(raw).expect("channels parse");
        assert_eq!(channels.len(), 4);
        assert!(matches!(&channels[1], Channel::Ntfy { priority: None, .. }));
        assert_eq!(channels[3].display_name(), "command(notify-send)");
    }

    #[test]
    fn empty_channel_list_falls_back_to_log() {
        let sink = ChannelSink::new(Vec::new());
        assert_eq!(sink.channels(), &[Channel::Log]);
        let alert = Alert::for_item(ItemKind::Event, &item(None));
        assert!(sink.raise_alert(&alert).is_ok());
    }

    #[test]
    fn placeholders_are_substituted() {
        let alert = Alert::for_item(ItemKind::Event, &item(None));
        assert_eq!(
            substitute("[{tag}] {title}: {body}", &alert),
            "[event-42] Event: Dentist • 2025-01-10 10:00"
        );
    }

    #[test]
    fn failing_channel_is_reported_while_others_still_run() {
        let sink = ChannelSink::new(vec![
            Channel::Command {
                program: "agenda-notify-no-such-program".to_string(),
                args: Vec::new(),
            },
            Channel::Log,
        ]);
        let alert = Alert::for_item(ItemKind::Event, &item(None));
        let err = sink.raise_alert(&alert).expect_err("missing program fails");
        match err {
            AlertError::Delivery(failures) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].starts_with("command(agenda-notify-no-such-program)"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let results = sink.test_channels();
        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_err());
        assert!(results[1].1.is_ok());
    }
}
