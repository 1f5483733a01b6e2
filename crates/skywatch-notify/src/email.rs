use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use skywatch_protocol::{AlarmEvent, AlarmEventKind};

use crate::error::NotifyError;

const SEND_ATTEMPTS: u32 = 3;

/// Sends alarm transition emails. Without credentials the transport is not
/// built and rendered messages are logged.
pub struct EmailNotifier {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
    to: String,
}

impl EmailNotifier {
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
        to: &str,
    ) -> Result<Self, NotifyError> {
        let transport = match (username, password) {
            (Some(user), Some(pass)) if !user.is_empty() => Some(
                AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
                    .port(smtp_port)
                    .credentials(Credentials::new(user.to_string(), pass.to_string()))
                    .build(),
            ),
            _ => None,
        };
        Ok(Self {
            transport,
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Render and send the notification for one alarm transition.
    pub async fn send_alarm_event(&self, event: &AlarmEvent) -> Result<(), NotifyError> {
        let subject = subject(event);
        let body = body(event);

        let Some(transport) = &self.transport else {
            tracing::info!(subject = %subject, "SMTP not configured, logging notification");
            tracing::info!("{body}");
            return Ok(());
        };

        let email = Message::builder()
            .from(self.from.parse()?)
            .to(self.to.parse()?)
            .subject(&subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        let mut last_err = None;
        for attempt in 1..=SEND_ATTEMPTS {
            match transport.send(email.clone()).await {
                Ok(_) => {
                    tracing::info!(subject = %subject, "notification email sent");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "email send failed, retrying");
                    last_err = Some(e);
                    if attempt < SEND_ATTEMPTS {
                        tokio::time::sleep(std::time::Duration::from_millis(
                            100 * 2u64.pow(attempt - 1),
                        ))
                        .await;
                    }
                }
            }
        }
        match last_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

pub(crate) fn subject(event: &AlarmEvent) -> String {
    match event.kind {
        AlarmEventKind::Triggered => {
            format!("Weather alarm TRIGGERED - {}, {}", event.city, event.zipcode)
        }
        AlarmEventKind::Cleared => {
            format!("Weather alarm CLEARED - {}, {}", event.city, event.zipcode)
        }
    }
}

pub(crate) fn body(event: &AlarmEvent) -> String {
    let alarm_id = event
        .alarm_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    match event.kind {
        AlarmEventKind::Triggered => {
            let value = event
                .value
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string());
            format!(
                "Weather Alarm Triggered\n\
                 =======================\n\n\
                 Location: {city}, {zipcode}\n\
                 Metric: {metric}\n\
                 Current Value: {value}\n\
                 Threshold: {operator} {threshold}\n\
                 Duration: {duration} minutes\n\
                 Start Time: {start}\n\
                 Alarm ID: {alarm_id}\n\n\
                 The {metric} at {city} ({zipcode}) has breached the threshold\n\
                 ({operator} {threshold}) for {duration} minutes.\n",
                city = event.city,
                zipcode = event.zipcode,
                metric = event.metric,
                value = value,
                operator = event.operator,
                threshold = event.threshold,
                duration = event.duration_minutes,
                start = event.start_time.to_rfc3339(),
                alarm_id = alarm_id,
            )
        }
        AlarmEventKind::Cleared => format!(
            "Weather Alarm Cleared\n\
             =====================\n\n\
             Location: {city}, {zipcode}\n\
             Metric: {metric}\n\
             Alarm ID: {alarm_id}\n\n\
             The alarm for {metric} at {city} ({zipcode}) has been cleared.\n\
             The metric has returned to normal levels.\n",
            city = event.city,
            zipcode = event.zipcode,
            metric = event.metric,
            alarm_id = alarm_id,
        ),
    }
}
