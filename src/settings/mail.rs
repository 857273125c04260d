//! Outbound SMTP configured from the `smtp_*` settings rows.

use std::collections::HashMap;

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use crate::error::ApiError;

pub const SMTP_HOST: &str = "smtp_host";
pub const SMTP_PORT: &str = "smtp_port";
pub const SMTP_USER: &str = "smtp_user";
pub const SMTP_PASSWORD: &str = "smtp_password";
pub const SMTP_SECURITY: &str = "smtp_security";
pub const SMTP_FROM: &str = "smtp_from";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Security {
    /// Implicit TLS, usually port 465.
    Ssl,
    /// STARTTLS upgrade, usually port 587.
    Tls,
    None,
}

impl Security {
    fn parse(value: Option<&str>) -> Result<Self, ApiError> {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("tls") | Some("starttls") => Ok(Security::Tls),
            Some("ssl") => Ok(Security::Ssl),
            Some("none") => Ok(Security::None),
            Some(other) => Err(ApiError::bad_request(format!(
                "Unsupported smtp_security value: {other}"
            ))),
        }
    }

    fn default_port(self) -> u16 {
        match self {
            Security::Ssl => 465,
            Security::Tls => 587,
            Security::None => 25,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub security: Security,
    pub from: String,
}

fn non_empty<'a>(map: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    map.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl SmtpSettings {
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ApiError> {
        let host = non_empty(map, SMTP_HOST)
            .ok_or_else(|| ApiError::bad_request("SMTP is not configured: smtp_host is missing"))?;
        let from = non_empty(map, SMTP_FROM)
            .ok_or_else(|| ApiError::bad_request("SMTP is not configured: smtp_from is missing"))?;
        let security = Security::parse(non_empty(map, SMTP_SECURITY))?;
        let port = match non_empty(map, SMTP_PORT) {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| ApiError::bad_request(format!("Invalid smtp_port: {p}")))?,
            None => security.default_port(),
        };

        Ok(Self {
            host: host.to_string(),
            port,
            user: non_empty(map, SMTP_USER).map(str::to_string),
            password: map.get(SMTP_PASSWORD).filter(|p| !p.is_empty()).cloned(),
            security,
            from: from.to_string(),
        })
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, ApiError> {
        let builder = match self.security {
            Security::Ssl => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host),
            Security::Tls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host),
            Security::None => {
                warn!(host = %self.host, "SMTP transport without TLS");
                Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host))
            }
        }
        .map_err(|e| ApiError::bad_request(format!("Invalid SMTP host: {e}")))?
        .port(self.port);

        let builder = match (&self.user, &self.password) {
            (Some(user), Some(password)) => {
                builder.credentials(Credentials::new(user.clone(), password.clone()))
            }
            _ => builder,
        };
        Ok(builder.build())
    }

    pub fn test_message(&self, to: &str, site_name: &str) -> Result<Message, ApiError> {
        let from = self
            .from
            .parse::<Mailbox>()
            .map_err(|e| ApiError::bad_request(format!("Invalid smtp_from: {e}")))?;
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| ApiError::bad_request(format!("Invalid recipient: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(format!("{site_name} SMTP test"))
            .header(ContentType::TEXT_PLAIN)
            .body(format!(
                "This is a test message from {site_name}. Your SMTP settings are working."
            ))
            .map_err(ApiError::internal)
    }

    /// Transport failures surface as 502.
    pub async fn send(&self, message: Message) -> Result<(), ApiError> {
        let transport = self.transport()?;
        transport.send(message).await.map_err(|e| {
            warn!(host = %self.host, port = self.port, error = %e, "SMTP send failed");
            ApiError::BadGateway(format!("SMTP delivery failed: {e}"))
        })?;
        info!(host = %self.host, port = self.port, "SMTP message sent");
        Ok(())
    }
}
