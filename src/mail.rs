use reqwest::blocking::Client;
use url::Url;

use crate::error::DashResult;

/// One outgoing message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Mail {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

pub trait Mailer: Send + Sync {
    fn send(&self, mail: &Mail) -> DashResult<()>;
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    body: &'a str,
}

/// Hands messages to an HTTP mail relay.
pub struct RelayMailer {
    client: Client,
    relay: Url,
    from: String,
}

impl RelayMailer {
    pub fn new(relay: Url, from: String) -> Self {
        RelayMailer {
            client: Client::new(),
            relay,
            from,
        }
    }
}

impl Mailer for RelayMailer {
    fn send(&self, mail: &Mail) -> DashResult<()> {
        if mail.to.is_empty() {
            debug!("skipping \"{}\", no recipients", mail.subject);
            return Ok(());
        }

        let message = RelayMessage {
            from: &self.from,
            to: &mail.to,
            subject: &mail.subject,
            body: &mail.body,
        };
        self.client
            .post(self.relay.clone())
            .json(&message)
            .send()?
            .error_for_status()?;

        info!("sent \"{}\" to {} recipient(s)", mail.subject, mail.to.len());
        Ok(())
    }
}

/// Used when no relay is configured.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: &Mail) -> DashResult<()> {
        info!(
            "mail relay not configured, would send \"{}\" to {:?}:\n{}",
            mail.subject, mail.to, mail.body
        );
        Ok(())
    }
}
