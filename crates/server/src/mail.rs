//! Outbound-mail identity.
//!
//! The SMTP relay and sender mailbox are resolved once at startup and shared
//! with whatever needs to send mail. No connection is opened here.

use std::fmt;

use configs::MailConfig;
use lettre::{message::Mailbox, Address, AsyncSmtpTransport, Tokio1Executor};

use crate::errors::StartupError;

pub struct MailIdentity {
    sender: Mailbox,
    relay: String,
    port: u16,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl MailIdentity {
    pub fn from_config(cfg: &MailConfig) -> Result<Self, StartupError> {
        let address: Address = cfg.sender_email.parse().map_err(|e| {
            StartupError::InvalidConfig(format!("mail.sender_email {:?}: {e}", cfg.sender_email))
        })?;
        let name = Some(cfg.sender_name.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        // Port 25 relays are plain SMTP; TLS is left to the relay setup.
        let transport =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(cfg.smtp_host.as_str())
                .port(cfg.smtp_port)
                .build();

        Ok(Self {
            sender: Mailbox::new(name, address),
            relay: cfg.smtp_host.clone(),
            port: cfg.smtp_port,
            transport,
        })
    }

    pub fn sender(&self) -> &Mailbox {
        &self.sender
    }

    pub fn relay(&self) -> (&str, u16) {
        (&self.relay, self.port)
    }

    pub fn transport(&self) -> &AsyncSmtpTransport<Tokio1Executor> {
        &self.transport
    }
}

impl fmt::Debug for MailIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailIdentity")
            .field("sender", &self.sender.to_string())
            .field("relay", &self.relay)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}
