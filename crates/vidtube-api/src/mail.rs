//! Outgoing account mail (verification and password reset links).

use tracing::info;

/// A message carrying a one-time link.
#[derive(Debug, Clone)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub link: String,
}

pub trait Mailer {
    fn send(&self, mail: &Mail) -> anyhow::Result<()>;
}

/// Writes mail to the log instead of delivering it.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, mail: &Mail) -> anyhow::Result<()> {
        info!(to = %mail.to, subject = %mail.subject, link = %mail.link, "{}", mail.body);
        Ok(())
    }
}

pub fn verification_mail(to: &str, public_url: &str, token: &str) -> Mail {
    let link = format!("{}/verify-email/{}", public_url.trim_end_matches('/'), token);
    Mail {
        to: to.to_owned(),
        subject: "Verify your email address".into(),
        body: format!("Confirm your email address by opening {link}"),
        link,
    }
}

pub fn password_reset_mail(to: &str, public_url: &str, token: &str) -> Mail {
    let link = format!("{}/reset-password/{}", public_url.trim_end_matches('/'), token);
    Mail {
        to: to.to_owned(),
        subject: "Reset your password".into(),
        body: format!("Choose a new password at {link}. If you did not ask for this, ignore this mail."),
        link,
    }
}
