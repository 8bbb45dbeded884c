use async_trait::async_trait;
use tracing::info;

use crate::{tokens::IssuedToken, users::User};

/// Delivers activation instructions to a newly registered user.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_activation(&self, user: &User, token: &IssuedToken) -> anyhow::Result<()>;
}

/// Development mailer: writes the delivery to the log instead of an SMTP relay.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_activation(&self, user: &User, token: &IssuedToken) -> anyhow::Result<()> {
        info!(
            user_id = user.id,
            to = %user.email,
            activation_token = token.plaintext(),
            expiry = %token.expiry(),
            "activation email"
        );
        Ok(())
    }
}

#[cfg(test)]
pub use recording::RecordingMailer;
