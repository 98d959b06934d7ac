use crate::error::MailError;
use crate::message::{FetchedEmail, OutboundEmail};
use async_trait::async_trait;

#[async_trait]
pub trait MailFetcher: Send + Sync {
    /// Connects/Authenticates and fetches every message matching the search filter.
    /// An empty vector means nothing matched; failures are always `Err`.
    async fn fetch_unseen(&self) -> Result<Vec<FetchedEmail>, MailError>;
}

#[async_trait]
pub trait MailSender: Send + Sync {
    /// Submits one plain-text message to its single recipient
    async fn send_email(&self, email: &OutboundEmail) -> Result<(), MailError>;
}
