use crate::config::{AccountConfig, ImapConfig};
use crate::error::MailError;
use crate::message::FetchedEmail;
use crate::traits::MailFetcher;
use async_imap::Session;
use async_native_tls::{TlsConnector, TlsStream};
use async_trait::async_trait;
use futures::{StreamExt, pin_mut};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

type ImapSession = Session<TlsStream<Compat<TcpStream>>>;

// Abstract the selected-mailbox session so the fetch flow can be mocked
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailboxSession: Send {
    async fn select(&mut self, folder: &str) -> Result<(), MailError>;

    /// Sequence numbers matching `query`, in no particular order
    async fn search(&mut self, query: &str) -> Result<Vec<u32>, MailError>;

    /// Full RFC822 content of one message, `None` if the server sent no body
    async fn fetch_rfc822(&mut self, sequence: u32) -> Result<Option<Vec<u8>>, MailError>;

    async fn logout(&mut self) -> Result<(), MailError>;
}

// Factory trait: opens and authenticates a session
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailboxConnector: Send + Sync {
    async fn connect(
        &self,
        config: &ImapConfig,
        account: &AccountConfig,
    ) -> Result<Box<dyn MailboxSession>, MailError>;
}

async fn bounded<T, F>(timeout: Option<Duration>, what: &str, fut: F) -> Result<T, MailError>
where
    F: Future<Output = Result<T, MailError>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            MailError::Connection(format!("{} timed out after {:?}", what, limit))
        })?,
        None => fut.await,
    }
}

fn imap_error(context: &str, e: async_imap::error::Error) -> MailError {
    use async_imap::error::Error;

    match e {
        Error::Io(_) | Error::ConnectionLost => {
            MailError::Connection(format!("{}: {}", context, e))
        }
        // client-side failures, not something the server told us
        Error::Validate(_) | Error::Append => {
            MailError::Other(anyhow::anyhow!("{}: {}", context, e))
        }
        other => MailError::Protocol(format!("{}: {}", context, other)),
    }
}

// A rejected LOGIN comes back as NO/BAD, anything else is the transport or the protocol
fn login_error(e: async_imap::error::Error) -> MailError {
    use async_imap::error::Error;

    match e {
        Error::No(msg) | Error::Bad(msg) => MailError::Authentication(msg),
        other => imap_error("Login failed", other),
    }
}

pub struct TlsMailboxConnector {
    timeout: Option<Duration>,
}

impl TlsMailboxConnector {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    async fn open(
        &self,
        config: &ImapConfig,
        account: &AccountConfig,
    ) -> Result<ImapSession, MailError> {
        let addr = format!("{}:{}", config.host, config.port);
        let tcp_stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| MailError::Connection(format!("Failed to connect to {}: {}", addr, e)))?;

        let tls = TlsConnector::new();
        let tls_stream = tls
            .connect(&config.host, tcp_stream.compat())
            .await
            .map_err(|e| MailError::Connection(format!("TLS connection failed: {}", e)))?;

        let client = async_imap::Client::new(tls_stream);

        let session = client
            .login(&account.address, &account.password)
            .await
            .map_err(|e| login_error(e.0))?;

        Ok(session)
    }
}

#[async_trait]
impl MailboxConnector for TlsMailboxConnector {
    async fn connect(
        &self,
        config: &ImapConfig,
        account: &AccountConfig,
    ) -> Result<Box<dyn MailboxSession>, MailError> {
        let session = bounded(self.timeout, "IMAP login", self.open(config, account)).await?;

        Ok(Box::new(TlsMailboxSession {
            session,
            timeout: self.timeout,
        }))
    }
}

struct TlsMailboxSession {
    session: ImapSession,
    timeout: Option<Duration>,
}

#[async_trait]
impl MailboxSession for TlsMailboxSession {
    async fn select(&mut self, folder: &str) -> Result<(), MailError> {
        let session = &mut self.session;
        bounded(self.timeout, "SELECT", async {
            session
                .select(folder)
                .await
                .map(|_| ())
                .map_err(|e| imap_error(&format!("Failed to select mailbox {}", folder), e))
        })
        .await
    }

    async fn search(&mut self, query: &str) -> Result<Vec<u32>, MailError> {
        let session = &mut self.session;
        bounded(self.timeout, "SEARCH", async {
            let found = session
                .search(query)
                .await
                .map_err(|e| imap_error("Search failed", e))?;
            Ok::<_, MailError>(found.into_iter().collect())
        })
        .await
    }

    async fn fetch_rfc822(&mut self, sequence: u32) -> Result<Option<Vec<u8>>, MailError> {
        let session = &mut self.session;
        bounded(self.timeout, "FETCH", async {
            let fetch_stream = session
                .fetch(sequence.to_string(), "RFC822")
                .await
                .map_err(|e| imap_error(&format!("Fetch failed for message {}", sequence), e))?;
            pin_mut!(fetch_stream);

            // Drain the whole stream so the session is usable afterwards
            let mut content = None;
            while let Some(fetch_result) = fetch_stream.next().await {
                let message =
                    fetch_result.map_err(|e| imap_error("Error reading fetch result", e))?;

                if content.is_none() {
                    content = message.body().map(|body| body.to_vec());
                }
            }

            Ok::<_, MailError>(content)
        })
        .await
    }

    async fn logout(&mut self) -> Result<(), MailError> {
        let session = &mut self.session;
        bounded(self.timeout, "LOGOUT", async {
            session
                .logout()
                .await
                .map_err(|e| imap_error("Logout failed", e))
        })
        .await
    }
}

#[cfg(test)]
#[path = "./imap_fetcher_tests.rs"]
mod imap_fetcher_tests;

pub struct ImapFetcher {
    config: ImapConfig,
    account: AccountConfig,
    connector: Arc<dyn MailboxConnector>,
}

impl ImapFetcher {
    pub fn new(config: ImapConfig, account: AccountConfig, timeout: Option<Duration>) -> Self {
        Self {
            config,
            account,
            connector: Arc::new(TlsMailboxConnector::new(timeout)),
        }
    }

    #[allow(dead_code)]
    pub fn new_with_connector(
        config: ImapConfig,
        account: AccountConfig,
        connector: Arc<dyn MailboxConnector>,
    ) -> Self {
        Self {
            config,
            account,
            connector,
        }
    }

    async fn collect_matching(
        &self,
        session: &mut dyn MailboxSession,
    ) -> Result<Vec<FetchedEmail>, MailError> {
        let folder = &self.config.folder;
        session.select(folder).await?;

        let mut sequences = session.search(&self.config.search).await?;
        sequences.sort_unstable();
        info!(
            "[{}] {} message(s) in {} match {}",
            self.account.address,
            sequences.len(),
            folder,
            self.config.search
        );

        let mut emails = Vec::with_capacity(sequences.len());
        for sequence in sequences {
            match session.fetch_rfc822(sequence).await? {
                Some(raw) => {
                    let email = FetchedEmail::parse(sequence, raw)?;
                    debug!("[{}] Fetched {}", self.account.address, email.summary());
                    emails.push(email);
                }
                None => warn!(
                    "[{}] Server returned no body for message {}, skipping",
                    self.account.address, sequence
                ),
            }
        }

        Ok(emails)
    }
}

#[async_trait]
impl MailFetcher for ImapFetcher {
    async fn fetch_unseen(&self) -> Result<Vec<FetchedEmail>, MailError> {
        debug!(
            "[{}] Connecting to {}:{}",
            self.account.address, self.config.host, self.config.port
        );
        let mut session = self.connector.connect(&self.config, &self.account).await?;

        let result = self.collect_matching(session.as_mut()).await;

        // Logout on every path; a failed logout never replaces the fetch outcome
        if let Err(e) = session.logout().await {
            warn!("[{}] {}", self.account.address, e);
        }

        result
    }
}
