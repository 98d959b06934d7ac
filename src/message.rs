/*!
 * Copyright (c) 2026 Ming Lyu, aka mingcheng
 *
 * This source code is licensed under the MIT License,
 * which is located in the LICENSE file in the source tree's root directory.
 *
 * File: message.rs
 * Author: mingcheng <mingcheng@apache.org>
 * File Created: 2026-03-02 10:20:05
 *
 * Modified By: mingcheng <mingcheng@apache.org>
 * Last Modified: 2026-03-03 09:41:52
 */

use crate::error::MailError;
use chrono::{DateTime, FixedOffset};
use lettre::message::Mailbox;
use mail_parser::MessageParser;
use serde::Serialize;

/// A message retrieved from the mailbox, parsed into the headers we care about.
#[derive(Debug, Clone, Serialize)]
pub struct FetchedEmail {
    /// Sequence number reported by the server at search time.
    pub sequence: u32,
    pub from: Option<String>,
    pub subject: Option<String>,
    pub date: Option<DateTime<FixedOffset>>,
    pub body: String,
    #[serde(skip)]
    pub raw: Vec<u8>,
}

impl FetchedEmail {
    /// Parses a full RFC822 message as returned by `FETCH ... RFC822`.
    pub fn parse(sequence: u32, raw: Vec<u8>) -> Result<Self, MailError> {
        let (from, subject, date, body) = {
            let message = MessageParser::default().parse(&raw[..]).ok_or_else(|| {
                MailError::Protocol(format!("Message {} could not be parsed", sequence))
            })?;

            let from = message.from().and_then(|addr| addr.first()).and_then(|addr| {
                match (addr.name(), addr.address()) {
                    (Some(name), Some(address)) => Some(format!("{} <{}>", name, address)),
                    (None, Some(address)) => Some(address.to_string()),
                    (Some(name), None) => Some(name.to_string()),
                    (None, None) => None,
                }
            });

            let date = message
                .date()
                .and_then(|dt| DateTime::parse_from_rfc3339(&dt.to_rfc3339()).ok());

            // body_text falls back to the HTML part rendered as text
            let body = message
                .body_text(0)
                .map(|text| text.into_owned())
                .unwrap_or_default();

            (from, message.subject().map(|s| s.to_string()), date, body)
        };

        Ok(Self {
            sequence,
            from,
            subject,
            date,
            body,
            raw,
        })
    }

    pub fn summary(&self) -> String {
        format!(
            "#{} from {} - {} ({} bytes)",
            self.sequence,
            self.from.as_deref().unwrap_or("<unknown sender>"),
            self.subject.as_deref().unwrap_or("<no subject>"),
            self.raw.len()
        )
    }
}

/// A plain-text message waiting to be submitted.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutboundEmail {
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Checks the message before a session is opened, returning the parsed recipient.
    pub fn validate(&self) -> Result<Mailbox, MailError> {
        let recipient: Mailbox = self.to.trim().parse().map_err(|e| {
            MailError::Validation(format!("Invalid recipient address {:?}: {}", self.to, e))
        })?;

        if self.subject.trim().is_empty() {
            return Err(MailError::Validation("Subject is empty".to_string()));
        }

        if self.subject.trim() != self.subject {
            return Err(MailError::Validation(
                "Subject has leading or trailing whitespace".to_string(),
            ));
        }

        if self.subject.contains(['\r', '\n']) {
            return Err(MailError::Validation(
                "Subject must be a single line".to_string(),
            ));
        }

        if self.body.trim().is_empty() {
            return Err(MailError::Validation("Body is empty".to_string()));
        }

        Ok(recipient)
    }
}
