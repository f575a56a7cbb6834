//! Mail delivery of packaged e-books to a reading device's inbound address.
//!
//! One message per run, the e-book as its only attachment, sent through an
//! authenticated SMTP relay. No retries.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

use kindle_voz_shared::{MailSecurity, MailSettings, Result, VozError};

/// What to send: a subject line and the file to attach.
#[derive(Debug, Clone)]
pub struct Parcel {
    pub subject: String,
    pub attachment: PathBuf,
}

/// Capability that delivers a parcel to the configured recipient.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send `parcel`. Every failure is a [`VozError::Delivery`].
    async fn send(&self, parcel: &Parcel) -> Result<()>;
}

/// SMTP mailer backed by `lettre`.
pub struct SmtpMailer {
    settings: MailSettings,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build a mailer for the relay in `settings`. Does not connect.
    pub fn new(settings: MailSettings) -> Result<Self> {
        let builder = match settings.security {
            MailSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host),
            MailSecurity::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)
            }
        }
        .map_err(|e| VozError::delivery(format!("invalid relay {}: {e}", settings.smtp_host)))?;

        let transport = builder
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .build();

        Ok(Self {
            settings,
            transport,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip_all, fields(to = %self.settings.to, attachment = %parcel.attachment.display()))]
    async fn send(&self, parcel: &Parcel) -> Result<()> {
        let bytes = read_attachment(&parcel.attachment, self.settings.max_attachment_bytes).await?;
        let size = bytes.len();
        let message = build_message(&self.settings, parcel, bytes)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| VozError::delivery(format!("{}: {e}", self.settings.smtp_host)))?;

        info!(
            bytes = size,
            code = %response.code(),
            "delivered"
        );
        Ok(())
    }
}

/// Read the attachment, refusing files over `limit` bytes before any
/// connection is made.
async fn read_attachment(path: &Path, limit: u64) -> Result<Vec<u8>> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| VozError::delivery(format!("cannot stat {}: {e}", path.display())))?;

    if meta.len() > limit {
        return Err(VozError::delivery(format!(
            "attachment too large: {} bytes exceeds the {} byte limit",
            meta.len(),
            limit
        )));
    }

    tokio::fs::read(path)
        .await
        .map_err(|e| VozError::delivery(format!("cannot read {}: {e}", path.display())))
}

/// Compose the message: a short text part plus the e-book attachment.
pub fn build_message(settings: &MailSettings, parcel: &Parcel, bytes: Vec<u8>) -> Result<Message> {
    let from: Mailbox = settings
        .from
        .parse()
        .map_err(|e| VozError::delivery(format!("invalid sender '{}': {e}", settings.from)))?;
    let to: Mailbox = settings
        .to
        .parse()
        .map_err(|e| VozError::delivery(format!("invalid recipient '{}': {e}", settings.to)))?;

    let file_name = parcel
        .attachment
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| VozError::delivery("attachment path has no file name"))?;

    let content_type = ContentType::parse(ebook_mime(&parcel.attachment))
        .map_err(|e| VozError::delivery(format!("bad content type: {e}")))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(parcel.subject.clone())
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(format!(
                    "{} ({file_name}) sent by kindle-voz.\n",
                    parcel.subject
                )))
                .singlepart(Attachment::new(file_name).body(bytes, content_type)),
        )
        .map_err(|e| VozError::delivery(format!("cannot build message: {e}")))
}

/// MIME type for an e-book file, keyed by extension.
fn ebook_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mobi" => "application/x-mobipocket-ebook",
        "azw3" => "application/vnd.amazon.ebook",
        "epub" => "application/epub+zip",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
