//! Email outbox and SMTP delivery
//!
//! Every email is first stored as an `email_logs` row (the outbox) and then
//! handed to the worker through a `SendEmail` job. Delivery renders the
//! localized template, sends it over SMTP and records the outcome on the row.
//! Rows that failed are picked up again by the periodic batch job until their
//! retry budget is spent.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgConnection;
use tracing::{debug, info, warn};

use crate::config::{MailConfig, Settings};
use crate::database::DatabaseService;
use crate::i18n::I18n;
use crate::models::{EmailLog, EmailStatus, EmailTemplate, Language, NewEmailLog};
use crate::tasks::{Job, TaskQueue};
use crate::utils::errors::{SchoolEventsError, Result};

/// Default outbox priority; lower values are sent first
pub const DEFAULT_PRIORITY: i32 = 100;

/// A row left in `sending` longer than this is considered abandoned and sendable again
pub const CLAIM_TIMEOUT_MINUTES: i64 = 10;

fn claim_timeout() -> chrono::Duration {
    chrono::Duration::minutes(CLAIM_TIMEOUT_MINUTES)
}

/// Something that can deliver a rendered HTML email
#[async_trait]
pub trait Mailer: Send + Sync + Debug {
    /// Send and return the server response
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<String>;
}

/// SMTP delivery over STARTTLS
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer").field("from", &self.from.to_string()).finish()
    }
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)?
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .build();

        let address: Address = config.from.parse()?;
        let name = (!config.from_name.is_empty()).then(|| config.from_name.clone());

        Ok(Self {
            transport,
            from: Mailbox::new(name, address),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<String> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())?;

        let response = self.transport.send(message).await?;
        Ok(format!("{} {}", response.code(), response.message().collect::<Vec<_>>().join(" ")))
    }
}

/// Outcome of one batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub sent: usize,
    pub failed: usize,
}

/// Email composition, outbox and delivery
#[derive(Clone, Debug)]
pub struct EmailService {
    db: DatabaseService,
    i18n: Arc<I18n>,
    /// `None` when sending is switched off; rows are then marked sent without delivery
    mailer: Option<Arc<dyn Mailer>>,
    queue: TaskQueue,
    settings: Settings,
}

impl EmailService {
    pub fn new(
        db: DatabaseService,
        i18n: Arc<I18n>,
        mailer: Option<Arc<dyn Mailer>>,
        queue: TaskQueue,
        settings: Settings,
    ) -> Self {
        Self { db, i18n, mailer, queue, settings }
    }

    /// Build an outbox row; the stored subject is rendered up front for readability
    pub fn compose(
        &self,
        template: EmailTemplate,
        language: &str,
        recipient_email: &str,
        user_id: Option<i64>,
        data: Value,
    ) -> NewEmailLog {
        let language: Language = self
            .i18n
            .detect_language(Some(language))
            .parse()
            .unwrap_or(Language::Sk);
        let subject = match self.i18n.render_email(template, language.as_str(), &data) {
            Ok(rendered) => rendered.subject,
            Err(_) => template.as_str().to_string(),
        };

        NewEmailLog {
            user_id,
            recipient_email: recipient_email.to_string(),
            subject,
            email_data: data,
            template,
            language,
            priority: DEFAULT_PRIORITY,
        }
    }

    /// Store a pending row inside the caller's transaction; call [`dispatch`](Self::dispatch) after commit
    pub async fn record(&self, conn: &mut PgConnection, email: &NewEmailLog) -> Result<EmailLog> {
        let log = self.db.email_logs.create(conn, email).await?;
        debug!(
            email_log_id = log.email_log_id,
            template = %log.email_template,
            "Email stored in outbox"
        );
        Ok(log)
    }

    /// Ask the worker to send stored rows
    pub async fn dispatch(&self, email_log_ids: &[i64]) {
        for id in email_log_ids {
            self.queue.enqueue_or_log(Job::SendEmail { email_log_id: *id }).await;
        }
    }

    /// Store and dispatch in one go, outside any caller transaction
    pub async fn queue_email(&self, email: NewEmailLog) -> Result<EmailLog> {
        let mut conn = self.db.pool().acquire().await?;
        let log = self.record(&mut conn, &email).await?;
        self.dispatch(&[log.email_log_id]).await;
        Ok(log)
    }

    /// Deliver one outbox row unless it is already sent, exhausted or being sent elsewhere
    pub async fn send_email_log(&self, email_log_id: i64) -> Result<EmailStatus> {
        let claimed = self
            .db
            .email_logs
            .claim(email_log_id, self.settings.mail.max_retries, claim_timeout())
            .await?;

        match claimed {
            Some(email) => self.deliver(&email).await,
            None => {
                let email = self
                    .db
                    .email_logs
                    .find_by_id(email_log_id)
                    .await?
                    .ok_or_else(|| SchoolEventsError::Internal(format!("Email log {} not found", email_log_id)))?;
                debug!(email_log_id, status = %email.status, retry_count = email.retry_count, "Email not claimed");
                email.status.parse()
            }
        }
    }

    async fn deliver(&self, email: &EmailLog) -> Result<EmailStatus> {
        let id = email.email_log_id;
        let rendered = email
            .email_template
            .parse::<EmailTemplate>()
            .and_then(|template| self.i18n.render_email(template, &email.language, &email.email_data));

        let rendered = match rendered {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(email_log_id = id, error = %e, "Email could not be rendered");
                self.db.email_logs.mark_failed(id, &e.to_string()).await?;
                return Ok(EmailStatus::Failed);
            }
        };

        let Some(mailer) = &self.mailer else {
            info!(email_log_id = id, recipient = %email.recipient_email, "Sending disabled, email marked as sent");
            self.db.email_logs.mark_success(id, Some("sending disabled")).await?;
            return Ok(EmailStatus::Success);
        };

        match mailer.send(&email.recipient_email, &rendered.subject, &rendered.html).await {
            Ok(response) => {
                info!(email_log_id = id, recipient = %email.recipient_email, "Email sent");
                self.db.email_logs.mark_success(id, Some(&response)).await?;
                Ok(EmailStatus::Success)
            }
            Err(e) => {
                warn!(email_log_id = id, error = %e, "Email delivery failed");
                self.db.email_logs.mark_failed(id, &e.to_string()).await?;
                Ok(EmailStatus::Failed)
            }
        }
    }

    /// Send the next batch of pending rows and retry failed ones
    pub async fn send_pending_batch(&self) -> Result<BatchOutcome> {
        let mail = &self.settings.mail;
        let batch = self
            .db
            .email_logs
            .claim_batch(mail.batch_size, mail.max_retries, claim_timeout())
            .await?;

        let mut outcome = BatchOutcome::default();
        for email in &batch {
            match self.deliver(email).await? {
                EmailStatus::Success => outcome.sent += 1,
                _ => outcome.failed += 1,
            }
        }

        if !batch.is_empty() {
            info!(sent = outcome.sent, failed = outcome.failed, "Email batch processed");
        }
        Ok(outcome)
    }

    pub fn sending_enabled(&self) -> bool {
        self.mailer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::I18nConfig;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<String> {
            self.sent.lock().unwrap().push((to.to_string(), subject.to_string()));
            Ok("250 OK".to_string())
        }
    }

    fn service(mailer: Option<Arc<dyn Mailer>>) -> EmailService {
        let settings = Settings::default();
        let mut i18n = I18n::new(&I18nConfig {
            default_language: "sk".to_string(),
            supported_languages: vec!["en".to_string(), "sk".to_string(), "cz".to_string()],
            translations_dir: "translations".to_string(),
        });
        i18n.insert_language("sk", json!({
            "email": {"user_account_rejection": {"subject": "Zamietnutie {first_name}", "body": "<p>{first_name}</p>"}}
        }))
        .unwrap();

        let pool = crate::database::create_lazy_pool(&crate::database::PoolConfig::default()).unwrap();
        let redis = crate::services::RedisService::new(settings.clone()).unwrap();
        let queue = TaskQueue::new(redis, &settings.tasks);
        EmailService::new(DatabaseService::new(pool), Arc::new(i18n), mailer, queue, settings)
    }

    #[tokio::test]
    async fn test_compose_renders_subject_in_detected_language() {
        let emails = service(None);
        let email = emails.compose(
            EmailTemplate::UserAccountRejection,
            "cs-CZ",
            "jana@school.sk",
            Some(3),
            json!({"first_name": "Jana"}),
        );
        assert_eq!(email.language, Language::Cz);
        // no Czech template loaded, falls back to Slovak
        assert_eq!(email.subject, "Zamietnutie Jana");
        assert_eq!(email.priority, DEFAULT_PRIORITY);
        assert_eq!(email.user_id, Some(3));
    }

    #[tokio::test]
    async fn test_compose_keeps_template_name_when_template_missing() {
        let emails = service(None);
        let email = emails.compose(EmailTemplate::ReportReady, "en", "a@b.sk", None, json!({}));
        assert_eq!(email.subject, "report_ready");
        assert!(!emails.sending_enabled());
    }

    #[tokio::test]
    async fn test_recording_mailer_is_used_when_enabled() {
        let mailer = Arc::new(RecordingMailer::default());
        let emails = service(Some(mailer.clone()));
        assert!(emails.sending_enabled());
        let response = mailer.send("x@y.sk", "Hi", "<p>Hi</p>").await.unwrap();
        assert_eq!(response, "250 OK");
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_smtp_mailer_builds_from_config() {
        let mut config = Settings::default().mail;
        config.server = "smtp.example.sk".to_string();
        config.from = "noreply@example.sk".to_string();
        config.from_name = "Kultúra pre školy".to_string();
        let mailer = SmtpMailer::new(&config).unwrap();
        assert!(format!("{:?}", mailer).contains("noreply@example.sk"));

        config.from = "not an address".to_string();
        assert!(SmtpMailer::new(&config).is_err());
    }
}
