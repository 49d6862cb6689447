//! In-app notification and email outbox models

use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

text_enum! {
    NotificationType {
        Info => "info",
        Warning => "warning",
        Error => "error",
    }
}

text_enum! {
    NotificationStatus {
        Unread => "unread",
        Read => "read",
        Deleted => "deleted",
    }
}

text_enum! {
    EmailStatus {
        Pending => "pending",
        Sending => "sending",
        Success => "success",
        Failed => "failed",
    }
}

text_enum! {
    Language {
        En => "en",
        Sk => "sk",
        Cz => "cz",
    }
}

text_enum! {
    /// Email templates; the template name doubles as the email type
    EmailTemplate {
        UserRegistration => "user_registration",
        UserRegistrationAdminNotification => "user_registration_admin_notification",
        UserRegistrationInfo => "user_registration_info",
        SchoolRepresentativeReservation => "school_representative_reservation",
        EventDateDataChange => "event_date_data_change",
        UserResetPassword => "user_reset_password",
        SchoolRepresentativeDateIncoming => "school_representative_date_incoming",
        UserAccountActivation => "user_account_activation",
        UserAccountRejection => "user_account_rejection",
        OrganizerClaimAccepted => "organizer_claim_accepted",
        OrganizerClaimRejected => "organizer_claim_rejected",
        ReportReady => "report_ready",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub notification_id: i64,
    pub user_id: i64,
    pub notification_content: String,
    pub notification_date: NaiveDate,
    pub notification_type: String,
    pub notification_status: String,
    pub send_notification: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotificationRequest {
    pub user_id: i64,
    pub notification_content: String,
    pub notification_type: NotificationType,
    #[serde(default)]
    pub send_notification: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmailLog {
    pub email_log_id: i64,
    pub user_id: Option<i64>,
    pub recipient_email: String,
    pub subject: String,
    pub email_data: serde_json::Value,
    pub email_template: String,
    pub status: String,
    pub language: String,
    pub email_type: String,
    pub retry_count: i32,
    pub response: Option<String>,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row to insert into the email outbox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmailLog {
    pub user_id: Option<i64>,
    pub recipient_email: String,
    pub subject: String,
    pub email_data: serde_json::Value,
    pub template: EmailTemplate,
    pub language: Language,
    pub priority: i32,
}
