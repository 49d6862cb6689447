//! User service implementation
//!
//! This service handles account administration, public registration of
//! school representatives and the approval flow that activates them.

use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::settings::Settings;
use crate::database::filters::{FilterSet, PageRequest, Pagination};
use crate::database::repositories::{NewUser, UserChanges};
use crate::database::DatabaseService;
use crate::models::{
    CreateUserRequest, EmailTemplate, NewAuditLog, RegisterSchoolRepresentativeRequest, UpdateUserRequest, User,
    UserRole, UserStatus,
};
use crate::services::auth::{hash_password, AuthContext, Permission};
use crate::services::email::EmailService;
use crate::services::notification::NotificationService;
use crate::utils::errors::{SchoolEventsError, Result};
use crate::utils::helpers::{is_valid_email, is_valid_ico, is_valid_phone};
use crate::utils::logging::{log_admin_action, log_user_action};

const MIN_PASSWORD_LENGTH: usize = 8;

/// User service for managing user operations
#[derive(Clone, Debug)]
pub struct UserService {
    db: DatabaseService,
    emails: EmailService,
    notifications: NotificationService,
    settings: Settings,
}

impl UserService {
    /// Create a new UserService instance
    pub fn new(
        db: DatabaseService,
        emails: EmailService,
        notifications: NotificationService,
        settings: Settings,
    ) -> Self {
        Self { db, emails, notifications, settings }
    }

    /// Get user by ID
    pub async fn get_user(&self, user_id: i64) -> Result<User> {
        debug!(user_id = user_id, "Getting user by ID");
        self.db
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(SchoolEventsError::UserNotFound { user_id })
    }

    pub async fn list_users(&self, filters: &FilterSet, page: PageRequest) -> Result<Pagination<User>> {
        self.db.users.list(filters, page).await
    }

    pub async fn list_pending(&self, filters: &FilterSet, page: PageRequest) -> Result<Pagination<User>> {
        self.db.users.list_pending(filters, page).await
    }

    /// Create an account on behalf of an admin
    pub async fn create_user(&self, actor: &AuthContext, request: CreateUserRequest) -> Result<User> {
        actor.require(Permission::ManageUsers)?;
        validate_email(&request.user_email)?;
        if request.password.is_empty() {
            return Err(SchoolEventsError::Validation("Password must not be empty".to_string()));
        }
        if self.db.users.email_taken(&request.user_email, None).await? {
            return Err(email_taken());
        }

        let new_user = NewUser {
            first_name: request.first_name,
            last_name: request.last_name,
            user_email: request.user_email,
            password_hash: hash_password(&request.password)?,
            role: request.role.unwrap_or(UserRole::User),
            status: request.status.unwrap_or(UserStatus::Active),
            preferred_language: self.language_or_default(request.preferred_language.as_deref())?,
            phone_number: request.phone_number,
            school_id: request.school_id,
            email_verified: false,
        };

        let mut tx = self.db.begin().await?;
        let user = self.db.users.create(&mut tx, new_user).await?;
        self.db
            .audit(&mut tx, NewAuditLog::change("users", user.user_id, Some(actor.user_id()), None, Some(&user)))
            .await?;
        tx.commit().await?;

        log_admin_action(actor.user_id(), "create_user", Some(&user.user_email), None);
        self.notify(actor.user_id(), format!("User {} {} was created successfully", user.first_name, user.last_name))
            .await;

        Ok(user)
    }

    /// Partial update; only admins may change role or status
    pub async fn update_user(&self, actor: &AuthContext, user_id: i64, request: UpdateUserRequest) -> Result<User> {
        actor.require_self_or_admin(user_id)?;
        if !actor.is_admin() && (request.role.is_some() || request.status.is_some()) {
            return Err(SchoolEventsError::PermissionDenied(
                "Only administrators can change role or status".to_string(),
            ));
        }

        let existing = self.get_user(user_id).await?;

        if let Some(email) = &request.user_email {
            validate_email(email)?;
            if self.db.users.email_taken(email, Some(user_id)).await? {
                return Err(email_taken());
            }
        }

        let password_hash = match request.password.as_deref() {
            Some(password) if !password.is_empty() => Some(hash_password(password)?),
            _ => None,
        };
        let preferred_language = match request.preferred_language.as_deref() {
            Some(lang) => Some(self.language_or_default(Some(lang))?),
            None => None,
        };

        let changes = UserChanges {
            first_name: request.first_name,
            last_name: request.last_name,
            user_email: request.user_email,
            password_hash,
            role: request.role,
            status: request.status,
            preferred_language,
            profile_picture: request.profile_picture,
            subscription: request.subscription,
            phone_number: request.phone_number,
            email_verified: request.email_verified,
        };

        let mut tx = self.db.begin().await?;
        let user = self.db.users.update(&mut tx, user_id, changes).await?;
        self.db
            .audit(&mut tx, NewAuditLog::change("users", user_id, Some(actor.user_id()), Some(&existing), Some(&user)))
            .await?;
        tx.commit().await?;

        log_user_action(actor.user_id(), "update_user", Some(&format!("user_id={}", user_id)));
        Ok(user)
    }

    /// Soft delete
    pub async fn delete_user(&self, actor: &AuthContext, user_id: i64) -> Result<User> {
        self.change_status(actor, user_id, UserStatus::Deleted).await
    }

    /// Public self-registration of a school representative
    ///
    /// The account stays inactive until an admin approves it.
    pub async fn register_school_representative(&self, request: RegisterSchoolRepresentativeRequest) -> Result<User> {
        validate_registration(&request)?;
        if self.db.users.email_taken(&request.user_email, None).await? {
            return Err(email_taken());
        }

        let language = self.language_or_default(request.preferred_language.as_deref())?;
        let password_hash = hash_password(&request.password)?;

        let mut tx = self.db.begin().await?;

        let school = match self.db.schools.find_by_ico(&mut tx, &request.school.ico).await? {
            Some(school) => school,
            None => self.db.schools.create(&mut tx, request.school.clone()).await?,
        };

        let user = self
            .db
            .users
            .create(
                &mut tx,
                NewUser {
                    first_name: request.first_name,
                    last_name: request.last_name,
                    user_email: request.user_email,
                    password_hash,
                    role: UserRole::SchoolRepresentative,
                    status: UserStatus::Inactive,
                    preferred_language: language.clone(),
                    phone_number: Some(request.phone_number),
                    school_id: Some(school.id),
                    email_verified: false,
                },
            )
            .await?;
        self.db
            .audit(&mut tx, NewAuditLog::change("users", user.user_id, None, None, Some(&user)))
            .await?;

        let mut outbox = vec![self.emails.compose(
            EmailTemplate::UserRegistration,
            &language,
            &user.user_email,
            Some(user.user_id),
            json!({"first_name": user.first_name, "last_name": user.last_name}),
        )];
        match self.settings.app.admin_email.as_deref() {
            Some(admin_email) if !admin_email.is_empty() => outbox.push(self.emails.compose(
                EmailTemplate::UserRegistrationAdminNotification,
                &self.settings.i18n.default_language,
                admin_email,
                self.settings.app.admin_id,
                json!({
                    "first_name": user.first_name,
                    "last_name": user.last_name,
                    "user_email": user.user_email,
                    "school_name": school.name,
                    "ico": school.ico,
                }),
            )),
            _ => warn!("ADMIN_EMAIL is not configured, registration not announced"),
        }

        let mut email_ids = Vec::with_capacity(outbox.len());
        for email in &outbox {
            email_ids.push(self.emails.record(&mut tx, email).await?.email_log_id);
        }
        tx.commit().await?;
        self.emails.dispatch(&email_ids).await;

        info!(user_id = user.user_id, school_id = school.id, "School representative registered");
        Ok(user)
    }

    /// Activate a pending account
    pub async fn approve_user(&self, actor: &AuthContext, user_id: i64) -> Result<User> {
        let user = self.change_status(actor, user_id, UserStatus::Active).await?;
        let email = self.emails.compose(
            EmailTemplate::UserAccountActivation,
            &user.preferred_language,
            &user.user_email,
            Some(user.user_id),
            json!({"first_name": user.first_name, "login_url": self.frontend_url("login")}),
        );
        self.emails.queue_email(email).await?;
        Ok(user)
    }

    pub async fn reject_user(&self, actor: &AuthContext, user_id: i64) -> Result<User> {
        let user = self.change_status(actor, user_id, UserStatus::Rejected).await?;
        let email = self.emails.compose(
            EmailTemplate::UserAccountRejection,
            &user.preferred_language,
            &user.user_email,
            Some(user.user_id),
            json!({"first_name": user.first_name}),
        );
        self.emails.queue_email(email).await?;
        Ok(user)
    }

    async fn change_status(&self, actor: &AuthContext, user_id: i64, status: UserStatus) -> Result<User> {
        actor.require(Permission::ManageUsers)?;
        let existing = self.get_user(user_id).await?;

        let mut tx = self.db.begin().await?;
        let user = self.db.users.set_status(&mut tx, user_id, status).await?;
        self.db
            .audit(&mut tx, NewAuditLog::change("users", user_id, Some(actor.user_id()), Some(&existing), Some(&user)))
            .await?;
        tx.commit().await?;

        log_admin_action(actor.user_id(), &format!("set_user_status:{}", status), Some(&user.user_email), None);
        Ok(user)
    }

    async fn notify(&self, user_id: i64, content: String) {
        if let Err(e) = self.notifications.info(user_id, content).await {
            warn!(user_id, error = %e, "Failed to create notification");
        }
    }

    fn language_or_default(&self, language: Option<&str>) -> Result<String> {
        match language {
            None => Ok(self.settings.i18n.default_language.clone()),
            Some(lang) if self.settings.i18n.supported_languages.iter().any(|l| l == lang) => Ok(lang.to_string()),
            Some(lang) => Err(SchoolEventsError::Validation(format!("Unsupported language: {}", lang))),
        }
    }

    fn frontend_url(&self, path: &str) -> String {
        let base = self.settings.app.external_url.as_deref().unwrap_or("").trim_end_matches('/');
        format!("{}/{}", base, path)
    }
}

fn email_taken() -> SchoolEventsError {
    SchoolEventsError::BadRequest("Email already taken".to_string())
}

fn validate_email(email: &str) -> Result<()> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(SchoolEventsError::Validation(format!("Invalid email address: {}", email)))
    }
}

/// Field rules of the public registration form
pub fn validate_registration(request: &RegisterSchoolRepresentativeRequest) -> Result<()> {
    validate_email(&request.user_email)?;
    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(SchoolEventsError::Validation(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    if !is_valid_phone(&request.phone_number) {
        return Err(SchoolEventsError::Validation(
            "Phone number must contain only digits and at least 9 of them".to_string(),
        ));
    }
    if !is_valid_ico(&request.school.ico) {
        return Err(SchoolEventsError::Validation("IČO must be exactly 8 digits".to_string()));
    }
    if request.school.name.trim().is_empty() {
        return Err(SchoolEventsError::BadRequest("Missing school data".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateSchoolRequest;
    use assert_matches::assert_matches;

    fn registration() -> RegisterSchoolRepresentativeRequest {
        RegisterSchoolRepresentativeRequest {
            first_name: "Jana".to_string(),
            last_name: "Kováčová".to_string(),
            user_email: "jana@zs-hlavna.sk".to_string(),
            password: "dlhe-heslo".to_string(),
            phone_number: "0901234567".to_string(),
            preferred_language: Some("sk".to_string()),
            school: CreateSchoolRequest {
                name: "ZŠ Hlavná".to_string(),
                ico: "12345678".to_string(),
                address: None,
                city: Some("Bratislava".to_string()),
                psc: None,
                district: None,
                region: None,
                number_of_students: Some(300),
                number_of_employees: None,
            },
        }
    }

    #[test]
    fn test_valid_registration_passes() {
        assert!(validate_registration(&registration()).is_ok());
    }

    #[test]
    fn test_registration_field_rules() {
        let mut request = registration();
        request.password = "short".to_string();
        assert_matches!(validate_registration(&request), Err(SchoolEventsError::Validation(_)));

        let mut request = registration();
        request.phone_number = "+421 901".to_string();
        assert_matches!(validate_registration(&request), Err(SchoolEventsError::Validation(_)));

        let mut request = registration();
        request.school.ico = "1234567".to_string();
        assert_matches!(validate_registration(&request), Err(SchoolEventsError::Validation(m)) if m.contains("8 digits"));

        let mut request = registration();
        request.user_email = "not-an-email".to_string();
        assert!(validate_registration(&request).is_err());
    }
}
