use log::{info, warn};
use mongodb::bson::{oid::ObjectId, DateTime};
use std::sync::Arc;

use super::email::{otp_email, Notifier};
use super::error::{ServiceError, ServiceResult};
use super::jwt::JwtService;
use crate::models::{Account, Otp, Role};
use crate::store::{AccountStore, OtpStore};
use crate::utils::{generate_otp, validate_email};

const MAX_OTP_ATTEMPTS: i32 = 5;

#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub account: Account,
    pub is_new_user: bool,
}

/// Passwordless email login.
#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    otps: Arc<dyn OtpStore>,
    notifier: Arc<dyn Notifier>,
    jwt: JwtService,
    otp_ttl_secs: i64,
    free_postings: i32,
    log_codes: bool,
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        otps: Arc<dyn OtpStore>,
        notifier: Arc<dyn Notifier>,
        jwt: JwtService,
        otp_ttl_secs: i64,
        free_postings: i32,
    ) -> Self {
        AuthService {
            accounts,
            otps,
            notifier,
            jwt,
            otp_ttl_secs,
            free_postings,
            log_codes: false,
        }
    }

    /// Development builds print the code so login works without SMTP.
    pub fn log_codes(mut self, enabled: bool) -> Self {
        self.log_codes = enabled;
        self
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    pub async fn send_otp(&self, email: &str, role: Option<&str>) -> ServiceResult<()> {
        let email = normalize(email);
        if !validate_email(&email) {
            return Err(ServiceError::validation("Invalid email"));
        }
        // Self sign-up only creates job seekers or employers.
        let role = match role.map(Role::parse) {
            None => Role::Employee,
            Some(Some(role @ (Role::Employee | Role::Employer))) => role,
            Some(_) => return Err(ServiceError::validation("Role must be employee or employer")),
        };

        let code = generate_otp();
        let now = chrono::Utc::now().timestamp_millis();
        self.otps
            .put(&Otp {
                key: email.clone(),
                otp: code.clone(),
                role: role.as_str().to_string(),
                expires_at: DateTime::from_millis(now + self.otp_ttl_secs * 1000),
                attempts: 0,
                created_at: DateTime::from_millis(now),
            })
            .await?;

        if self.log_codes {
            info!("OTP for {}: {}", email, code);
        }
        let (subject, body) = otp_email(&code, self.otp_ttl_secs / 60);
        if let Err(e) = self.notifier.send(&email, &subject, &body).await {
            if !self.log_codes {
                self.otps.remove(&email).await?;
                return Err(ServiceError::Notification(e.to_string()));
            }
            warn!("OTP email to {} not sent: {}", email, e);
        }
        Ok(())
    }

    pub async fn verify_otp(&self, email: &str, code: &str) -> ServiceResult<Session> {
        let email = normalize(email);
        let otp = match self.otps.find(&email).await? {
            Some(otp) if otp.expires_at > DateTime::now() => otp,
            _ => return Err(ServiceError::InvalidOtp),
        };
        if otp.attempts >= MAX_OTP_ATTEMPTS {
            self.otps.remove(&email).await?;
            return Err(ServiceError::OtpAttemptsExceeded);
        }
        if otp.otp != code.trim() {
            self.otps.record_attempt(&email).await?;
            return Err(ServiceError::InvalidOtp);
        }
        self.otps.remove(&email).await?;

        let (account, is_new_user) = match self.accounts.find_by_email(&email).await? {
            Some(account) => {
                if let Some(id) = account.id.as_ref() {
                    self.accounts.touch_login(id).await?;
                }
                (account, false)
            }
            None => {
                let role = Role::parse(&otp.role).unwrap_or(Role::Employee);
                let mut account = Account::new(&email, role, self.free_postings);
                account.id = Some(self.accounts.insert(&account).await?);
                info!("Created {} account for {}", role.as_str(), email);
                (account, true)
            }
        };
        if !account.is_active {
            return Err(ServiceError::InvalidToken);
        }

        let id = account.id.ok_or_else(|| ServiceError::SubjectNotFound(email.clone()))?;
        let (access_token, refresh_token) = self.tokens(&id, account.role)?;
        Ok(Session { access_token, refresh_token, account, is_new_user })
    }

    /// Trades a refresh token for a fresh pair. The role is re-read from storage.
    pub async fn refresh(&self, refresh_token: &str) -> ServiceResult<Session> {
        let claims = self
            .jwt
            .verify_token(refresh_token, true)
            .map_err(|_| ServiceError::InvalidToken)?;
        let id = ObjectId::parse_str(&claims.sub).map_err(|_| ServiceError::InvalidToken)?;
        let account = match self.accounts.find(&id).await? {
            Some(account) if account.is_active => account,
            _ => return Err(ServiceError::InvalidToken),
        };

        let (access_token, refresh_token) = self.tokens(&id, account.role)?;
        Ok(Session { access_token, refresh_token, account, is_new_user: false })
    }

    pub async fn account(&self, id: &ObjectId) -> ServiceResult<Account> {
        self.accounts
            .find(id)
            .await?
            .ok_or_else(|| ServiceError::SubjectNotFound(id.to_hex()))
    }

    fn tokens(&self, id: &ObjectId, role: Role) -> ServiceResult<(String, String)> {
        let access = self
            .jwt
            .generate_access_token(id, role)
            .map_err(|e| ServiceError::validation(format!("Token generation failed: {}", e)))?;
        let refresh = self
            .jwt
            .generate_refresh_token(id, role)
            .map_err(|e| ServiceError::validation(format!("Token generation failed: {}", e)))?;
        Ok((access, refresh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::email::testing::RecordingNotifier;
    use crate::store::memory::{MemoryAccountStore, MemoryOtpStore};

    struct Harness {
        auth: AuthService,
        otps: Arc<MemoryOtpStore>,
        notifier: Arc<RecordingNotifier>,
    }

    fn harness_with(notifier: RecordingNotifier) -> Harness {
        let otps = Arc::new(MemoryOtpStore::default());
        let notifier = Arc::new(notifier);
        let auth = AuthService::new(
            Arc::new(MemoryAccountStore::default()),
            otps.clone(),
            notifier.clone(),
            JwtService::new("a".to_string(), "r".to_string(), 900, 3600),
            600,
            1,
        );
        Harness { auth, otps, notifier }
    }

    fn harness() -> Harness {
        harness_with(RecordingNotifier::default())
    }

    impl Harness {
        async fn code(&self, email: &str) -> String {
            self.otps.find(email).await.unwrap().unwrap().otp
        }
    }

    #[tokio::test]
    async fn first_login_creates_employer_with_free_posting() {
        let h = harness();
        h.auth.send_otp("HR@Acme.in ", Some("employer")).await.unwrap();
        assert_eq!(h.notifier.sent.lock().unwrap().len(), 1);

        let code = h.code("hr@acme.in").await;
        let session = h.auth.verify_otp("hr@acme.in", &code).await.unwrap();

        assert!(session.is_new_user);
        assert_eq!(session.account.role, Role::Employer);
        assert_eq!(session.account.remaining_active_postings, 1);
        let claims = h.auth.jwt().verify_token(&session.access_token, false).unwrap();
        assert_eq!(claims.role, Role::Employer);
        assert!(h.otps.find("hr@acme.in").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn returning_login_keeps_existing_role() {
        let h = harness();
        h.auth.send_otp("dev@example.com", None).await.unwrap();
        let code = h.code("dev@example.com").await;
        h.auth.verify_otp("dev@example.com", &code).await.unwrap();

        h.auth.send_otp("dev@example.com", Some("employer")).await.unwrap();
        let code = h.code("dev@example.com").await;
        let session = h.auth.verify_otp("dev@example.com", &code).await.unwrap();

        assert!(!session.is_new_user);
        assert_eq!(session.account.role, Role::Employee);
    }

    #[tokio::test]
    async fn privileged_roles_cannot_self_register() {
        let h = harness();
        assert!(matches!(
            h.auth.send_otp("root@example.com", Some("admin")).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            h.auth.send_otp("not-an-email", None).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn wrong_codes_lock_the_otp() {
        let h = harness();
        h.auth.send_otp("dev@example.com", None).await.unwrap();
        let code = h.code("dev@example.com").await;

        for _ in 0..MAX_OTP_ATTEMPTS {
            assert!(matches!(
                h.auth.verify_otp("dev@example.com", "000000x").await,
                Err(ServiceError::InvalidOtp)
            ));
        }
        assert!(matches!(
            h.auth.verify_otp("dev@example.com", &code).await,
            Err(ServiceError::OtpAttemptsExceeded)
        ));
        assert!(matches!(
            h.auth.verify_otp("dev@example.com", &code).await,
            Err(ServiceError::InvalidOtp)
        ));
    }

    #[tokio::test]
    async fn expired_code_is_rejected() {
        let h = harness();
        h.otps
            .put(&Otp {
                key: "late@example.com".to_string(),
                otp: "123456".to_string(),
                role: "employee".to_string(),
                expires_at: DateTime::from_millis(DateTime::now().timestamp_millis() - 1000),
                attempts: 0,
                created_at: DateTime::now(),
            })
            .await
            .unwrap();

        assert!(matches!(
            h.auth.verify_otp("late@example.com", "123456").await,
            Err(ServiceError::InvalidOtp)
        ));
    }

    #[tokio::test]
    async fn undeliverable_code_is_discarded() {
        let h = harness_with(RecordingNotifier::failing());
        assert!(matches!(
            h.auth.send_otp("dev@example.com", None).await,
            Err(ServiceError::Notification(_))
        ));
        assert!(h.otps.find("dev@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_issues_new_pair_and_rejects_access_tokens() {
        let h = harness();
        h.auth.send_otp("dev@example.com", None).await.unwrap();
        let code = h.code("dev@example.com").await;
        let session = h.auth.verify_otp("dev@example.com", &code).await.unwrap();

        let refreshed = h.auth.refresh(&session.refresh_token).await.unwrap();
        assert_eq!(refreshed.account.id, session.account.id);
        assert!(matches!(
            h.auth.refresh(&session.access_token).await,
            Err(ServiceError::InvalidToken)
        ));
    }
}
