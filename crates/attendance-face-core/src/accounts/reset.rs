use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::accounts::directory::{Account, AccountStore, ResetToken, ResetTokenStore};
use crate::accounts::password::{hash_password, passwords_match, PasswordPolicy, UserAttributes};
use crate::accounts::validate_email;
use crate::errors::{AppError, AppResult};

pub const DEFAULT_RESET_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Issues a reset token for the active account registered under `email`.
/// Unknown or inactive addresses return `Ok(None)` so callers cannot probe
/// which emails exist.
pub fn request_password_reset<D>(directory: &D, email: &str) -> AppResult<Option<ResetToken>>
where
    D: AccountStore + ResetTokenStore,
{
    validate_email("email", email)?;
    match directory.find_by_email(email.trim())? {
        Some(account) if account.is_active => {
            let token = directory.issue_token(&account.id)?;
            info!(account = %account.id, "issued password reset token");
            Ok(Some(token))
        }
        _ => {
            debug!("password reset requested for unknown or inactive email");
            Ok(None)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetConfirm {
    pub token: Uuid,
    pub password: String,
    pub password2: String,
}

pub fn confirm_password_reset<D>(
    directory: &D,
    policy: &PasswordPolicy,
    ttl: Duration,
    confirm: &PasswordResetConfirm,
) -> AppResult<Account>
where
    D: AccountStore + ResetTokenStore,
{
    passwords_match("password", &confirm.password, &confirm.password2)?;

    let token = directory
        .find_token(&confirm.token)?
        .ok_or_else(invalid_token)?;
    let age = Utc::now().signed_duration_since(token.created_at);
    let expired = age
        .to_std()
        .map(|elapsed| elapsed > ttl)
        .unwrap_or(false);
    if expired {
        directory.consume_token(&token.token)?;
        return Err(invalid_token());
    }

    let mut account = match directory.find_account(&token.account_id)? {
        Some(account) if account.is_active => account,
        _ => {
            directory.consume_token(&token.token)?;
            return Err(invalid_token());
        }
    };

    policy.check("password", &confirm.password, &UserAttributes::from(&account))?;

    account.password_hash = Some(hash_password(&confirm.password)?);
    directory.update_account(&account)?;
    directory.consume_token(&token.token)?;
    info!(account = %account.id, "password reset completed");
    Ok(account)
}

fn invalid_token() -> AppError {
    AppError::validation("token", "the reset link is invalid or has expired")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::directory::{JsonDirectory, Role};
    use crate::accounts::password::verify_password;
    use tempfile::TempDir;

    fn seeded(tmp: &TempDir, active: bool) -> (JsonDirectory, Account) {
        let dir = JsonDirectory::new(tmp.path());
        let mut account = Account::new(Role::Student, "lmora", "lucia@sena.edu.co", "Lucia", "Mora");
        account.is_active = active;
        let account = dir.create_account(account).unwrap();
        (dir, account)
    }

    fn confirm(token: Uuid, password: &str, password2: &str) -> PasswordResetConfirm {
        PasswordResetConfirm {
            token,
            password: password.into(),
            password2: password2.into(),
        }
    }

    #[test]
    fn unknown_email_is_silently_accepted() {
        let tmp = TempDir::new().unwrap();
        let (dir, _) = seeded(&tmp, true);
        assert!(request_password_reset(&dir, "nobody@sena.edu.co")
            .unwrap()
            .is_none());
    }

    #[test]
    fn inactive_account_gets_no_token() {
        let tmp = TempDir::new().unwrap();
        let (dir, _) = seeded(&tmp, false);
        assert!(request_password_reset(&dir, "lucia@sena.edu.co")
            .unwrap()
            .is_none());
    }

    #[test]
    fn malformed_email_is_a_validation_error() {
        let tmp = TempDir::new().unwrap();
        let (dir, _) = seeded(&tmp, true);
        let err = request_password_reset(&dir, "not-an-email").unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn reset_sets_new_password_and_consumes_token() {
        let tmp = TempDir::new().unwrap();
        let (dir, account) = seeded(&tmp, true);
        let token = request_password_reset(&dir, "lucia@sena.edu.co")
            .unwrap()
            .unwrap();

        let policy = PasswordPolicy::default();
        let request = confirm(token.token, "Cielo-abierto-42", "Cielo-abierto-42");
        confirm_password_reset(&dir, &policy, DEFAULT_RESET_TOKEN_TTL, &request).unwrap();

        let stored = dir.find_account(&account.id).unwrap().unwrap();
        assert!(verify_password("Cielo-abierto-42", stored.password_hash.as_deref().unwrap()).unwrap());

        let err =
            confirm_password_reset(&dir, &policy, DEFAULT_RESET_TOKEN_TTL, &request).unwrap_err();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "token"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn policy_failure_keeps_the_token() {
        let tmp = TempDir::new().unwrap();
        let (dir, _) = seeded(&tmp, true);
        let token = dir.issue_token(&dir.find_by_username("lmora").unwrap().unwrap().id).unwrap();

        let request = confirm(token.token, "123", "123");
        let err = confirm_password_reset(
            &dir,
            &PasswordPolicy::default(),
            DEFAULT_RESET_TOKEN_TTL,
            &request,
        )
        .unwrap_err();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "password"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(dir.find_token(&token.token).unwrap().is_some());
    }

    #[test]
    fn mismatched_passwords_fail_before_token_lookup() {
        let tmp = TempDir::new().unwrap();
        let (dir, _) = seeded(&tmp, true);
        let request = confirm(Uuid::new_v4(), "Cielo-abierto-42", "Cielo-abierto-43");
        let err = confirm_password_reset(
            &dir,
            &PasswordPolicy::default(),
            DEFAULT_RESET_TOKEN_TTL,
            &request,
        )
        .unwrap_err();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "password"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn expired_token_is_rejected_and_dropped() {
        let tmp = TempDir::new().unwrap();
        let (dir, account) = seeded(&tmp, true);
        let token = dir.issue_token(&account.id).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let request = confirm(token.token, "Cielo-abierto-42", "Cielo-abierto-42");
        let err = confirm_password_reset(
            &dir,
            &PasswordPolicy::default(),
            Duration::from_millis(1),
            &request,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(dir.find_token(&token.token).unwrap().is_none());
    }
}
