pub mod deletion;
pub mod directory;
pub mod instructors;
pub mod password;
pub mod registration;
pub mod reset;

pub use deletion::{delete_account, AccountDeletionOutcome};
pub use directory::{
    Account, AccountStore, AccountSummary, Ficha, FichaStore, JsonDirectory, ResetToken,
    ResetTokenStore, Role,
};
pub use instructors::{create_instructor, update_instructor, InstructorPatch, InstructorRequest};
pub use password::{
    change_password, hash_password, verify_password, PasswordChange, PasswordPolicy,
    UserAttributes,
};
pub use registration::{
    RegisterStudentRequest, RegistrationOutcome, StudentRegistration,
};
pub use reset::{
    confirm_password_reset, request_password_reset, PasswordResetConfirm,
    DEFAULT_RESET_TOKEN_TTL,
};

use crate::errors::{AppError, AppResult};

pub(crate) fn require_field(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(field, "this field may not be blank"));
    }
    Ok(())
}

pub(crate) fn validate_email(field: &str, email: &str) -> AppResult<()> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AppError::validation(field, "enter a valid email address"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(validate_email("email", "ana@sena.edu.co").is_ok());
        for bad in ["", "ana", "@sena.co", "ana@sena", "ana@@sena.co", "a na@sena.co", "ana@.co"] {
            assert!(validate_email("email", bad).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(require_field("username", "  ").is_err());
        assert!(require_field("username", "ana").is_ok());
    }
}
