//! Student self-registration: account fields, password policy, ficha
//! membership and face enrollment, checked in that order. Nothing is written
//! until every check has passed.

use tracing::{info, warn};

use crate::accounts::directory::{Account, AccountStore, AccountSummary, FichaStore, Role};
use crate::accounts::password::{hash_password, passwords_match, PasswordPolicy, UserAttributes};
use crate::accounts::{require_field, validate_email};
use crate::errors::{AppError, AppResult};
use crate::faces::enrollment::{check_duplicates, enroll_unique, validate_batch, EnrollmentRecord};
use crate::faces::extractor::{FaceEncoder, FaceImage};
use crate::faces::store::EncodingStore;

#[derive(Debug, Clone)]
pub struct RegisterStudentRequest {
    pub username: String,
    pub password: String,
    pub password2: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub student_id: String,
    pub ficha_numero: String,
    pub face_images: Vec<FaceImage>,
}

#[derive(Debug)]
pub struct RegistrationOutcome {
    pub account: AccountSummary,
    pub encoding: EnrollmentRecord,
    pub logs: Vec<String>,
}

pub struct StudentRegistration<'a, D, E, S> {
    pub directory: &'a D,
    pub encoder: &'a E,
    pub store: &'a S,
    pub policy: &'a PasswordPolicy,
    pub tolerance: f64,
}

impl<'a, D, E, S> StudentRegistration<'a, D, E, S>
where
    D: AccountStore + FichaStore,
    E: FaceEncoder,
    S: EncodingStore,
{
    pub fn register(&self, request: &RegisterStudentRequest) -> AppResult<RegistrationOutcome> {
        let mut logs = Vec::new();
        self.validate_fields(request)?;

        let attributes = UserAttributes {
            username: &request.username,
            email: &request.email,
            first_name: &request.first_name,
            last_name: &request.last_name,
        };
        self.policy.check("password", &request.password, &attributes)?;
        passwords_match("password", &request.password, &request.password2)?;

        if self.directory.find_ficha(&request.ficha_numero)?.is_none() {
            return Err(AppError::validation(
                "ficha_numero",
                "the requested ficha does not exist",
            ));
        }

        let candidates = validate_batch(self.encoder, &request.face_images)?;
        logs.push(format!(
            "Extracted {} face encoding(s)",
            candidates.len()
        ));
        let existing = self.store.list_all()?;
        check_duplicates(&candidates, &existing, self.tolerance)?;
        logs.push("Submitted faces do not match any enrolled student".to_string());

        let mut account = Account::new(
            Role::Student,
            request.username.trim(),
            request.email.trim(),
            request.first_name.trim(),
            request.last_name.trim(),
        );
        account.student_id = Some(request.student_id.trim().to_string());
        account.password_hash = Some(hash_password(&request.password)?);
        let account = self.directory.create_account(account)?;
        logs.push(format!("Created student account {}", account.id));

        let enrolled = self
            .directory
            .add_student(&request.ficha_numero, &account.id)
            .and_then(|_| {
                enroll_unique(
                    self.store,
                    &account.id,
                    &candidates,
                    &request.face_images,
                    self.tolerance,
                )
            });
        let record = match enrolled {
            Ok(record) => record,
            Err(err) => {
                self.roll_back(&account.id);
                return Err(err);
            }
        };
        logs.push(format!(
            "Joined ficha {} and enrolled face encoding {}",
            request.ficha_numero, record.id
        ));
        info!(account = %account.id, ficha = %request.ficha_numero, "registered student");

        let fichas = self.directory.fichas_for(&account.id)?;
        Ok(RegistrationOutcome {
            account: AccountSummary::new(&account, fichas),
            encoding: EnrollmentRecord::from(&record),
            logs,
        })
    }

    fn validate_fields(&self, request: &RegisterStudentRequest) -> AppResult<()> {
        require_field("username", &request.username)?;
        require_field("first_name", &request.first_name)?;
        require_field("last_name", &request.last_name)?;
        require_field("student_id", &request.student_id)?;
        require_field("ficha_numero", &request.ficha_numero)?;
        validate_email("email", &request.email)?;
        if self
            .directory
            .find_by_username(request.username.trim())?
            .is_some()
        {
            return Err(AppError::validation(
                "username",
                "a user with that username already exists",
            ));
        }
        Ok(())
    }

    fn roll_back(&self, account_id: &str) {
        if let Err(err) = self.directory.remove_member(account_id) {
            warn!(account = %account_id, error = %err, "failed to drop ficha membership during rollback");
        }
        if let Err(err) = self.directory.delete_account(account_id) {
            warn!(account = %account_id, error = %err, "failed to delete account during rollback");
        }
    }
}
