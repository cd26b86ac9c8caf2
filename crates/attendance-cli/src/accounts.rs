use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use attendance_config::ResolvedConfig;
use attendance_face_core::accounts::{
    change_password, confirm_password_reset, create_instructor, delete_account,
    request_password_reset, update_instructor, AccountDeletionOutcome, AccountStore,
    AccountSummary, Ficha, FichaStore, InstructorPatch, InstructorRequest, JsonDirectory,
    PasswordChange, PasswordPolicy, PasswordResetConfirm, RegisterStudentRequest,
    RegistrationOutcome, ResetToken, StudentRegistration,
};
use attendance_face_core::faces::FaceImage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cli::{
    AccountDeleteArgs, FichaCreateArgs, InstructorCreateArgs, InstructorUpdateArgs,
    PasswordChangeArgs, RegisterArgs, ResetConfirmArgs, ResetRequestArgs,
};
use crate::config::{load_config, match_tolerance};
use crate::errors::{AppError, AppResult};
use crate::faces::{load_encoder, open_store};

const STDIN_MARKER: &str = "-";

/// Registration request as submitted on disk: images are file paths.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationFile {
    pub username: String,
    pub password: String,
    pub password2: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub student_id: String,
    pub ficha_numero: String,
    #[serde(default)]
    pub face_images: Vec<PathBuf>,
}

impl RegistrationFile {
    /// Reads every referenced image. Relative paths resolve against `base`.
    pub fn into_request(self, base: Option<&Path>) -> AppResult<RegisterStudentRequest> {
        let face_images = self
            .face_images
            .iter()
            .map(|path| match base {
                Some(base) if path.is_relative() => FaceImage::from_path(&base.join(path)),
                _ => FaceImage::from_path(path),
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(RegisterStudentRequest {
            username: self.username,
            password: self.password,
            password2: self.password2,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            student_id: self.student_id,
            ficha_numero: self.ficha_numero,
            face_images,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetRequestOutcome {
    pub email: String,
    pub token: Option<ResetToken>,
}

/// Parses a JSON request from `path`, or from stdin when `path` is `-`.
pub fn read_request<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let contents = if path.as_os_str() == STDIN_MARKER {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(path).map_err(|_| AppError::MissingInput {
            path: path.to_path_buf(),
        })?
    };
    serde_json::from_str(&contents)
        .map_err(|err| AppError::validation("request", format!("malformed request: {err}")))
}

fn request_base(path: &Path) -> Option<&Path> {
    if path.as_os_str() == STDIN_MARKER {
        None
    } else {
        path.parent()
    }
}

fn open_directory(config: &ResolvedConfig) -> JsonDirectory {
    JsonDirectory::new(&config.directory_dir).with_lock_timeout(config.lock_timeout)
}

fn password_policy(config: &ResolvedConfig) -> PasswordPolicy {
    PasswordPolicy::new(config.min_password_length)
}

pub fn run_registration(args: &RegisterArgs) -> AppResult<RegistrationOutcome> {
    let file: RegistrationFile = read_request(&args.request)?;
    let request = file.into_request(request_base(&args.request))?;

    let config = load_config()?;
    let directory = open_directory(&config);
    let store = open_store(&args.store, &config)?;
    let encoder = load_encoder(&args.models, &config)?;
    let policy = password_policy(&config);

    StudentRegistration {
        directory: &directory,
        encoder: &encoder,
        store: &store,
        policy: &policy,
        tolerance: match_tolerance(&config),
    }
    .register(&request)
}

pub fn run_password_change(args: &PasswordChangeArgs) -> AppResult<AccountSummary> {
    let change: PasswordChange = read_request(&args.request)?;
    let config = load_config()?;
    let directory = open_directory(&config);

    let acting = directory
        .find_by_username(&args.username)?
        .ok_or_else(|| AppError::NotFound {
            kind: "account",
            id: args.username.clone(),
        })?;
    let updated = change_password(&directory, &password_policy(&config), &acting, &change)?;
    let fichas = directory.fichas_for(&updated.id)?;
    Ok(AccountSummary::new(&updated, fichas))
}

pub fn run_reset_request(args: &ResetRequestArgs) -> AppResult<ResetRequestOutcome> {
    let config = load_config()?;
    let directory = open_directory(&config);
    let token = request_password_reset(&directory, &args.email)?;
    Ok(ResetRequestOutcome {
        email: args.email.clone(),
        token,
    })
}

pub fn run_reset_confirm(args: &ResetConfirmArgs) -> AppResult<AccountSummary> {
    let confirm: PasswordResetConfirm = read_request(&args.request)?;
    let config = load_config()?;
    let directory = open_directory(&config);

    let account = confirm_password_reset(
        &directory,
        &password_policy(&config),
        config.reset_token_ttl,
        &confirm,
    )?;
    let fichas = directory.fichas_for(&account.id)?;
    Ok(AccountSummary::new(&account, fichas))
}

pub fn run_instructor_create(args: &InstructorCreateArgs) -> AppResult<AccountSummary> {
    let request: InstructorRequest = read_request(&args.request)?;
    let config = load_config()?;
    create_instructor(&open_directory(&config), &password_policy(&config), &request)
}

pub fn run_instructor_update(args: &InstructorUpdateArgs) -> AppResult<AccountSummary> {
    let patch: InstructorPatch = read_request(&args.request)?;
    let config = load_config()?;
    update_instructor(&open_directory(&config), &password_policy(&config), &args.id, &patch)
}

pub fn run_account_deletion(args: &AccountDeleteArgs) -> AppResult<AccountDeletionOutcome> {
    let config = load_config()?;
    let directory = open_directory(&config);
    let store = open_store(&args.store, &config)?;
    delete_account(&directory, &store, &args.id)
}

pub fn run_ficha_creation(args: &FichaCreateArgs) -> AppResult<Ficha> {
    let numero = args.numero.trim();
    if numero.is_empty() {
        return Err(AppError::validation(
            "numero_ficha",
            "this field may not be blank",
        ));
    }
    let config = load_config()?;
    open_directory(&config).create_ficha(numero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn registration_images_resolve_relative_to_the_request() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("photos")).unwrap();
        fs::write(tmp.path().join("photos/front.png"), b"png-bytes").unwrap();
        let request_path = tmp.path().join("request.json");
        fs::write(
            &request_path,
            r#"{
                "username": "dlopez",
                "password": "Cafe-de-Huila-88",
                "password2": "Cafe-de-Huila-88",
                "first_name": "Daniel",
                "last_name": "Lopez",
                "email": "dlopez@soy.sena.edu.co",
                "student_id": "1122334455",
                "ficha_numero": "2558104",
                "face_images": ["photos/front.png"]
            }"#,
        )
        .unwrap();

        let file: RegistrationFile = read_request(&request_path).unwrap();
        let request = file.into_request(request_base(&request_path)).unwrap();
        assert_eq!(request.face_images.len(), 1);
        assert_eq!(request.face_images[0].bytes, b"png-bytes".to_vec());
    }

    #[test]
    fn missing_image_is_reported_by_path() {
        let tmp = TempDir::new().unwrap();
        let file = RegistrationFile {
            username: "dlopez".into(),
            password: "x".into(),
            password2: "x".into(),
            first_name: "Daniel".into(),
            last_name: "Lopez".into(),
            email: "dlopez@soy.sena.edu.co".into(),
            student_id: "1".into(),
            ficha_numero: "1".into(),
            face_images: vec![PathBuf::from("absent.png")],
        };

        let err = file.into_request(Some(tmp.path())).unwrap_err();
        match err {
            AppError::MissingInput { path } => assert_eq!(path, tmp.path().join("absent.png")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn malformed_request_is_a_validation_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("change.json");
        fs::write(&path, r#"{"old_password": "only-one-field"}"#).unwrap();

        let err = read_request::<PasswordChange>(&path).unwrap_err();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "request"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn stdin_requests_have_no_base_directory() {
        assert!(request_base(Path::new("-")).is_none());
        assert_eq!(
            request_base(Path::new("/srv/requests/a.json")),
            Some(Path::new("/srv/requests"))
        );
    }
}
