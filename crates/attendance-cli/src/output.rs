use std::error::Error;
use std::io::{self, Write};

use attendance_face_core::accounts::{AccountDeletionOutcome, AccountSummary, Ficha, RegistrationOutcome};
use attendance_face_core::faces::{
    DuplicateCheckOutcome, FaceEnrollmentOutcome, FaceExtractionOutcome, FaceRemovalOutcome,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::accounts::ResetRequestOutcome;
use crate::cli::OutputMode;
use crate::errors::{AppError, AppResult};
use crate::faces::FaceListing;

fn write_json<T: Serialize + ?Sized>(payload: &T) -> AppResult<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let payload = serde_json::to_string(payload)?;
    handle.write_all(payload.as_bytes())?;
    handle.write_all(b"\n")?;
    Ok(())
}

fn print_logs(logs: &[String]) {
    for line in logs {
        println!("{line}");
    }
}

pub fn render_face_extract(outcome: &FaceExtractionOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            print_logs(&outcome.logs);
            println!(
                "Feature extraction successful: {} (faces: {})",
                outcome.summary.image_path, outcome.summary.num_faces
            );
        }
        OutputMode::Json => write_json(&outcome.summary)?,
    }
    Ok(())
}

pub fn render_face_check(outcome: &DuplicateCheckOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            print_logs(&outcome.logs);
            println!(
                "No duplicates: {} image(s) checked against {} enrolled encoding(s)",
                outcome.images_checked, outcome.enrolled_compared
            );
        }
        OutputMode::Json => write_json(&json!({
            "success": true,
            "images_checked": outcome.images_checked,
            "enrolled_compared": outcome.enrolled_compared,
        }))?,
    }
    Ok(())
}

pub fn render_face_enroll(outcome: &FaceEnrollmentOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            print_logs(&outcome.logs);
            println!(
                "Enrollment successful: encoding {} stored for {}",
                outcome.record.id, outcome.owner
            );
        }
        OutputMode::Json => write_json(&json!({
            "success": true,
            "owner": outcome.owner,
            "images_checked": outcome.images_checked,
            "record": outcome.record,
        }))?,
    }
    Ok(())
}

pub fn render_face_list(listing: &FaceListing, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if listing.records.is_empty() {
                println!("No encodings enrolled in {}", listing.store_dir.display());
            }
            for record in &listing.records {
                println!(
                    "{}  owner={}  image={}  created={}",
                    record.id, record.owner, record.reference_image, record.created_at
                );
            }
        }
        OutputMode::Json => write_json(listing)?,
    }
    Ok(())
}

pub fn render_face_remove(outcome: &FaceRemovalOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            print_logs(&outcome.logs);
            println!(
                "Removal successful: removed {} encoding(s) for {}",
                outcome.removed_ids.len(),
                outcome.owner
            );
        }
        OutputMode::Json => write_json(&json!({
            "success": true,
            "owner": outcome.owner,
            "removed_ids": outcome.removed_ids,
        }))?,
    }
    Ok(())
}

pub fn render_registration(outcome: &RegistrationOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            print_logs(&outcome.logs);
            println!(
                "Registration successful: {} ({}) enrolled in ficha(s) {}",
                outcome.account.username,
                outcome.account.id,
                outcome.account.fichas.join(", ")
            );
        }
        OutputMode::Json => write_json(&registration_payload(outcome))?,
    }
    Ok(())
}

fn registration_payload(outcome: &RegistrationOutcome) -> Value {
    json!({
        "success": true,
        "account": outcome.account,
        "encoding": outcome.encoding,
    })
}

pub fn render_account(summary: &AccountSummary, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            println!(
                "Account {} ({}) saved; active: {}",
                summary.username, summary.id, summary.is_active
            );
            if !summary.fichas.is_empty() {
                println!("Fichas: {}", summary.fichas.join(", "));
            }
        }
        OutputMode::Json => write_json(summary)?,
    }
    Ok(())
}

pub fn render_reset_request(outcome: &ResetRequestOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            println!(
                "If an active account uses {}, a reset token has been issued.",
                outcome.email
            );
            if let Some(token) = &outcome.token {
                println!("Token: {}", token.token);
            }
        }
        OutputMode::Json => write_json(&json!({
            "success": true,
            "token": outcome.token.as_ref().map(|token| token.token.to_string()),
        }))?,
    }
    Ok(())
}

pub fn render_account_deletion(
    outcome: &AccountDeletionOutcome,
    mode: OutputMode,
) -> AppResult<()> {
    match mode {
        OutputMode::Human => println!(
            "Account {} deleted with {} face encoding(s)",
            outcome.account_id,
            outcome.removed_encodings.len()
        ),
        OutputMode::Json => write_json(outcome)?,
    }
    Ok(())
}

pub fn render_ficha(ficha: &Ficha, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => println!("Ficha {} created", ficha.numero_ficha),
        OutputMode::Json => write_json(ficha)?,
    }
    Ok(())
}

pub fn render_error(err: &AppError, mode: OutputMode) {
    match mode {
        OutputMode::Human => {
            eprintln!("error: {}", err.human_message());
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
        OutputMode::Json => {
            if let Ok(json) = serde_json::to_string(&error_payload(err)) {
                println!("{json}");
            }
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
    }
}

fn error_payload(err: &AppError) -> Value {
    let mut payload = json!({
        "success": false,
        "reason": err.reason(),
        "error": err.human_message(),
    });
    match err {
        AppError::Validation { field, messages } => {
            payload["field"] = json!(field);
            payload["messages"] = json!(messages);
        }
        AppError::Enrollment(inner) => {
            if let Some(index) = inner.image_index() {
                payload["image_index"] = json!(index);
            }
        }
        _ => {}
    }
    payload
}
