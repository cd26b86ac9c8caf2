use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use attendance_cli::accounts::ResetRequestOutcome;
use attendance_cli::cli::{
    AccountCommands, AccountDeleteArgs, InstructorCommands, InstructorUpdateArgs, ModelArgs,
    OutputMode, PasswordCommands, RegisterArgs, ResetRequestArgs, StoreArgs,
};
use attendance_cli::commands::{
    AccountHandler, CommandHandler, InstructorHandler, PasswordHandler, PasswordHandlerDeps,
    RegisterHandler,
};
use attendance_cli::errors::AppError;
use attendance_face_core::accounts::{AccountDeletionOutcome, AccountSummary, Role};

fn summary(id: &str) -> AccountSummary {
    AccountSummary {
        id: id.into(),
        username: "cgomez".into(),
        email: "carlos.gomez@sena.edu.co".into(),
        first_name: "Carlos".into(),
        last_name: "Gomez".into(),
        role: Role::Instructor,
        student_id: None,
        is_active: true,
        fichas: vec!["2558104".into()],
    }
}

#[test]
fn reset_request_renders_even_without_token() {
    let rendered = Arc::new(Mutex::new(Vec::new()));
    let deps = PasswordHandlerDeps::new(
        |_args| panic!("change should not run"),
        |args| {
            Ok(ResetRequestOutcome {
                email: args.email.clone(),
                token: None,
            })
        },
        |_args| panic!("confirm should not run"),
        |_summary, _mode| panic!("account render should not run"),
        {
            let rendered = Arc::clone(&rendered);
            move |outcome, _mode| {
                rendered.lock().unwrap().push(outcome.email.clone());
                Ok(())
            }
        },
    );

    let handler = PasswordHandler::with_dependencies(
        PasswordCommands::ResetRequest(ResetRequestArgs {
            email: "nobody@sena.edu.co".into(),
        }),
        deps,
    );
    let code = handler.execute(OutputMode::Human, false).unwrap();
    assert_eq!(code, ExitCode::SUCCESS);
    assert_eq!(*rendered.lock().unwrap(), vec!["nobody@sena.edu.co".to_string()]);
}

#[test]
fn instructor_update_passes_the_command_through() {
    let seen = Arc::new(Mutex::new(None));
    let handler = InstructorHandler::with_dependencies(
        InstructorCommands::Update(InstructorUpdateArgs {
            id: "inst-7".into(),
            request: PathBuf::from("patch.json"),
        }),
        {
            let seen = Arc::clone(&seen);
            move |command| {
                let InstructorCommands::Update(args) = command else {
                    panic!("expected update");
                };
                *seen.lock().unwrap() = Some(args.id.clone());
                Ok(summary(&args.id))
            }
        },
        |summary, mode| {
            assert_eq!(summary.id, "inst-7");
            assert_eq!(mode, OutputMode::Json);
            Ok(())
        },
    );

    handler.execute(OutputMode::Json, false).unwrap();
    assert_eq!(seen.lock().unwrap().as_deref(), Some("inst-7"));
}

#[test]
fn account_delete_not_found_maps_to_exit_code_four() {
    let handler = AccountHandler::with_dependencies(
        AccountCommands::Delete(AccountDeleteArgs {
            id: "missing".into(),
            store: StoreArgs::default(),
        }),
        |args| -> Result<AccountDeletionOutcome, AppError> {
            Err(AppError::NotFound {
                kind: "account",
                id: args.id.clone(),
            })
        },
        |_outcome, _mode| panic!("render should not run"),
    );

    let err = handler.execute(OutputMode::Human, false).unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::from(4));
    assert_eq!(err.reason(), "not_found");
}

#[test]
fn register_handler_surfaces_validation_errors() {
    let handler = RegisterHandler::with_dependencies(
        RegisterArgs {
            request: PathBuf::from("request.json"),
            models: ModelArgs::default(),
            store: StoreArgs::default(),
        },
        |_args| Err(AppError::validation("ficha_numero", "the requested ficha does not exist")),
        |_outcome, _mode| panic!("render should not run"),
    );

    let err = handler.execute(OutputMode::Json, true).unwrap_err();
    assert_eq!(err.exit_code(), ExitCode::from(2));
    match err {
        AppError::Validation { field, .. } => assert_eq!(field, "ficha_numero"),
        other => panic!("unexpected error: {other}"),
    }
}
