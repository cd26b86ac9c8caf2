use std::path::PathBuf;

use attendance_cli::cli::{
    AccountCommands, AccountDeleteArgs, Commands, FaceListArgs, FacesCommands, FichaCommands,
    FichaCreateArgs, InstructorCommands, InstructorCreateArgs, ModelArgs, PasswordCommands,
    RegisterArgs, ResetRequestArgs, StoreArgs,
};
use attendance_cli::commands::{
    AccountHandler, CommandHandler, FacesHandler, FichaHandler, InstructorHandler,
    PasswordHandler, RegisterHandler,
};

fn assert_dispatch<T: 'static>(command: Commands)
where
    T: CommandHandler,
{
    let handler: Box<dyn CommandHandler> = command.into();
    assert!(handler.as_any().is::<T>());
}

#[test]
fn faces_command_dispatches_faces_handler() {
    assert_dispatch::<FacesHandler>(Commands::Faces(FacesCommands::List(FaceListArgs {
        owner: None,
        store: StoreArgs::default(),
    })));
}

#[test]
fn register_command_dispatches_register_handler() {
    assert_dispatch::<RegisterHandler>(Commands::Register(RegisterArgs {
        request: PathBuf::from("request.json"),
        models: ModelArgs::default(),
        store: StoreArgs::default(),
    }));
}

#[test]
fn password_command_dispatches_password_handler() {
    assert_dispatch::<PasswordHandler>(Commands::Password(PasswordCommands::ResetRequest(
        ResetRequestArgs {
            email: "ana@sena.edu.co".into(),
        },
    )));
}

#[test]
fn instructor_command_dispatches_instructor_handler() {
    assert_dispatch::<InstructorHandler>(Commands::Instructor(InstructorCommands::Create(
        InstructorCreateArgs {
            request: PathBuf::from("instructor.json"),
        },
    )));
}

#[test]
fn account_command_dispatches_account_handler() {
    assert_dispatch::<AccountHandler>(Commands::Account(AccountCommands::Delete(
        AccountDeleteArgs {
            id: "acct-1".into(),
            store: StoreArgs::default(),
        },
    )));
}

#[test]
fn ficha_command_dispatches_ficha_handler() {
    assert_dispatch::<FichaHandler>(Commands::Ficha(FichaCommands::Create(FichaCreateArgs {
        numero: "2558104".into(),
    })));
}
