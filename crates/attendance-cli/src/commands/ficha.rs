use std::any::Any;
use std::process::ExitCode;

use attendance_face_core::accounts::Ficha;

use crate::accounts;
use crate::cli::{FichaCommands, FichaCreateArgs, OutputMode};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::output::render_ficha;

pub struct FichaHandler {
    command: FichaCommands,
    create: Box<dyn Fn(&FichaCreateArgs) -> AppResult<Ficha> + Send + Sync>,
    render: Box<dyn Fn(&Ficha, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl FichaHandler {
    pub fn new(command: FichaCommands) -> Self {
        Self::with_dependencies(command, accounts::run_ficha_creation, render_ficha)
    }

    pub fn with_dependencies(
        command: FichaCommands,
        create: impl Fn(&FichaCreateArgs) -> AppResult<Ficha> + Send + Sync + 'static,
        render: impl Fn(&Ficha, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            command,
            create: Box::new(create),
            render: Box::new(render),
        }
    }
}

impl CommandHandler for FichaHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        match &self.command {
            FichaCommands::Create(args) => {
                let ficha = (self.create)(args)?;
                (self.render)(&ficha, mode)?;
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
