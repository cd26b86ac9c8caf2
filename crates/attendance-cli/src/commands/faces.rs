use std::any::Any;
use std::process::ExitCode;

use attendance_face_core::faces::{
    DuplicateCheckOutcome, FaceEnrollmentOutcome, FaceExtractionOutcome, FaceRemovalOutcome,
};

use crate::cli::{
    FaceCheckArgs, FaceEnrollArgs, FaceExtractArgs, FaceListArgs, FaceRemoveArgs, FacesCommands,
    OutputMode,
};
use crate::commands::CommandHandler;
use crate::errors::AppResult;
use crate::faces::{self, FaceListing};
use crate::output::{
    render_face_check, render_face_enroll, render_face_extract, render_face_list,
    render_face_remove,
};

pub struct FacesHandler {
    command: FacesCommands,
    deps: FacesHandlerDeps,
}

pub struct FacesHandlerDeps {
    pub extract:
        Box<dyn Fn(&FaceExtractArgs) -> AppResult<FaceExtractionOutcome> + Send + Sync>,
    pub check: Box<dyn Fn(&FaceCheckArgs) -> AppResult<DuplicateCheckOutcome> + Send + Sync>,
    pub enroll: Box<dyn Fn(&FaceEnrollArgs) -> AppResult<FaceEnrollmentOutcome> + Send + Sync>,
    pub list: Box<dyn Fn(&FaceListArgs) -> AppResult<FaceListing> + Send + Sync>,
    pub remove: Box<dyn Fn(&FaceRemoveArgs) -> AppResult<FaceRemovalOutcome> + Send + Sync>,
    pub render_extract:
        Box<dyn Fn(&FaceExtractionOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
    pub render_check:
        Box<dyn Fn(&DuplicateCheckOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
    pub render_enroll:
        Box<dyn Fn(&FaceEnrollmentOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
    pub render_list: Box<dyn Fn(&FaceListing, OutputMode) -> AppResult<()> + Send + Sync>,
    pub render_remove: Box<dyn Fn(&FaceRemovalOutcome, OutputMode) -> AppResult<()> + Send + Sync>,
}

impl FacesHandlerDeps {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        extract: impl Fn(&FaceExtractArgs) -> AppResult<FaceExtractionOutcome> + Send + Sync + 'static,
        check: impl Fn(&FaceCheckArgs) -> AppResult<DuplicateCheckOutcome> + Send + Sync + 'static,
        enroll: impl Fn(&FaceEnrollArgs) -> AppResult<FaceEnrollmentOutcome> + Send + Sync + 'static,
        list: impl Fn(&FaceListArgs) -> AppResult<FaceListing> + Send + Sync + 'static,
        remove: impl Fn(&FaceRemoveArgs) -> AppResult<FaceRemovalOutcome> + Send + Sync + 'static,
        render_extract: impl Fn(&FaceExtractionOutcome, OutputMode) -> AppResult<()>
            + Send
            + Sync
            + 'static,
        render_check: impl Fn(&DuplicateCheckOutcome, OutputMode) -> AppResult<()>
            + Send
            + Sync
            + 'static,
        render_enroll: impl Fn(&FaceEnrollmentOutcome, OutputMode) -> AppResult<()>
            + Send
            + Sync
            + 'static,
        render_list: impl Fn(&FaceListing, OutputMode) -> AppResult<()> + Send + Sync + 'static,
        render_remove: impl Fn(&FaceRemovalOutcome, OutputMode) -> AppResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            extract: Box::new(extract),
            check: Box::new(check),
            enroll: Box::new(enroll),
            list: Box::new(list),
            remove: Box::new(remove),
            render_extract: Box::new(render_extract),
            render_check: Box::new(render_check),
            render_enroll: Box::new(render_enroll),
            render_list: Box::new(render_list),
            render_remove: Box::new(render_remove),
        }
    }
}

impl Default for FacesHandlerDeps {
    fn default() -> Self {
        Self::new(
            faces::run_face_extraction,
            faces::run_duplicate_check,
            faces::run_face_enrollment,
            faces::run_face_listing,
            faces::run_face_removal,
            render_face_extract,
            render_face_check,
            render_face_enroll,
            render_face_list,
            render_face_remove,
        )
    }
}

impl FacesHandler {
    pub fn new(command: FacesCommands) -> Self {
        Self {
            command,
            deps: FacesHandlerDeps::default(),
        }
    }

    pub fn with_dependencies(command: FacesCommands, deps: FacesHandlerDeps) -> Self {
        Self { command, deps }
    }
}

impl CommandHandler for FacesHandler {
    fn execute(&self, mode: OutputMode, _verbose: bool) -> AppResult<ExitCode> {
        match &self.command {
            FacesCommands::Extract(args) => {
                let outcome = (self.deps.extract)(args)?;
                (self.deps.render_extract)(&outcome, mode)?;
            }
            FacesCommands::Check(args) => {
                let outcome = (self.deps.check)(args)?;
                (self.deps.render_check)(&outcome, mode)?;
            }
            FacesCommands::Enroll(args) => {
                let outcome = (self.deps.enroll)(args)?;
                (self.deps.render_enroll)(&outcome, mode)?;
            }
            FacesCommands::List(args) => {
                let listing = (self.deps.list)(args)?;
                (self.deps.render_list)(&listing, mode)?;
            }
            FacesCommands::Remove(args) => {
                let outcome = (self.deps.remove)(args)?;
                (self.deps.render_remove)(&outcome, mode)?;
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
