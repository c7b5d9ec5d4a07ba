use clap::Subcommand;
use studyroom_core::{Database, ManualScheduler, ProgressStore, TimerEngine};

use super::load_settings;

#[derive(Subcommand)]
pub enum SubjectAction {
    /// Attach a subject to upcoming sessions
    Set {
        /// Subject identifier
        id: String,
    },
    /// Detach the current subject
    Clear,
    /// Print the current subject
    Show,
}

pub fn run(action: SubjectAction) -> Result<(), Box<dyn std::error::Error>> {
    let (_, settings, options) = load_settings()?;
    let db = Database::open()?;
    let progress = db.load_progress()?.unwrap_or_default();
    let mut engine = TimerEngine::restore(settings, progress, options, ManualScheduler::new());

    let subject_id = match action {
        SubjectAction::Show => {
            match &engine.state().subject_id {
                Some(id) => println!("{id}"),
                None => println!("(none)"),
            }
            return Ok(());
        }
        SubjectAction::Set { id } => Some(id),
        SubjectAction::Clear => None,
    };

    if engine.set_subject(subject_id).is_some() {
        db.save_progress(&engine.progress_state())?;
    }
    println!("ok");
    Ok(())
}
