use std::io::IsTerminal;
use std::sync::Arc;

use clap::Subcommand;
use studyroom_core::{
    spawn_ticker, ConfigStore, CoreError, Database, Event, ManualScheduler, Notification,
    Notifier, ProgressStore, SettingsPatch, SettingsStore, TimerEngine, TimerHandle,
    TimerService, TimerSnapshot, TracingNotifier,
};

use super::load_settings;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

const HELP: &str =
    "commands: (s)tart  (p)ause  (r)eset  s(k)ip  subject [id]  set <field> <value>  (q)uit";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run the timer in the foreground, reading commands from stdin
    Run {
        /// Exit after this many sessions complete naturally
        #[arg(long)]
        sessions: Option<u64>,
        /// Subject to attach before starting
        #[arg(long)]
        subject: Option<String>,
        /// Start the first session immediately
        #[arg(long)]
        start: bool,
    },
    /// Print the persisted timer state as JSON
    Status,
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Status => {
            let (_, settings, options) = load_settings()?;
            let db = Database::open()?;
            let progress = db.load_progress()?.unwrap_or_default();
            let engine = TimerEngine::restore(settings, progress, options, ManualScheduler::new());
            println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
            Ok(())
        }
        TimerAction::Run {
            sessions,
            subject,
            start,
        } => {
            let runtime = tokio::runtime::Runtime::new()?;
            let result = runtime.block_on(run_foreground(sessions, subject, start));
            // A pending stdin read would otherwise hold the process open.
            runtime.shutdown_background();
            result
        }
    }
}

/// Rings the terminal bell and prints a banner on stderr.
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notification: &Notification) {
        if notification.play_sound {
            eprint!("\x07");
        }
        if notification.show_banner {
            eprintln!("\n*** {} ***", notification.message());
        }
    }
}

async fn run_foreground(
    target: Option<u64>,
    subject: Option<String>,
    start: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (settings_store, settings, options) = load_settings()?;
    let db = Database::open()?;
    let progress = db.load_progress()?.unwrap_or_default();

    let notifiers = vec![
        Arc::new(TracingNotifier) as Arc<dyn Notifier>,
        Arc::new(TerminalNotifier) as Arc<dyn Notifier>,
    ];
    let (handle, service) = TimerService::spawn(settings, progress, options, notifiers);
    let ticker = spawn_ticker(handle.clone());
    let mut events = handle.subscribe();
    let mut snapshots = handle.watch();

    if subject.is_some() {
        handle.set_subject(subject)?;
    }
    if start {
        handle.start()?;
    }

    let draw = std::io::stderr().is_terminal();
    if draw {
        eprintln!("{HELP}");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut completed = 0u64;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => {
                        if !handle_line(&handle, &settings_store, line.trim()).await? {
                            break;
                        }
                    }
                    None => {
                        stdin_open = false;
                        // Without a session target nothing else would end the run.
                        if target.is_none() {
                            break;
                        }
                    }
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        println!("{}", serde_json::to_string(&event)?);
                        if let Event::SessionCompleted { session } = &event {
                            db.record_session(session)?;
                            completed += 1;
                        }
                        if event.touches_progress() {
                            db.save_progress(&handle.snapshot().state.progress())?;
                        }
                        if target.is_some_and(|n| completed >= n) {
                            info!(completed, "session target reached");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                if draw {
                    let snapshot = snapshots.borrow_and_update().clone();
                    eprint!("\r{}   ", status_line(&snapshot));
                }
            }
            _ = &mut ctrl_c => {
                debug!("interrupted");
                break;
            }
        }
    }

    if draw {
        eprintln!();
    }
    if handle.shutdown().is_err() {
        debug!("timer service already stopped");
    }
    let progress = service.await?;
    db.save_progress(&progress)?;
    ticker.await?;
    Ok(())
}

/// Applies one line of user input. Returns `false` when the user asked to quit.
async fn handle_line(
    handle: &TimerHandle,
    settings_store: &ConfigStore,
    line: &str,
) -> Result<bool, CoreError> {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    match command {
        "" => {}
        "s" | "start" => handle.start()?,
        "p" | "pause" => handle.pause()?,
        "r" | "reset" => handle.reset()?,
        "k" | "skip" => handle.skip()?,
        "subject" => {
            let subject_id = (!rest.is_empty()).then(|| rest.to_string());
            handle.set_subject(subject_id)?;
        }
        "set" => match parse_patch(rest) {
            Ok(patch) => match handle.update_settings(patch).await {
                Ok(settings) => settings_store.save(&settings)?,
                Err(CoreError::Validation(e)) => eprintln!("rejected: {e}"),
                Err(e) => return Err(e),
            },
            Err(message) => eprintln!("{message}"),
        },
        "q" | "quit" => return Ok(false),
        "h" | "help" => eprintln!("{HELP}"),
        other => eprintln!("unknown command: {other}"),
    }
    Ok(true)
}

/// Turns `"<field> <value>"` into a single-field [`SettingsPatch`].
fn parse_patch(input: &str) -> Result<SettingsPatch, String> {
    let Some((field, raw)) = input.split_once(char::is_whitespace) else {
        return Err("usage: set <field> <value>".to_string());
    };
    let raw = raw.trim();
    let value = if let Ok(n) = raw.parse::<i64>() {
        serde_json::Value::from(n)
    } else if let Some(f) = raw.parse::<f64>().ok().filter(|f| f.is_finite()) {
        serde_json::Value::from(f)
    } else if let Ok(b) = raw.parse::<bool>() {
        serde_json::Value::from(b)
    } else {
        return Err(format!("cannot parse value: {raw}"));
    };

    let mut object = serde_json::Map::new();
    object.insert(field.to_string(), value);
    let patch: SettingsPatch = serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|e| format!("invalid value for {field}: {e}"))?;
    if patch.is_empty() {
        return Err(format!("unknown setting: {field}"));
    }
    Ok(patch)
}

fn status_line(snapshot: &TimerSnapshot) -> String {
    let state = &snapshot.state;
    format!(
        "{} {:02}:{:02} [{:?}] round {}/{}",
        state.current_session_type.label(),
        state.time_remaining / 60,
        state.time_remaining % 60,
        state.status,
        state.current_round,
        snapshot.settings.sessions_until_long_break,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_patch_builds_single_field_patches() {
        let patch = parse_patch("work_duration 30").unwrap();
        assert_eq!(patch.work_duration, Some(30));

        let patch = parse_patch("sound_volume 0.25").unwrap();
        assert_eq!(patch.sound_volume, Some(0.25));

        let patch = parse_patch("auto_start_breaks true").unwrap();
        assert_eq!(patch.auto_start_breaks, Some(true));
    }

    #[test]
    fn parse_patch_keeps_negative_numbers_for_validation() {
        let patch = parse_patch("work_duration -5").unwrap();
        assert_eq!(patch.work_duration, Some(-5));
    }

    #[test]
    fn parse_patch_rejects_unknown_fields_and_garbage() {
        assert!(parse_patch("colour 3").unwrap_err().contains("unknown setting"));
        assert!(parse_patch("work_duration soon").is_err());
        assert!(parse_patch("work_duration").is_err());
        assert!(parse_patch("auto_start_breaks 3").is_err());
    }

    #[test]
    fn parse_patch_rejects_non_finite_numbers() {
        for raw in ["nan", "NaN", "inf", "-infinity"] {
            let err = parse_patch(&format!("sound_volume {raw}")).unwrap_err();
            assert!(err.contains("cannot parse value"), "{raw}: {err}");
        }
    }
}
