//! Subcommand handlers. Each one opens a page, drives it to completion and
//! prints what the page shows. Failures are printed as the page would show
//! them and then returned, so `main` can exit non-zero.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use colored::Color;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::Commands;
use crate::config::Config;
use crate::coordinator::{AnalysisSnapshot, CoordinatorState};
use crate::errors::AppError;
use crate::pages::requirements::{apply_edits, EditOp};
use crate::pages::{self, read_files, Theme, ViewState};
use crate::progress::UploadProgressTracker;
use crate::router::{Location, Stage};
use crate::transport::MatcherApi;

pub async fn run_command(
    command: Commands,
    config: &Config,
    api: Arc<dyn MatcherApi>,
    theme: Theme,
) -> Result<(), AppError> {
    match command {
        Commands::UploadJd { file } => {
            upload_jd(api.as_ref(), &[file], theme).await?;
        }
        Commands::Requirements {
            jd_id,
            set,
            delete,
            add,
            reset,
            confirm,
        } => {
            let ops: Vec<EditOp> = set.into_iter().chain(delete).chain(add).collect();
            requirements(api, &jd_id, &ops, reset, confirm, theme).await?;
        }
        Commands::UploadCvs {
            jd_id,
            files,
            no_wait,
        } => {
            upload_cvs(api, config, &jd_id, &files, !no_wait, theme).await?;
        }
        Commands::Results { session_id } => {
            results(api.as_ref(), &session_id, theme).await?;
        }
        Commands::Open { location, files } => {
            let location = Location::parse(&location)?;
            info!(%location, stage = ?location.stage(), "Opening location");
            open(location, &files, config, api, theme).await?;
        }
        Commands::Run { jd, cvs } => {
            run_pipeline(jd, &cvs, config, api, theme).await?;
        }
    }
    Ok(())
}

async fn open(
    location: Location,
    files: &[PathBuf],
    config: &Config,
    api: Arc<dyn MatcherApi>,
    theme: Theme,
) -> Result<(), AppError> {
    match location {
        Location::Home => print!("{}", home(&theme)),
        Location::UploadJd => {
            upload_jd(api.as_ref(), files, theme).await?;
        }
        Location::RequirementsEditor { jd_id } => {
            requirements(api, &jd_id, &[], false, false, theme).await?;
        }
        Location::UploadCvs { jd_id } => {
            upload_cvs(api, config, &jd_id, files, true, theme).await?;
        }
        Location::Results { session_id } => {
            results(api.as_ref(), &session_id, theme).await?;
        }
    }
    Ok(())
}

/// Upload, confirm the requirements as extracted, analyze, show results.
async fn run_pipeline(
    jd: PathBuf,
    cvs: &[PathBuf],
    config: &Config,
    api: Arc<dyn MatcherApi>,
    theme: Theme,
) -> Result<(), AppError> {
    let Location::RequirementsEditor { jd_id } = upload_jd(api.as_ref(), &[jd], theme).await?
    else {
        return Err(AppError::Workflow(
            "JD upload did not lead to the requirements editor".to_string(),
        ));
    };
    println!();

    if requirements(Arc::clone(&api), &jd_id, &[], false, true, theme)
        .await?
        .is_none()
    {
        return Ok(());
    }
    println!();

    let Some(Location::Results { session_id }) =
        upload_cvs(Arc::clone(&api), config, &jd_id, cvs, true, theme).await?
    else {
        return Ok(());
    };
    println!();

    results(api.as_ref(), &session_id, theme).await
}

// ────────────────────────────────────────────────────────────────────────────
// Stages
// ────────────────────────────────────────────────────────────────────────────

async fn upload_jd(
    api: &dyn MatcherApi,
    files: &[PathBuf],
    theme: Theme,
) -> Result<Location, AppError> {
    print_stage(Stage::UploadJd, &theme);
    if files.len() > 1 {
        return Err(AppError::validation(
            "Only one Job Description file can be uploaded.",
        ));
    }

    let file = read_files(files).await?.into_iter().next();
    let bar = spinner("Uploading Job Description...");
    let tracker = Arc::new(bar_tracker("jd", bar.clone()));
    let outcome = pages::upload_jd::submit_jd(api, file, tracker).await;
    bar.finish_and_clear();

    match outcome {
        Ok(next) => {
            println!(
                "{}",
                theme.paint("Job Description uploaded successfully.", Color::Green)
            );
            print_next(&next, &theme);
            Ok(next)
        }
        Err(e) => {
            println!(
                "{}",
                theme.paint(&pages::upload_jd::failure_message(&e), Color::Red)
            );
            Err(e)
        }
    }
}

/// Returns the CV upload location once the requirements are confirmed.
async fn requirements(
    api: Arc<dyn MatcherApi>,
    raw_jd_id: &str,
    ops: &[EditOp],
    reset: bool,
    confirm: bool,
    theme: Theme,
) -> Result<Option<Location>, AppError> {
    print_stage(Stage::RequirementsEditor, &theme);
    let loading = spinner("Loading JD requirements...");
    let state = pages::requirements::open(api, raw_jd_id).await;
    loading.finish_and_clear();

    let Some(mut editor) = show_unless_ready(state, &theme)? else {
        return Ok(None);
    };
    apply_edits(&mut editor, reset, ops);
    print!("{}", pages::requirements::render(&editor, &theme));

    if !confirm {
        println!(
            "\nRun `matcher requirements {} --confirm` with the same edits to save and continue.",
            editor.jd_id()
        );
        return Ok(None);
    }

    let saving = spinner("Saving requirements...");
    let outcome = editor.confirm().await;
    saving.finish_and_clear();

    match outcome {
        Ok(next) => {
            println!(
                "\n{}",
                theme.paint("Requirements confirmed successfully.", Color::Green)
            );
            print_next(&next, &theme);
            Ok(Some(next))
        }
        Err(e) => {
            println!(
                "\n{}",
                theme.paint(
                    &format!("Failed to save confirmed requirements: {e}"),
                    Color::Red
                )
            );
            Err(e)
        }
    }
}

/// Uploads and analyzes CVs. Returns the results location once a session
/// exists and, when `wait` is set, has finished.
async fn upload_cvs(
    api: Arc<dyn MatcherApi>,
    config: &Config,
    raw_jd_id: &str,
    files: &[PathBuf],
    wait: bool,
    theme: Theme,
) -> Result<Option<Location>, AppError> {
    print_stage(Stage::UploadCvs, &theme);
    let mut coordinator = pages::upload_cvs::open(api, raw_jd_id, config.poll_settings())?;
    coordinator.select_files(read_files(files).await?);

    let bar = spinner("Uploading CVs...");
    let follower = tokio::spawn(follow(coordinator.subscribe(), bar.clone()));

    let cancel = coordinator.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling the analysis run");
            cancel.cancel();
        }
    });

    let mut outcome = coordinator.submit().await.map(|_| ());
    if outcome.is_ok() && wait {
        outcome = coordinator.poll_to_completion().await.map(|_| ());
    }

    interrupt.abort();
    follower.abort();
    bar.finish_and_clear();

    let snapshot = coordinator.snapshot();
    print!(
        "{}",
        pages::upload_cvs::render_snapshot(coordinator.jd_id(), &snapshot, &theme)
    );

    match outcome {
        Ok(()) => {
            let next = coordinator.results_location();
            if let Some(next) = &next {
                if !wait {
                    println!("Analysis continues on the server.");
                }
                print_next(next, &theme);
            }
            Ok(next)
        }
        Err(AppError::Superseded) => {
            println!("{}", theme.paint("Analysis run cancelled.", Color::Yellow));
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

async fn results(api: &dyn MatcherApi, raw_session_id: &str, theme: Theme) -> Result<(), AppError> {
    print_stage(Stage::Results, &theme);
    let loading = spinner("Loading analysis results...");
    let state = pages::results::load(api, raw_session_id).await;
    loading.finish_and_clear();

    if let Some(view) = show_unless_ready(state, &theme)? {
        print!("{}", pages::results::render(&view, &theme));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Output helpers
// ────────────────────────────────────────────────────────────────────────────

fn home(theme: &Theme) -> String {
    let mut out = String::new();
    out.push_str(&theme.heading("CV/JD Matcher"));
    out.push_str("\nMatch candidate CVs against a job description in four steps:\n");
    for stage in [
        Stage::UploadJd,
        Stage::RequirementsEditor,
        Stage::UploadCvs,
        Stage::Results,
    ] {
        let usage = match stage {
            Stage::UploadJd => "matcher open /upload-jd <FILE>",
            Stage::RequirementsEditor => "matcher open /jd-requirements-editor/<JD_ID>",
            Stage::UploadCvs => "matcher open /upload-cvs/<JD_ID> <FILES>...",
            Stage::Results => "matcher open /results/<SESSION_ID>",
        };
        out.push_str(&format!(
            "  {}. {:<24} {}\n",
            stage.step(),
            stage.title(),
            theme.paint(usage, Color::Cyan)
        ));
    }
    out
}

fn print_stage(stage: Stage, theme: &Theme) {
    println!(
        "{}",
        theme.heading(&format!(
            "Step {}/{}: {}",
            stage.step(),
            Stage::COUNT,
            stage.title()
        ))
    );
}

fn print_next(location: &Location, theme: &Theme) {
    println!(
        "Next: {}",
        theme.paint(&format!("matcher open {location}"), Color::Cyan)
    );
}

/// Prints any non-ready view and hands back the ready value, if there is one.
fn show_unless_ready<T>(state: ViewState<T>, theme: &Theme) -> Result<Option<T>, AppError> {
    if !state.is_ready() {
        println!("{}", state.render_with(theme, |_| String::new()));
    }
    Ok(state.into_result()?.into_ready())
}

// ────────────────────────────────────────────────────────────────────────────
// Progress display
// ────────────────────────────────────────────────────────────────────────────

fn spinner(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Switches a spinner to a determinate 0-100 bar on the first known percentage.
fn show_percent(bar: &ProgressBar, percent: u8) {
    if bar.length().is_none() {
        let style = ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_length(100);
    }
    bar.set_position(u64::from(percent));
}

fn bar_tracker(label: &'static str, bar: ProgressBar) -> UploadProgressTracker {
    UploadProgressTracker::new(label, move |percent| show_percent(&bar, percent))
}

/// Mirrors coordinator snapshots onto the progress bar until aborted.
async fn follow(mut snapshots: watch::Receiver<AnalysisSnapshot>, bar: ProgressBar) {
    loop {
        {
            let snapshot = snapshots.borrow_and_update();
            match &snapshot.state {
                CoordinatorState::UploadingCvs => {
                    if let Some(percent) = snapshot.upload_percent {
                        show_percent(&bar, percent);
                    }
                }
                CoordinatorState::StartingAnalysis => bar.set_message("Starting analysis..."),
                CoordinatorState::Polling { .. } => {
                    show_percent(&bar, snapshot.analysis_percent);
                    if let Some(line) = &snapshot.status_line {
                        bar.set_message(line.clone());
                    }
                    if snapshot.stalled {
                        bar.set_message("Progress has not changed for several polls");
                    }
                }
                _ => {}
            }
        }
        if snapshots.changed().await.is_err() {
            break;
        }
    }
}
