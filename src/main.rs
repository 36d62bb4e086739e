//! Exam Proctor CLI
//!
//! Timed, monitored exam sessions and offline risk reports.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::{unbounded, Receiver, Sender};
use exam_proctor::{
    audit::{AuditLog, SharedAuditLog},
    capture::{NoopCamera, UnavailableCamera},
    config::Config,
    core::{
        format_remaining, CatalogDetector, ExamDefinition, JsonFileSink, SessionBuilder,
        SessionEvent, SessionState, LOW_TIME_WARNING,
    },
    identity::{Credentials, IdentityProvider, MockIdentityProvider, Role},
    risk::{
        load_reports, ReportQuery, ReportSummary, RiskScoringEngine, RiskStatus, SignalCounts,
        SortKey,
    },
    runner::{Command, SessionRunner},
    MONITORING_NOTICE, VERSION,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "exam-proctor")]
#[command(version = VERSION)]
#[command(about = "Timed exam sessions with integrity monitoring", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sit an exam as a student
    ///
    /// Reads commands from stdin: `answer <id> <text>`, `status`, `submit`,
    /// `abort`. Closing stdin aborts the session.
    Start {
        /// Student username
        #[arg(long)]
        student: String,

        /// Student password
        #[arg(long)]
        password: String,

        /// Exam definition (JSON); the built-in sample exam if omitted
        #[arg(long)]
        exam: Option<PathBuf>,

        /// Override the exam duration in seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Run without a camera (degraded mode)
        #[arg(long)]
        no_camera: bool,

        /// Seed for reproducible integrity alerts
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Score a set of raw integrity signals
    Score {
        /// Plagiarism similarity, 0-100
        #[arg(long)]
        plagiarism: f64,

        /// Keystroke anomaly count
        #[arg(long, default_value = "0")]
        keystroke: u32,

        /// Webcam alert count
        #[arg(long, default_value = "0")]
        webcam: u32,
    },

    /// List and summarise student reports
    Report {
        /// JSON file of report inputs
        file: PathBuf,

        /// Match student name or exam title
        #[arg(long)]
        search: Option<String>,

        /// Only show one status (clean, suspicious, flagged)
        #[arg(long)]
        status: Option<String>,

        /// Only show one exam title
        #[arg(long)]
        exam: Option<String>,

        /// Sort by date, name or risk
        #[arg(long, default_value = "date")]
        sort: String,
    },

    /// Display the monitoring notice and cumulative monitoring counts
    Notice,

    /// Show configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start {
            student,
            password,
            exam,
            duration,
            no_camera,
            seed,
        } => cmd_start(student, password, exam, duration, no_camera, seed),
        Commands::Score {
            plagiarism,
            keystroke,
            webcam,
        } => cmd_score(plagiarism, keystroke, webcam),
        Commands::Report {
            file,
            search,
            status,
            exam,
            sort,
        } => cmd_report(file, search, status, exam, &sort),
        Commands::Notice => cmd_notice(),
        Commands::Config => cmd_config(),
    }
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: {e}; using default configuration");
            Config::default()
        }
    }
}

fn cmd_start(
    username: String,
    password: String,
    exam_path: Option<PathBuf>,
    duration: Option<u64>,
    no_camera: bool,
    seed: Option<u64>,
) -> Result<()> {
    let config = load_config();
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let identity = MockIdentityProvider
        .authenticate(&Credentials::new(username, password), Role::Student)
        .context("login failed")?;

    let mut exam = match exam_path {
        Some(path) => ExamDefinition::from_path(&path)
            .with_context(|| format!("could not load exam from {path:?}"))?,
        None => ExamDefinition {
            duration: config.exam_duration,
            ..ExamDefinition::sample()
        },
    };
    if let Some(secs) = duration {
        exam.duration = Duration::from_secs(secs);
    }

    println!("Exam Proctor v{VERSION}");
    println!("{MONITORING_NOTICE}");
    println!("Welcome, {} (id {})", identity.name, identity.id);
    println!(
        "{}: {} questions, {}",
        exam.title,
        exam.questions.len(),
        format_remaining(exam.duration.as_secs())
    );
    for question in &exam.questions {
        println!(
            "  [{}] {} (max {} characters)",
            question.id, question.prompt, question.max_length
        );
    }
    println!();
    println!("Commands: answer <id> <text> | status | submit | abort");
    println!();

    let detector = match seed {
        Some(seed) => CatalogDetector::with_seed(seed, config.alert_probability),
        None => CatalogDetector::from_entropy(config.alert_probability),
    };
    let builder = SessionBuilder::new(exam, identity)
        .detector(detector)
        .sink(JsonFileSink::new(config.export_path.clone()))
        .settings(config.session_settings());
    let builder = if no_camera {
        builder.camera(UnavailableCamera::no_device())
    } else {
        builder.camera(NoopCamera::new())
    };
    let (session, events) = builder.build().context("could not create session")?;

    let audit: SharedAuditLog = Arc::new(AuditLog::with_persistence(config.audit_path()));
    let remaining = Arc::new(AtomicU64::new(session.remaining().as_secs()));

    let (commands_tx, commands_rx) = unbounded();
    let runner = SessionRunner::new(session, commands_rx, config.poll_interval())
        .with_audit(audit.clone());
    ctrlc_handler(runner.running_flag())?;

    let printer = {
        let audit = audit.clone();
        let remaining = remaining.clone();
        thread::spawn(move || print_events(events, audit, remaining))
    };
    {
        let remaining = remaining.clone();
        thread::spawn(move || read_commands(commands_tx, remaining));
    }

    let outcome = runner.run();
    // The session is gone, so the event channel is closed
    let _ = printer.join();

    if let Err(e) = audit.save() {
        eprintln!("Warning: Could not save audit log: {e}");
    }

    println!();
    match (&outcome.state, &outcome.submission) {
        (SessionState::Submitted, Some(submission)) => {
            println!(
                "Submitted {} answer(s) after {}",
                submission.answers().len(),
                format_remaining(submission.time_spent_seconds())
            );
            println!("Submission saved under {:?}", config.export_path);
        }
        _ => println!("Session ended without a submission ({})", outcome.state),
    }
    let timing = &outcome.keystroke_timing;
    println!(
        "Typing: {:.1} keys/s, {} pause(s), burst index {:.2}",
        timing.typing_rate, timing.pause_count, timing.burst_index
    );
    println!();
    println!("{}", audit.summary());

    if let Some(fault) = outcome.integrity_fault {
        bail!("camera stream was not released: {fault}");
    }
    Ok(())
}

/// Render session events until the session is dropped.
fn print_events(events: Receiver<SessionEvent>, audit: SharedAuditLog, remaining: Arc<AtomicU64>) {
    let mut warned_low_time = false;

    for event in events {
        audit.observe(&event);
        match event {
            SessionEvent::Tick { remaining_secs } => {
                remaining.store(remaining_secs, Ordering::Relaxed);
                if remaining_secs < LOW_TIME_WARNING.as_secs() && !warned_low_time {
                    warned_low_time = true;
                    println!("Less than 5 minutes remaining!");
                } else if remaining_secs % 60 == 0 && remaining_secs > 0 {
                    println!("[{}] remaining", format_remaining(remaining_secs));
                }
            }
            SessionEvent::Alert(alert) => {
                println!(
                    "[{}] ALERT: {}",
                    alert.raised_at.format("%H:%M:%S"),
                    alert.reason
                );
            }
            SessionEvent::EditRejected { reason, .. } => println!("Rejected: {reason}"),
            SessionEvent::Expired => println!("Time is up. Submitting automatically..."),
            SessionEvent::Submitted { .. } => println!("Exam submitted."),
            SessionEvent::ResourceLeak { detail } => {
                eprintln!("Error: monitoring resource not released: {detail}");
            }
            SessionEvent::StateChanged { to, .. } => {
                if to == SessionState::Aborted {
                    println!("Session aborted.");
                }
            }
        }
    }
}

/// Forward stdin lines to the runner. Dropping the sender aborts the session.
fn read_commands(commands: Sender<Command>, remaining: Arc<AtomicU64>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
        let command = match verb {
            "answer" => {
                let (id, text) = rest.split_once(' ').unwrap_or((rest, ""));
                match id.parse::<u32>() {
                    Ok(question_id) => Command::EditAnswer {
                        question_id,
                        text: text.to_string(),
                    },
                    Err(_) => {
                        println!("Usage: answer <question id> <text>");
                        continue;
                    }
                }
            }
            "submit" => Command::Submit,
            "abort" => Command::Abort {
                reason: "student left the exam".to_string(),
            },
            "status" => {
                println!(
                    "Time remaining: {}",
                    format_remaining(remaining.load(Ordering::Relaxed))
                );
                continue;
            }
            _ => {
                println!("Unknown command: {verb}");
                continue;
            }
        };

        let finished = matches!(command, Command::Submit | Command::Abort { .. });
        if commands.send(command).is_err() || finished {
            break;
        }
    }
}

fn cmd_score(plagiarism: f64, keystroke: u32, webcam: u32) -> Result<()> {
    let config = load_config();
    let engine = RiskScoringEngine::new(config.risk).context("invalid risk weights")?;
    let assessment = engine.assess(&SignalCounts::new(plagiarism, keystroke, webcam));

    let mark = |elevated: bool| if elevated { " (elevated)" } else { "" };
    println!("Plagiarism score:    {plagiarism}{}", mark(assessment.flags.plagiarism));
    println!("Keystroke anomalies: {keystroke}{}", mark(assessment.flags.keystroke));
    println!("Webcam alerts:       {webcam}{}", mark(assessment.flags.webcam));
    println!();
    println!("Overall risk score:  {}", assessment.overall_risk_score);
    println!("Status:              {}", assessment.status);
    if assessment.flags.any() {
        println!("Elevated signals warrant manual review.");
    }
    Ok(())
}

fn cmd_report(
    file: PathBuf,
    search: Option<String>,
    status: Option<String>,
    exam: Option<String>,
    sort: &str,
) -> Result<()> {
    let config = load_config();
    let engine = RiskScoringEngine::new(config.risk).context("invalid risk weights")?;
    let reports =
        load_reports(&file, &engine).with_context(|| format!("could not load {file:?}"))?;

    let query = ReportQuery {
        search,
        status: status.map(|s| s.parse::<RiskStatus>()).transpose()?,
        exam,
        sort: sort.parse::<SortKey>()?,
    };
    let selected = query.apply(&reports);

    println!(
        "  {:<24} {:<28} {:<10} {:>5} {:>5} {:>5} {:>5} {:<10}",
        "Student", "Exam", "Date", "Plag", "Keys", "Cam", "Risk", "Status"
    );
    for report in &selected {
        // Rows with an elevated signal are marked
        let mark = if report.flags().any() { '!' } else { ' ' };
        println!(
            "{} {:<24} {:<28} {:<10} {:>5} {:>5} {:>5} {:>5} {:<10}",
            mark,
            report.student_name,
            report.exam_title,
            report.exam_date.to_string(),
            report.plagiarism_score,
            report.keystroke_anomalies,
            report.webcam_alerts,
            report.overall_risk_score,
            report.status.to_string()
        );
    }

    let summary = ReportSummary::from_reports(selected.iter().copied());
    println!();
    println!("Total: {}", summary.total);
    println!("  Clean: {} ({}%)", summary.clean, summary.clean_share);
    println!("  Suspicious: {}", summary.suspicious);
    println!("  Flagged: {}", summary.flagged);
    println!("Average risk: {}", summary.average_risk);
    println!("Average completion: {}%", summary.average_completion);
    println!("Average time spent: {} minutes", summary.average_time_spent);
    println!("Review rate: {}%", summary.review_rate);
    Ok(())
}

fn cmd_notice() -> Result<()> {
    let config = load_config();
    println!("{MONITORING_NOTICE}");

    let path = config.audit_path();
    if !path.exists() {
        println!("No previous monitoring data found.");
        return Ok(());
    }

    let stats = AuditLog::with_persistence(path).stats();
    println!("Cumulative Monitoring:");
    println!("  Keystrokes timed: {}", stats.keystrokes);
    println!("  Answer edits: {}", stats.answer_edits);
    println!("  Alerts raised: {}", stats.alerts_raised);
    println!("  Submissions: {}", stats.submissions);
    println!("  Aborted sessions: {}", stats.aborts);
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("could not set Ctrl+C handler")
}
