mod aggregate;
mod attempts;
mod endpoints;
mod guard;
mod http;
mod quiz;
mod session;

use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use aggregate::aggregate_skills;
use endpoints::{CvFile, QuizOutcome};
use http::{ApiClient, HttpTransport};
use quiz::{Answer, QuizSession};
use session::{FileBackend, SessionStore};

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Parser)]
#[command(name = "vericv")]
#[command(about = "CV screening from the terminal - upload, quiz, interview, report")]
struct Cli {
    /// API base URL (or set VERICV_API_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Register {
        /// Username to register
        username: String,

        /// Display name (defaults to the username)
        #[arg(short, long)]
        name: Option<String>,

        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Sign in
    Login {
        /// Username
        username: String,

        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Sign out and forget stored tokens
    Logout,

    /// Show session state
    Status,

    /// Upload a CV PDF and extract contact fields
    Upload {
        /// Path to the PDF
        file: PathBuf,

        /// CV title (defaults to the filename)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Correct extracted contact fields on the uploaded CV
    Confirm {
        /// Corrected full name
        #[arg(long)]
        name: Option<String>,

        /// Corrected phone number
        #[arg(long)]
        phone: Option<String>,

        /// Corrected city
        #[arg(long)]
        city: Option<String>,
    },

    /// Generate a quiz from your CV and take it interactively
    Quiz {
        /// Generate from a fresh PDF instead of the uploaded CV
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Show a quiz result with per-skill breakdown
    Results {
        /// Result ID (defaults to the most recent)
        result_id: Option<String>,
    },

    /// Voice interview
    Interview {
        #[command(subcommand)]
        command: InterviewCommands,
    },

    /// Download the assessment report PDF
    Report {
        /// Output path
        #[arg(short, long, default_value = "vericv-report.pdf")]
        output: PathBuf,

        /// Interview ID to include
        #[arg(long)]
        interview: Option<String>,
    },
}

#[derive(Subcommand)]
enum InterviewCommands {
    /// Generate interview questions and open a session
    Start,

    /// Submit a recorded answer
    Submit {
        /// Interview ID from `interview start`
        interview_id: String,

        /// Path to the audio recording (webm, wav, mp3, ogg, m4a)
        audio: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let base_url = cli
        .base_url
        .or_else(|| std::env::var("VERICV_API_URL").ok())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let session_path =
        FileBackend::default_path().context("could not locate a session directory")?;
    let session = SessionStore::open(Arc::new(FileBackend::new(session_path)))?;
    let client = ApiClient::new(Arc::new(HttpTransport::new(&base_url)), session);

    match cli.command {
        Commands::Register {
            username,
            name,
            password,
        } => {
            let password = password_or_prompt(password)?;
            let display_name = client
                .register(&username, name.as_deref(), &password)
                .await?;
            println!("Welcome, {display_name}! You are signed in.");
            println!("Upload your CV with: vericv upload <file.pdf>");
        }

        Commands::Login { username, password } => {
            let password = password_or_prompt(password)?;
            client.login(&username, &password).await?;
            println!("Signed in as {username}.");
        }

        Commands::Logout => {
            if client.session.is_authenticated() {
                client.logout()?;
                println!("Signed out.");
            } else {
                println!("Not signed in.");
            }
        }

        Commands::Status => {
            let session = &client.session;
            let signed_in = if session.is_authenticated() { "yes" } else { "no" };
            println!("{:<14} {}", "Signed in:", signed_in);
            if let Some(name) = session.display_name() {
                println!("{:<14} {}", "User:", name);
            }
            if let Some(cv) = session.last_cv_id() {
                println!("{:<14} {}", "CV:", cv);
            }
            if let Some(quiz) = session.last_quiz_id() {
                println!("{:<14} {}", "Quiz:", quiz);
            }
            if let Some(result) = session.last_result_id() {
                println!("{:<14} {}", "Result:", result);
            }
            if let Some(language) = session.language() {
                println!("{:<14} {}", "Language:", language);
            }
        }

        Commands::Upload { file, title } => {
            let cv_file = load_cv_file(&file)?;
            println!("Uploading {}...", cv_file.filename);
            let cv = client.upload_cv(cv_file, title.as_deref()).await?;

            println!("CV stored ({}).", cv.cv_id);
            println!();
            println!("{:<14} {}", "Name:", field_or_dash(&cv.extracted_name));
            println!("{:<14} {}", "Phone:", field_or_dash(&cv.extracted_phone));
            println!("{:<14} {}", "City:", field_or_dash(&cv.extracted_city));
            if let Some(city) = &cv.ip_detected_city {
                println!("{:<14} {}", "Detected city:", city);
            }
            println!("{:<14} {}", "Language:", cv.detected_language);
            if !cv.job_titles.is_empty() {
                println!("{:<14} {}", "Job titles:", cv.job_titles.join(", "));
            }
            println!();
            println!("Fix any field with `vericv confirm --name ... --phone ... --city ...`,");
            println!("then take the quiz with `vericv quiz`.");
        }

        Commands::Confirm { name, phone, city } => {
            let status = client
                .confirm_cv(name.as_deref(), phone.as_deref(), city.as_deref())
                .await?;
            println!("{status}.");
        }

        Commands::Quiz { file } => {
            let cv_file = file.as_deref().map(load_cv_file).transpose()?;
            run_quiz(&client, cv_file).await?;
        }

        Commands::Results { result_id } => {
            let outcome = client.fetch_result(result_id.as_deref()).await?;
            println!("Result {} (quiz {})", outcome.result_id, outcome.quiz_id);
            println!();
            print_outcome(&outcome);
        }

        Commands::Interview { command } => match command {
            InterviewCommands::Start => {
                println!("Preparing interview questions...");
                let started = client.start_interview().await?;

                println!();
                println!("Interview {} is open.", started.interview_id);
                println!(
                    "Answer the questions below in one recording ({}):",
                    format_secs(started.duration_seconds)
                );
                for (i, question) in started.questions.iter().enumerate() {
                    println!("  {}. {}", i + 1, question);
                }
                println!();
                println!(
                    "Submit with: vericv interview submit {} <recording.webm>",
                    started.interview_id
                );
            }

            InterviewCommands::Submit {
                interview_id,
                audio,
            } => {
                let bytes = std::fs::read(&audio)
                    .with_context(|| format!("Failed to read {}", audio.display()))?;
                let filename = audio
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("answer.webm")
                    .to_string();

                println!("Uploading and evaluating your answer...");
                let outcome = client
                    .submit_interview(&interview_id, &filename, bytes)
                    .await?;

                println!("Interview {} {}.", outcome.interview_id, outcome.status);
                if outcome.transcription.is_empty() {
                    println!("No transcription was produced; evaluation skipped.");
                } else {
                    println!();
                    println!("Transcription:\n{}", outcome.transcription);
                }
                if let Some(scores) = &outcome.evaluation {
                    println!();
                    println!("{:<16} {:>3}/100", "Soft skills:", scores.soft_skills_score);
                    println!(
                        "{:<16} {:>3}/100",
                        "Communication:", scores.communication_score
                    );
                    println!("{:<16} {:>3}/100", "Confidence:", scores.confidence_score);
                    if !scores.feedback.is_empty() {
                        println!("\n{}", scores.feedback);
                    }
                    if !scores.suggestions.is_empty() {
                        println!("\nSuggestions: {}", scores.suggestions);
                    }
                }
            }
        },

        Commands::Report { output, interview } => {
            println!("Building report...");
            let pdf = client.download_report(interview.as_deref()).await?;
            std::fs::write(&output, &pdf)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Report saved to {} ({} bytes).", output.display(), pdf.len());
        }
    }

    Ok(())
}

// ────────────────────────────────────────────
// Quiz loop
// ────────────────────────────────────────────

async fn run_quiz(client: &ApiClient, cv_file: Option<CvFile>) -> Result<()> {
    println!("Generating quiz questions, this can take a moment...");

    let mut session = QuizSession::new();
    let questions = match client.generate_quiz(cv_file).await {
        Ok(questions) => questions,
        Err(e) => {
            session.fail(&e.to_string());
            return Err(e.into());
        }
    };

    session
        .load_questions(questions)
        .map_err(anyhow::Error::msg)?;

    println!(
        "Quiz ready: {} questions, {} on the clock. Answer with the option number,",
        session.questions.len(),
        session.format_remaining()
    );
    println!("then `n` for next, `p` for previous, `submit` at the end, `q` to abandon.");

    let started = Instant::now();
    let mut ticked: u64 = 0;

    loop {
        let elapsed = started.elapsed().as_secs();
        session.tick(elapsed - ticked);
        ticked = elapsed;

        let (text, options, skill, position) = {
            let Some(question) = session.current_question() else {
                return Ok(());
            };
            (
                question.text.clone(),
                question.options.clone(),
                question.skill_label().map(str::to_string),
                session.current + 1,
            )
        };

        println!();
        println!(
            "[{}] Question {}/{} ({} answered)",
            session.format_remaining(),
            position,
            session.questions.len(),
            session.answered_count()
        );
        match &skill {
            Some(skill) => println!("({skill}) {text}"),
            None => println!("{text}"),
        }
        match &options {
            Some(options) => {
                for (i, option) in options.iter().enumerate() {
                    let marker = if session.current_answer() == Some(&Answer::Choice(i)) {
                        "*"
                    } else {
                        " "
                    };
                    println!(" {marker}{}) {}", i + 1, option);
                }
            }
            None => println!("(free-text answer)"),
        }

        let input = read_line("> ")?;
        match input.as_str() {
            "" => {}
            "q" | "quit" => {
                println!("Quiz abandoned; nothing was submitted.");
                return Ok(());
            }
            "p" | "prev" => {
                session.prev();
            }
            "n" | "next" => {
                if !session.next() {
                    if session.is_last() {
                        println!("This is the last question; finish with `submit`.");
                    } else {
                        println!("Answer this question first.");
                    }
                }
            }
            "submit" => {
                if submit_quiz(client, &mut session).await? {
                    return Ok(());
                }
            }
            other => match &options {
                Some(options) => match other.parse::<usize>() {
                    Ok(number) if (1..=options.len()).contains(&number) => {
                        session.select_answer(Answer::Choice(number - 1));
                        if session.is_last() && session.all_answered() {
                            println!("All questions answered; finish with `submit`.");
                        }
                    }
                    _ => println!("Pick an option between 1 and {}.", options.len()),
                },
                None => {
                    session.select_answer(Answer::Text(other.to_string()));
                }
            },
        }
    }
}

/// Submits the finished quiz. Returns true when the run is over, false
/// when the user chose to keep answering after a rejected submit.
async fn submit_quiz(client: &ApiClient, session: &mut QuizSession) -> Result<bool> {
    let payload = match session.begin_submit() {
        Ok(payload) => payload,
        Err(reason) => {
            println!(
                "{reason} ({} of {} answered).",
                session.answered_count(),
                session.questions.len()
            );
            return Ok(false);
        }
    };

    println!("Scoring your answers...");
    match client.submit_answers(payload).await {
        Ok(outcome) => {
            session.complete();
            println!();
            print_outcome(&outcome);
            println!("\nNext: `vericv interview start` or `vericv report`.");
            Ok(true)
        }
        Err(e) => {
            session.fail(&e.to_string());
            println!("Submission failed: {e}");
            let again = read_line("Try again? [y/N] ")?;
            if again.eq_ignore_ascii_case("y") {
                session.resume();
                Ok(false)
            } else {
                Err(e.into())
            }
        }
    }
}

fn print_outcome(outcome: &QuizOutcome) {
    println!(
        "Score: {:.2}% ({} of {} correct)",
        outcome.score, outcome.correct, outcome.total
    );

    let summary = aggregate_skills(&outcome.answers);
    if !summary.skills.is_empty() {
        println!();
        println!("{:<22} {:>7} {:>9}", "SKILL", "SCORE", "CORRECT");
        println!("{}", "-".repeat(40));
        for skill in &summary.skills {
            println!(
                "{:<22} {:>6}% {:>5}/{}",
                truncate(&skill.skill, 20),
                skill.score,
                skill.correct,
                skill.total
            );
        }
        if !summary.strengths.is_empty() {
            println!("\nStrengths: {}", summary.strengths.join(", "));
        }
        if !summary.improvement_areas.is_empty() {
            println!("Improvement areas: {}", summary.improvement_areas.join(", "));
        }
    }

    let missed: Vec<_> = outcome.answers.iter().filter(|a| !a.is_correct).collect();
    if !missed.is_empty() {
        println!("\nMissed questions:");
        for answer in &missed {
            println!("  - {}", truncate(&answer.question, 70));
        }
    }

    if !outcome.feedback.is_empty() {
        println!("\n{}", outcome.feedback);
    }
}

// ────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────

fn load_cv_file(path: &Path) -> Result<CvFile> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("cv.pdf")
        .to_string();

    Ok(CvFile {
        filename,
        content_type: None,
        bytes,
    })
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(password) => Ok(password),
        None => read_line("Password: "),
    }
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn field_or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn format_secs(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

// Char-based so Arabic question text never splits mid-character.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
