use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use services::{
    AnswerOutcome, Clock, QuizService, SessionTable, SkipOutcome, StartOutcome, Sweeper, UserLocks,
    quiz_service::DEFAULT_LEADERBOARD_LIMIT,
};
use storage::catalog::default_catalog;
use storage::repository::Storage;
use trivia_core::model::UserId;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => write!(f, "invalid --user value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

struct Args {
    db_url: String,
    user_id: UserId,
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("TRIVIA_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://trivia.sqlite3".into(), normalize_sqlite_url);
        let mut user_id = std::env::var("TRIVIA_USER_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| UserId::new(1), UserId::new);

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    let parsed: UserId = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidUserId { raw: value.clone() })?;
                    user_id = parsed;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, user_id })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--db <sqlite_url>] [--user <id>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://trivia.sqlite3");
    eprintln!("  --user 1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  TRIVIA_DB_URL, TRIVIA_USER_ID, RUST_LOG");
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" || db_url.contains("mode=memory") {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn render_question(question: &trivia_core::model::Question) -> String {
    let options = question
        .options()
        .iter()
        .map(|opt| format!("- {opt}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Question time! Category: {}\n\n{}\nOptions:\n{}\n\nUse `answer <your answer>` to respond.",
        question.category(),
        question.text(),
        options
    )
}

async fn handle_command(
    service: &QuizService,
    current_user: &mut UserId,
    line: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim_start()),
        None => (line, ""),
    };

    let reply = match command {
        "quiz" => {
            let category = if rest.is_empty() { None } else { Some(rest) };
            match service.start(*current_user, category).await? {
                StartOutcome::Started(question) => render_question(&question),
                StartOutcome::AlreadyActive { question_text } => format!(
                    "You have an active question!\n\nQuestion: {question_text}\n\nType `answer <your answer>` or `skip` to move on."
                ),
                StartOutcome::Exhausted => {
                    "You have answered all available questions! Check your score with `stats`."
                        .to_owned()
                }
            }
        }
        "answer" => match service.submit_answer(*current_user, rest).await? {
            AnswerOutcome::Correct => "Correct answer! Congratulations!".to_owned(),
            AnswerOutcome::Incorrect { correct_answer } => {
                format!("Better luck next time... The correct answer was {correct_answer}!")
            }
            AnswerOutcome::NoActiveSession => {
                "You don't have an active question yet. Type `quiz` to start!".to_owned()
            }
        },
        "skip" => match service.skip(*current_user).await? {
            SkipOutcome::Next(question) => format!("Skipped!\n\n{}", render_question(&question)),
            SkipOutcome::Exhausted => {
                "Skipped! That was the last question available to you.".to_owned()
            }
            SkipOutcome::NoActiveSession => "Nothing to skip! Type `quiz` to start.".to_owned(),
        },
        "stats" => match service.stats(*current_user).await? {
            Some(stats) => format!(
                "Stats for user {}\nTotal quizzes: {}\nCorrect: {}\nIncorrect: {}\nWin rate: {:.1}%",
                stats.user_id(),
                stats.quizzes_taken(),
                stats.correct_count(),
                stats.incorrect_count(),
                stats.win_rate()
            ),
            None => "No stats found. Play a quiz first!".to_owned(),
        },
        "leaderboard" => {
            let board = service.leaderboard(DEFAULT_LEADERBOARD_LIMIT).await?;
            if board.is_empty() {
                "Leaderboard is empty.".to_owned()
            } else {
                let mut lines = vec!["Global leaderboard".to_owned()];
                for (rank, entry) in board.iter().enumerate() {
                    lines.push(format!(
                        "#{} user {} - {} pts",
                        rank + 1,
                        entry.user_id,
                        entry.correct_count
                    ));
                }
                lines.join("\n")
            }
        }
        "info" => {
            let categories = service.categories().await?;
            let cats = if categories.is_empty() {
                "No categories found.".to_owned()
            } else {
                categories.join(", ")
            };
            format!(
                "Trivia guide\n\
                 `quiz` - start a random question\n\
                 `quiz <category>` - start a specific category (e.g. `quiz Lore`)\n\
                 Available categories: {cats}\n\
                 `answer <your guess>` - submit an answer\n\
                 `skip` - give up and get the next question\n\
                 `stats` - see your personal score\n\
                 `leaderboard` - see the top 10 players\n\
                 `user <id>` - switch player\n\
                 `quit` - exit"
            )
        }
        "user" => match rest.parse::<UserId>() {
            Ok(user_id) => {
                *current_user = user_id;
                format!("Now playing as user {user_id}.")
            }
            Err(_) => "Usage: user <numeric id>".to_owned(),
        },
        "quit" | "exit" => return Ok(None),
        _ => "Unknown command! Try `quiz`, `answer <your answer>`, `skip`, `stats`, \
              `leaderboard` or `info`."
            .to_owned(),
    };

    Ok(Some(reply))
}

async fn command_loop(
    service: &QuizService,
    mut current_user: UserId,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    stdout
        .write_all(b"Trivia ready. Type `info` for commands.\n> ")
        .await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if !line.is_empty() {
            match handle_command(service, &mut current_user, line).await {
                Ok(Some(reply)) => {
                    stdout.write_all(reply.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                }
                Ok(None) => break,
                Err(err) => {
                    // Store hiccups are surfaced, never retried mid-command.
                    error!(%err, "command failed");
                    stdout
                        .write_all(b"Something went wrong, please try again.\n")
                        .await?;
                }
            }
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Open + migrate SQLite at startup. Keep this in the binary glue so
    // core/services stay pure.
    prepare_sqlite_file(&args.db_url)?;
    let storage = Storage::sqlite(&args.db_url).await?;

    if storage.questions.count_questions().await? == 0 {
        let catalog = default_catalog();
        storage.questions.import_catalog(&catalog).await?;
        info!(count = catalog.len(), "imported question catalog");
    }

    let clock = Clock::default_clock();
    let sessions = Arc::new(SessionTable::new());
    let locks = Arc::new(UserLocks::new());
    let service = QuizService::new(
        clock,
        Arc::clone(&sessions),
        Arc::clone(&locks),
        Arc::clone(&storage.questions),
        Arc::clone(&storage.users),
    );

    let config = service.config();
    let sweeper = Sweeper::new(clock, sessions, locks, config.session_timeout);
    let sweeper_handle = sweeper.spawn(config.sweep_interval);

    let result = command_loop(&service, args.user_id).await;
    sweeper_handle.shutdown().await;
    result
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
