use std::fmt;
use std::time::Duration;

use quiz_core::grading::Verdict;
use quiz_core::model::{CourseId, QuestionKind, SessionTarget, TopicId};
use quiz_core::scoreboard::Scoreboard;
use services::session::{AnswerMark, SessionPhase, SessionStep};
use services::{
    ApiConfig, AppServices, Clock, ExplanationConfig, QuestionReportService, QuizSession,
    SessionLoopService,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

/// Attempts to fetch missing answers before a question is given up on.
const ANSWER_RETRIES: u32 = 3;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingId { command: &'static str },
    UnknownArg(String),
    InvalidId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingId { command } => write!(f, "{command} requires an id"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidId { raw } => write!(f, "invalid id: {raw}"),
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- login <username>       [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- logout                 [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- topic <topic-id>       [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- challenge <course-id>  [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- review [--explain]     [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- scoreboard <course-id> [--db <sqlite_url>]");
    eprintln!();
    eprintln!("During a quiz: type answer numbers (e.g. `1 3`) or free text, then Enter.");
    eprintln!("`!` reports the question, `q` or end of input leaves the session.");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:quiz.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_API_URL, QUIZ_API_TIMEOUT_SECS, QUIZ_PASSWORD,");
    eprintln!("  QUIZ_AI_API_KEY, QUIZ_AI_BASE_URL, QUIZ_AI_MODEL, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Login { username: String },
    Logout,
    Quiz(SessionTarget),
    Review { explain: bool },
    Scoreboard(CourseId),
}

struct Args {
    db_url: String,
    command: Command,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let Some(name) = args.next() else {
            return Ok(None);
        };

        let mut explain = false;
        let command = match name.as_str() {
            "--help" | "-h" => return Ok(None),
            "login" => Command::Login {
                username: args.next().ok_or(ArgsError::MissingId { command: "login" })?,
            },
            "logout" => Command::Logout,
            "topic" => Command::Quiz(SessionTarget::Topic(parse_id::<TopicId>(
                args.next(),
                "topic",
            )?)),
            "challenge" => Command::Quiz(SessionTarget::Challenge(parse_id::<CourseId>(
                args.next(),
                "challenge",
            )?)),
            "review" => Command::Review { explain: false },
            "scoreboard" => Command::Scoreboard(parse_id::<CourseId>(args.next(), "scoreboard")?),
            _ => return Err(ArgsError::UnknownArg(name)),
        };

        let mut db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://quiz.sqlite3".into(), normalize_sqlite_url);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--explain" if matches!(command, Command::Review { .. }) => explain = true,
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let command = match command {
            Command::Review { .. } => Command::Review { explain },
            other => other,
        };
        Ok(Some(Self { db_url, command }))
    }
}

fn parse_id<T: std::str::FromStr>(
    raw: Option<String>,
    command: &'static str,
) -> Result<T, ArgsError> {
    let raw = raw.ok_or(ArgsError::MissingId { command })?;
    raw.parse().map_err(|_| ArgsError::InvalidId { raw })
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
    if db_url == "sqlite::memory:" {
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

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

type Input = Lines<BufReader<Stdin>>;

async fn read_line<R: AsyncBufRead + Unpin>(
    input: &mut Lines<R>,
) -> Result<Option<String>, std::io::Error> {
    input.next_line().await
}

/// Problems with a line typed during a quiz.
#[derive(Debug, PartialEq, Eq)]
enum InputError {
    NotANumber(String),
    NoSuchAnswer(usize),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::NotANumber(raw) => write!(f, "`{raw}` is not an answer number"),
            InputError::NoSuchAnswer(n) => write!(f, "no answer numbered {n}"),
        }
    }
}

impl std::error::Error for InputError {}

/// How a quiz run ended when no error stopped it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Finished,
    Left(&'static str),
}

async fn login(
    app: &AppServices,
    username: &str,
    input: &mut Input,
) -> Result<(), Box<dyn std::error::Error>> {
    let password = match std::env::var("QUIZ_PASSWORD") {
        Ok(password) => password,
        Err(_) => {
            eprintln!("password:");
            read_line(input).await?.unwrap_or_default()
        }
    };
    let credentials = app.auth().login(username, &password).await?;
    println!(
        "signed in as {} (user {})",
        credentials.username.as_deref().unwrap_or(username),
        credentials
            .user_id
            .as_ref()
            .map_or("?", |id| id.as_str())
    );
    Ok(())
}

async fn play(
    app: &AppServices,
    target: SessionTarget,
    input: &mut Input,
) -> Result<(), Box<dyn std::error::Error>> {
    if let SessionTarget::Challenge(course) = target {
        if let Ok(user) = app.auth().current_user() {
            if !app.scoreboard().can_attempt(course, &user).await {
                println!("you already have a score in this challenge");
                return Ok(());
            }
        }
    }

    run_quiz(&app.session_loop(), &app.reports(), target, input).await?;
    Ok(())
}

/// Runs one session to its end. Leaving early for any reason, an error or
/// Ctrl-C included, abandons the session so a challenge still records its
/// zero score.
async fn run_quiz<R: AsyncBufRead + Unpin>(
    session_loop: &SessionLoopService,
    reports: &QuestionReportService,
    target: SessionTarget,
    input: &mut Lines<R>,
) -> Result<Ending, Box<dyn std::error::Error>> {
    let mut session = session_loop.start_session(target).await?;

    let outcome = tokio::select! {
        outcome = quiz_loop(session_loop, reports, &mut session, input) => outcome,
        Ok(()) = tokio::signal::ctrl_c() => Ok(Ending::Left("interrupted; session left")),
    };

    if !matches!(outcome, Ok(Ending::Finished)) {
        if let Err(err) = session_loop.abandon(&mut session).await {
            log::debug!("session not abandoned: {err}");
        }
    }
    if let Ok(Ending::Left(reason)) = &outcome {
        println!("{reason}");
    }
    outcome
}

async fn quiz_loop<R: AsyncBufRead + Unpin>(
    session_loop: &SessionLoopService,
    reports: &QuestionReportService,
    session: &mut QuizSession,
    input: &mut Lines<R>,
) -> Result<Ending, Box<dyn std::error::Error>> {
    loop {
        if !ensure_answers(session_loop, session).await? {
            return Ok(Ending::Left("answers are unavailable; session left"));
        }
        show_question(session);

        let Some(line) = read_line(input).await? else {
            return Ok(Ending::Left("session left"));
        };
        let line = line.trim();
        match line {
            "q" => return Ok(Ending::Left("session left")),
            "!" => {
                if let Some(mut question) = session.current_question().cloned() {
                    if reports.report(&mut question).await {
                        println!("question reported, thank you");
                    } else {
                        println!("report could not be sent");
                    }
                }
                continue;
            }
            _ => {}
        }

        if let Err(err) = apply_input(session, line) {
            println!("{err}");
            continue;
        }
        let verdict = session_loop.validate_current(session)?;
        println!(
            "{}",
            match verdict {
                Verdict::Correct => "correct",
                Verdict::Incorrect => "incorrect",
            }
        );

        if let SessionStep::Finished(summary) = session_loop.advance(session).await? {
            println!();
            println!(
                "{} correct, {} incorrect of {} ({:.0} %)",
                summary.correct_count,
                summary.incorrect_count,
                summary.total_questions,
                summary.success_percent()
            );
            if let Some(score) = summary.final_score {
                println!("score {score:.2} in {} s", summary.elapsed_seconds);
            }
            if summary.topic_completed() {
                println!("topic completed");
            }
            println!("run `review` to go through your answers");
            return Ok(Ending::Finished);
        }
    }
}

async fn ensure_answers(
    session_loop: &SessionLoopService,
    session: &mut QuizSession,
) -> Result<bool, Box<dyn std::error::Error>> {
    for attempt in 0..=ANSWER_RETRIES {
        if session.phase() == SessionPhase::Active {
            return Ok(true);
        }
        if attempt > 0 {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        session_loop.refresh_answers(session).await?;
    }
    Ok(session.phase() == SessionPhase::Active)
}

fn show_question(session: &QuizSession) {
    let (Some(question), Some(answers)) = (session.current_question(), session.answers()) else {
        return;
    };
    let progress = session.progress();
    println!();
    println!(
        "[{}/{}] {}",
        progress.position + 1,
        progress.total,
        question.text
    );
    match answers.kind() {
        QuestionKind::FreeText => println!("  (type your answer)"),
        kind => {
            for (n, answer) in answers.answers().iter().enumerate() {
                println!("  {}) {}", n + 1, answer.text);
            }
            if kind == QuestionKind::MultipleChoice {
                println!("  (several answers may be correct)");
            }
        }
    }
}

fn apply_input(session: &mut QuizSession, line: &str) -> Result<(), Box<dyn std::error::Error>> {
    let Some(answers) = session.answers() else {
        return Ok(());
    };
    if !answers.kind().is_choice() {
        session.set_free_text(line)?;
        return Ok(());
    }

    let mut picks = Vec::new();
    for token in line.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        let n: usize = token
            .parse()
            .map_err(|_| InputError::NotANumber(token.into()))?;
        let answer = n
            .checked_sub(1)
            .and_then(|idx| answers.answers().get(idx))
            .ok_or(InputError::NoSuchAnswer(n))?;
        picks.push(answer.id);
    }

    session.clear_selection()?;
    for id in picks {
        session.toggle(id)?;
    }
    Ok(())
}

async fn review(app: &AppServices, explain: bool) -> Result<(), Box<dyn std::error::Error>> {
    let review = app.review();
    let Some(record) = review.load().await? else {
        println!("no finished session to review");
        return Ok(());
    };
    println!("{} finished {}", record.target, record.recorded_at);

    for item in services::session::review_items(&record) {
        println!();
        println!("{}. {}", item.index + 1, item.question.text);
        if let Some(typed) = &item.typed_text {
            println!("   you wrote: {typed}");
        }
        for marked in &item.answers {
            let tag = match marked.mark {
                AnswerMark::SelectedCorrect => "[+]",
                AnswerMark::MissedCorrect => "[!]",
                AnswerMark::SelectedIncorrect => "[x]",
                AnswerMark::Neutral => "[ ]",
            };
            println!("   {tag} {}", marked.answer.text);
        }

        if explain && !item.verdict.is_correct() {
            let Some(entry) = record.trail.get(item.index) else {
                continue;
            };
            match app
                .explanations()
                .explain(&entry.question, &entry.answers)
                .await
            {
                Ok(text) => println!("   why: {text}"),
                Err(err) => log::warn!("no explanation for question {}: {err}", entry.question.id),
            }
        }
    }
    review.clear().await?;
    Ok(())
}

fn print_scoreboard(board: &Scoreboard, app: &AppServices) {
    if board.is_empty() {
        println!("no scores yet");
        return;
    }
    for ranked in board.podium() {
        println!(
            "{}. {} {:.2}",
            ranked.place, ranked.entry.username, ranked.entry.points
        );
    }
    if let Ok(user) = app.auth().current_user() {
        let window = board.window_for(&user);
        if !window.is_empty() {
            println!("...");
            for ranked in window {
                println!(
                    "{}. {} {:.2}",
                    ranked.place, ranked.entry.username, ranked.entry.points
                );
            }
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = match Args::parse(std::env::args().skip(1)) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            return Err(e.into());
        }
    };

    // Open + migrate SQLite at startup; services stay storage-agnostic.
    prepare_sqlite_file(&parsed.db_url)?;
    let app = AppServices::new_sqlite(
        &parsed.db_url,
        Clock::system(),
        ApiConfig::from_env(),
        ExplanationConfig::from_env(),
    )
    .await?;
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    match parsed.command {
        Command::Login { username } => login(&app, &username, &mut input).await,
        Command::Logout => {
            app.auth().logout().await?;
            println!("signed out");
            Ok(())
        }
        Command::Quiz(target) => play(&app, target, &mut input).await,
        Command::Review { explain } => review(&app, explain).await,
        Command::Scoreboard(course) => {
            let board = app.scoreboard().fetch(course).await;
            print_scoreboard(&board, &app);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quiz_core::model::{Answer, AnswerId, Question, QuestionId, UserId};
    use quiz_core::time::{fixed_clock, fixed_now};
    use services::api::{QuestionReports, QuestionSource, ScoreSink, TopicCompletion};
    use services::session::SessionTimer;
    use services::{ApiError, IdentitySource};
    use std::sync::{Arc, Mutex};
    use storage::repository::Storage;

    const COURSE: CourseId = CourseId::new(2);

    /// Two single-choice questions; the second can come back with answer
    /// rows that belong to the first.
    #[derive(Default)]
    struct ScriptedQuiz {
        mislabel_second: bool,
        scores: Mutex<Vec<f64>>,
    }

    #[async_trait]
    impl QuestionSource for ScriptedQuiz {
        async fn fetch_questions(&self, _: SessionTarget) -> Result<Vec<Question>, ApiError> {
            Ok((1..=2)
                .map(|id| Question::new(QuestionId::new(id), TopicId::new(1), "Q", fixed_now()))
                .collect())
        }

        async fn fetch_answers(&self, question: QuestionId) -> Result<Vec<Answer>, ApiError> {
            let owner = if self.mislabel_second && question.value() == 2 {
                QuestionId::new(1)
            } else {
                question
            };
            let base = question.value() * 10;
            Ok(vec![
                Answer::new(AnswerId::new(base + 1), owner, "yes", true),
                Answer::new(AnswerId::new(base + 2), owner, "no", false),
            ])
        }
    }

    #[async_trait]
    impl ScoreSink for ScriptedQuiz {
        async fn submit_score(&self, _: CourseId, points: f64, _: &UserId) -> Result<(), ApiError> {
            self.scores.lock().unwrap().push(points);
            Ok(())
        }
    }

    #[async_trait]
    impl TopicCompletion for ScriptedQuiz {
        async fn complete_topic(&self, _: TopicId) -> Result<(), ApiError> {
            Ok(())
        }
    }

    #[async_trait]
    impl QuestionReports for ScriptedQuiz {
        async fn report_question(&self, _: QuestionId) -> Result<(), ApiError> {
            Ok(())
        }
    }

    struct Player;

    #[async_trait]
    impl IdentitySource for Player {
        async fn current_user_id(&self) -> Option<UserId> {
            UserId::new("5")
        }
    }

    async fn run_challenge(quiz: Arc<ScriptedQuiz>, typed: &'static str) -> Result<Ending, String> {
        let storage = Storage::in_memory();
        let session_loop = SessionLoopService::new(
            fixed_clock(),
            quiz.clone(),
            quiz.clone(),
            quiz.clone(),
            Arc::clone(&storage.trails),
            Arc::new(Player),
        );
        let reports = QuestionReportService::new(quiz);
        let mut input = BufReader::new(typed.as_bytes()).lines();
        run_quiz(&session_loop, &reports, SessionTarget::Challenge(COURSE), &mut input)
            .await
            .map_err(|err| err.to_string())
    }

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| (*s).to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn parses_quiz_commands() {
        let parsed = Args::parse(args(&["challenge", "3", "--db", "sqlite::memory:"]))
            .unwrap()
            .unwrap();
        assert_eq!(
            parsed.command,
            Command::Quiz(SessionTarget::Challenge(CourseId::new(3)))
        );
        assert_eq!(parsed.db_url, "sqlite::memory:");
    }

    #[test]
    fn review_accepts_explain_flag() {
        let parsed = Args::parse(args(&["review", "--explain"])).unwrap().unwrap();
        assert_eq!(parsed.command, Command::Review { explain: true });
    }

    #[test]
    fn rejects_bad_ids_and_flags() {
        assert!(matches!(
            Args::parse(args(&["topic", "abc"])),
            Err(ArgsError::InvalidId { .. })
        ));
        assert!(matches!(
            Args::parse(args(&["topic", "1", "--explain"])),
            Err(ArgsError::UnknownArg(_))
        ));
        assert!(matches!(
            Args::parse(args(&["scoreboard"])),
            Err(ArgsError::MissingId { .. })
        ));
    }

    #[test]
    fn no_arguments_prints_usage() {
        assert!(Args::parse(args(&[])).unwrap().is_none());
    }

    #[tokio::test]
    async fn failing_challenge_still_records_zero_score() {
        let quiz = Arc::new(ScriptedQuiz {
            mislabel_second: true,
            ..ScriptedQuiz::default()
        });
        let err = run_challenge(Arc::clone(&quiz), "1\n1\n").await.unwrap_err();
        assert!(err.contains("belongs to question"), "{err}");
        assert_eq!(*quiz.scores.lock().unwrap(), vec![0.0]);
    }

    #[tokio::test]
    async fn end_of_input_leaves_challenge_with_zero_score() {
        let quiz = Arc::new(ScriptedQuiz::default());
        let ending = run_challenge(Arc::clone(&quiz), "1\n").await.unwrap();
        assert_eq!(ending, Ending::Left("session left"));
        assert_eq!(*quiz.scores.lock().unwrap(), vec![0.0]);
    }

    #[tokio::test]
    async fn finished_challenge_submits_only_its_score() {
        let quiz = Arc::new(ScriptedQuiz::default());
        let ending = run_challenge(Arc::clone(&quiz), "1\n1\n").await.unwrap();
        assert_eq!(ending, Ending::Finished);
        let scores = quiz.scores.lock().unwrap().clone();
        assert_eq!(scores.len(), 1);
        assert!(scores[0] > 0.0);
    }

    #[test]
    fn out_of_range_pick_names_the_answer_number() {
        let question = Question::new(QuestionId::new(1), TopicId::new(1), "Q", fixed_now());
        let mut session = QuizSession::new(
            SessionTarget::Topic(TopicId::new(1)),
            vec![question],
            SessionTimer::disabled(),
        )
        .unwrap();
        session
            .load_answers(vec![
                Answer::new(AnswerId::new(11), QuestionId::new(1), "yes", true),
                Answer::new(AnswerId::new(12), QuestionId::new(1), "no", false),
            ])
            .unwrap();

        let err = apply_input(&mut session, "7").unwrap_err();
        assert_eq!(err.to_string(), "no answer numbered 7");
        let err = apply_input(&mut session, "x").unwrap_err();
        assert_eq!(err.to_string(), "`x` is not an answer number");
        assert!(apply_input(&mut session, "2").is_ok());
    }
}
