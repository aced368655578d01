// src/bin/exam_runner.rs

//! Terminal front end for taking an exam against the exam server.

use std::sync::Arc;

use dotenvy::dotenv;
use exam_session::{
    ExamClient,
    config::SessionSettings,
    models::{
        answer::AnswerValue,
        question::{QuestionKind, QuestionSet},
        session::{SessionIdentity, SessionStatus},
    },
    session::{
        ExamPlan, ExamSession, FileStore, HttpSyncTransport, RecoveryNegotiator, SessionCommand,
        SessionDriver, SessionView,
    },
    utils::time::format_remaining,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const HELP: &str = "commands: start | goto <n> | answer <question-id> <value> | submit | confirm | quit";

#[derive(Debug, PartialEq)]
enum Input {
    Command(SessionCommand),
    Quit,
}

fn parse_answer(kind: QuestionKind, raw: &str) -> Result<AnswerValue, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("missing answer value".to_string());
    }
    match kind {
        QuestionKind::SingleChoice => Ok(AnswerValue::SingleChoice(raw.to_string())),
        QuestionKind::FreeText => Ok(AnswerValue::FreeText(raw.to_string())),
        QuestionKind::MultiSelect => Ok(AnswerValue::MultiSelect(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )),
        QuestionKind::Numeric => raw
            .parse::<f64>()
            .map(AnswerValue::Numeric)
            .map_err(|_| format!("'{}' is not a number", raw)),
    }
}

fn parse_input(line: &str, set: &QuestionSet) -> Result<Input, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));

    match word {
        "start" => Ok(Input::Command(SessionCommand::Start)),
        "submit" => Ok(Input::Command(SessionCommand::RequestSubmit)),
        "confirm" => Ok(Input::Command(SessionCommand::ConfirmSubmit)),
        "quit" => Ok(Input::Quit),
        "goto" => {
            let n: usize = rest
                .trim()
                .parse()
                .map_err(|_| format!("'{}' is not a question number", rest.trim()))?;
            if n == 0 || n > set.question_count {
                return Err(format!("questions are numbered 1 to {}", set.question_count));
            }
            Ok(Input::Command(SessionCommand::Navigate(n - 1)))
        }
        "answer" => {
            let (question_id, value) = rest
                .trim()
                .split_once(' ')
                .ok_or_else(|| "usage: answer <question-id> <value>".to_string())?;
            let question = set
                .questions
                .iter()
                .find(|q| q.id == question_id)
                .ok_or_else(|| format!("no question '{}'", question_id))?;
            Ok(Input::Command(SessionCommand::Answer {
                question_id: question.id.clone(),
                value: parse_answer(question.kind, value)?,
            }))
        }
        _ => Err(HELP.to_string()),
    }
}

fn render(view: &SessionView, set: &QuestionSet) {
    println!(
        "[{}] {} left, {}/{} answered",
        view.status,
        format_remaining(view.time_left),
        view.answers.len(),
        set.question_count
    );
    if let Some(question) = set.questions.get(view.pointer) {
        println!("Q{} ({}, {}): {}", view.pointer + 1, question.id, question.kind, question.prompt);
        for (i, choice) in question.choices.iter().enumerate() {
            println!("  {}. {}", i + 1, choice);
        }
    }
    if view.confirm_pending {
        println!("Type 'confirm' to hand in your answers.");
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let Some(raw_identity) = std::env::args().nth(1) else {
        eprintln!("usage: exam_runner <exam-identity>");
        std::process::exit(2);
    };
    let identity = SessionIdentity::new(raw_identity);
    let settings = SessionSettings::from_env();

    let client = ExamClient::new(settings.api_base_url.clone()).with_timeout(settings.request_timeout);
    let set = match client.fetch_question_set(&identity).await {
        Ok(set) => set,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", e.user_message());
            std::process::exit(1);
        }
    };

    let store = Arc::new(FileStore::new(&settings.checkpoint_dir));
    let transport = Arc::new(
        HttpSyncTransport::new(settings.api_base_url.clone()).with_timeout(settings.request_timeout),
    );
    let mut session = ExamSession::new(
        identity,
        ExamPlan::from(&set),
        store,
        transport,
        &settings,
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let negotiator = RecoveryNegotiator::mount(&mut session);
    if let Some(summary) = negotiator.summary() {
        println!(
            "Unfinished attempt found: {} answered, {} left, saved {}.",
            summary.answered, summary.remaining, summary.saved_at
        );
        println!("Resume it? [y/n]");
        let resume = matches!(lines.next_line().await, Ok(Some(l)) if l.trim().eq_ignore_ascii_case("y"));
        if resume {
            negotiator.accept(&mut session);
        } else {
            negotiator.decline(&mut session);
        }
    }

    println!("{} ({} questions)", set.title, set.question_count);
    println!("{}", HELP);

    let handle = SessionDriver::spawn(session, settings.sync_interval);
    let mut updates = handle.subscribe();
    render(&handle.view(), &set);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    // stdin closed: treat like leaving the page.
                    _ => {
                        handle.send(SessionCommand::PageHide);
                        break;
                    }
                };
                match parse_input(&line, &set) {
                    Ok(Input::Command(command)) => {
                        if !handle.send(command) {
                            break;
                        }
                    }
                    Ok(Input::Quit) => {
                        handle.send(SessionCommand::PageHide);
                        break;
                    }
                    Err(message) => println!("{}", message),
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = updates.borrow_and_update().clone();
                // Per-second ticks only print on whole minutes.
                if view.status != SessionStatus::InProgress || view.time_left % 60 == 0 {
                    render(&view, &set);
                }
                if view.status.is_terminal() {
                    break;
                }
            }
        }
    }

    if let Some(session) = handle.teardown().await {
        match session.status() {
            SessionStatus::Submitted => println!("Answers submitted."),
            SessionStatus::TimeUp => println!("Time is up. Your answers were submitted automatically."),
            _ => println!("Progress saved. Run again to resume."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_session::models::question::Question;

    fn set() -> QuestionSet {
        QuestionSet {
            identity: SessionIdentity::new("e1"),
            title: "Sample".to_string(),
            duration_seconds: 600,
            question_count: 2,
            questions: vec![
                Question {
                    id: "q1".to_string(),
                    kind: QuestionKind::MultiSelect,
                    prompt: "Pick".to_string(),
                    choices: vec!["a".to_string(), "b".to_string()],
                },
                Question {
                    id: "q2".to_string(),
                    kind: QuestionKind::Numeric,
                    prompt: "How many".to_string(),
                    choices: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_parse_answer_by_kind() {
        assert_eq!(
            parse_input("answer q1 a, b", &set()),
            Ok(Input::Command(SessionCommand::Answer {
                question_id: "q1".to_string(),
                value: AnswerValue::MultiSelect(vec!["a".to_string(), "b".to_string()]),
            }))
        );
        assert!(parse_input("answer q2 many", &set()).is_err());
        assert!(parse_input("answer q3 1", &set()).is_err());
    }

    #[test]
    fn test_goto_is_one_based() {
        assert_eq!(
            parse_input("goto 2", &set()),
            Ok(Input::Command(SessionCommand::Navigate(1)))
        );
        assert!(parse_input("goto 0", &set()).is_err());
        assert!(parse_input("goto 3", &set()).is_err());
    }
}
