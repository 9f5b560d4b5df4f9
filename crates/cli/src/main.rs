use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use campus_agents::PrivacyFilterAgent;
use campus_core::{
    example_questions, normalize_text, ChatHistory, ChatRole, Locale, PromptSet, TurnTrace,
};
use campus_directory::{load_directory, Directory, RosterView, DEFAULT_DATA_PATH};
use campus_llm::{build_chat_model, LlmConfig};
use campus_ml::{ClassifierStack, DEFAULT_MODEL_DIR};
use campus_observability::{init_tracing, AppMetrics};
use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(name = "privacy-demo")]
#[command(about = "Campus directory chat behind a personal-data filter")]
struct Cli {
    #[arg(long, env = "CAMPUS_DATA_PATH", default_value = DEFAULT_DATA_PATH)]
    data: PathBuf,

    #[arg(long, env = "CAMPUS_MODEL_DIR", default_value = DEFAULT_MODEL_DIR)]
    model_dir: PathBuf,

    #[arg(long, env = "CAMPUS_LOCALE", default_value = "ko")]
    locale: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive session.
    Chat,
    /// One filtered question in a fresh session.
    Ask {
        question: String,
        #[arg(long)]
        json: bool,
    },
    /// Run only the input classifier.
    Classify { text: String },
    Departments,
    Students { department: String },
    Examples,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("privacy_demo");
    let cli = Cli::parse();
    let locale = Locale::from_optional_str(Some(&cli.locale));

    match cli.command {
        Command::Chat => {
            let agent = build_agent(&cli.data, &cli.model_dir, locale)?;
            run_chat(agent, locale).await?;
        }
        Command::Ask { question, json } => {
            let agent = build_agent(&cli.data, &cli.model_dir, locale)?;
            let mut session = agent.open_session();
            let trace = agent.handle_turn(&mut session, &question).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&trace)?);
            } else {
                println!("\n{}\n", trace.final_reply);
                println!("{}", render_trace(&trace));
            }
        }
        Command::Classify { text } => {
            let stack = ClassifierStack::load(&cli.model_dir)?;
            let prediction = stack.classifier.classify(&normalize_text(&text))?;
            println!(
                "{} (class {}) logits={:?}",
                prediction.label.as_label(),
                prediction.class_id,
                prediction.logits
            );
        }
        Command::Departments => {
            let directory = load_directory(&cli.data)?;
            print!("{}", render_departments(&directory));
        }
        Command::Students { department } => {
            let directory = load_directory(&cli.data)?;
            print!("{}", render_roster(&directory.roster_view(&department)));
        }
        Command::Examples => print!("{}", render_examples(locale)),
    }

    Ok(())
}

fn build_agent(data: &Path, model_dir: &Path, locale: Locale) -> Result<PrivacyFilterAgent> {
    let directory = load_directory(data)
        .with_context(|| format!("failed loading directory from {}", data.display()))?;
    let classifier = ClassifierStack::load(model_dir)?;
    let config = LlmConfig::from_env().context("invalid llm configuration")?;
    let model = build_chat_model(&config)?;

    Ok(PrivacyFilterAgent::new(
        classifier,
        model,
        Arc::new(directory),
        PromptSet::for_locale(locale),
        AppMetrics::shared(),
    ))
}

async fn run_chat(agent: PrivacyFilterAgent, locale: Locale) -> Result<()> {
    let examples = example_questions(locale).numbered();
    let mut session = agent.open_session();

    println!("privacy filter chat. /examples, /ex N, /trace, /history, /quit");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = match parse_repl_input(&line, &examples) {
            ReplInput::Skip => continue,
            ReplInput::Quit => break,
            ReplInput::ListExamples => {
                print!("{}", render_examples(locale));
                continue;
            }
            ReplInput::Trace => {
                match session.last_trace() {
                    Some(trace) => println!("{}", render_trace(trace)),
                    None => println!("no turns yet"),
                }
                continue;
            }
            ReplInput::History => {
                print!("{}", render_history(session.history()));
                continue;
            }
            ReplInput::Example(Some(question)) => {
                println!("> {question}");
                question
            }
            ReplInput::Example(None) => {
                println!("pick an example between 1 and {}", examples.len());
                continue;
            }
            ReplInput::UnknownCommand(command) => {
                println!("unknown command {command}");
                continue;
            }
            ReplInput::Message(text) => text,
        };

        match agent.handle_turn(&mut session, message).await {
            Ok(trace) => {
                println!("\n{}\n", trace.final_reply);
                println!(
                    "[{} -> {:?}, {} ms]",
                    trace.label.as_label(),
                    trace.route,
                    trace.elapsed_ms
                );
            }
            Err(err) => eprintln!("error: {err:#}"),
        }
    }

    println!(
        "session {} closed after {} turns",
        session.id(),
        session.history().turn_count()
    );
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ReplInput<'a> {
    Skip,
    Quit,
    ListExamples,
    Trace,
    History,
    /// `/ex N`; `None` when N is not a valid example number.
    Example(Option<&'a str>),
    UnknownCommand(&'a str),
    Message(&'a str),
}

fn parse_repl_input<'a>(line: &'a str, examples: &[&'a str]) -> ReplInput<'a> {
    let input = line.trim();
    match input {
        "" => ReplInput::Skip,
        "/quit" | "/exit" | "exit" => ReplInput::Quit,
        "/examples" => ReplInput::ListExamples,
        "/trace" => ReplInput::Trace,
        "/history" => ReplInput::History,
        _ => match input.strip_prefix("/ex ") {
            Some(arg) => ReplInput::Example(pick_example(examples, arg)),
            None if input.starts_with('/') => ReplInput::UnknownCommand(input),
            None => ReplInput::Message(input),
        },
    }
}

/// One-based lookup into the numbered example list.
fn pick_example<'a>(examples: &[&'a str], arg: &str) -> Option<&'a str> {
    let index = arg.trim().parse::<usize>().ok()?;
    examples.get(index.checked_sub(1)?).copied()
}

fn render_examples(locale: Locale) -> String {
    let examples = example_questions(locale);
    let mut out = String::from("general (LABEL_0):\n");
    for (idx, question) in examples.general.iter().enumerate() {
        out.push_str(&format!("  {}. {question}\n", idx + 1));
    }
    out.push_str("sensitive (LABEL_1):\n");
    for (idx, question) in examples.sensitive.iter().enumerate() {
        out.push_str(&format!(
            "  {}. {question}\n",
            examples.general.len() + idx + 1
        ));
    }
    out
}

fn render_trace(trace: &TurnTrace) -> String {
    let stage = |value: Option<&str>| value.unwrap_or("-").to_string();
    let mut out = format!(
        "[1] input filter: {}\n[2] initial response: {}\n[3] final response: {}",
        trace.label.as_label(),
        stage(trace.candidate_answer.as_deref()),
        stage(trace.filtered_reply.as_deref()),
    );
    if let Some(error) = &trace.remote_error {
        out.push_str(&format!("\n    remote error: {error}"));
    }
    out
}

fn render_history(history: &ChatHistory) -> String {
    if history.is_empty() {
        return "history is empty\n".to_string();
    }
    history
        .entries()
        .iter()
        .map(|entry| {
            let who = match entry.role {
                ChatRole::User => "you",
                ChatRole::Assistant => "bot",
            };
            format!("{} {who}: {}\n", entry.at.format("%H:%M:%S"), entry.text)
        })
        .collect()
}

fn render_departments(directory: &Directory) -> String {
    directory
        .summarize()
        .iter()
        .map(|row| {
            format!(
                "{} | {} | {} | {} | avg {:.2} | {} students | president {} | {}\n",
                row.name,
                row.college,
                row.room,
                row.phone,
                row.avg_gpa,
                row.student_count,
                row.council_president,
                row.website
            )
        })
        .collect()
}

fn render_roster(view: &RosterView<'_>) -> String {
    if view.is_empty() {
        return format!("{}: no students to show\n", view.department);
    }

    let mut out = format!("{} ({} students)\n", view.department, view.students.len());
    for (idx, student) in view.students.iter().enumerate() {
        let marker = if Some(idx) == view.highest_gpa {
            "  <- highest GPA"
        } else if Some(idx) == view.lowest_gpa {
            "  <- lowest GPA"
        } else {
            ""
        };
        let attributes = student
            .attributes
            .iter()
            .map(|(key, value)| format!("{key}: {}", display_value(value)))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("  {}. {attributes}{marker}\n", idx + 1));
    }
    out
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
