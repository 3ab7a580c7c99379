use chrono::Utc;
use clap::{Args, Subcommand};
use serde_json::Value;
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::OutputFormat;
use quizdeck::access::QuizRepository;
use quizdeck::config::Config;
use quizdeck_core::Quiz;

#[derive(Args)]
pub struct QuizCommand {
    #[command(subcommand)]
    pub command: QuizSubcommand,
}

#[derive(Subcommand)]
pub enum QuizSubcommand {
    /// Import a quiz from a JSON file
    Import {
        /// Path to the quiz JSON
        file: PathBuf,
    },

    /// List live quizzes, newest first
    List {
        /// Creator uid (defaults to the configured uid)
        #[arg(long)]
        uid: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a quiz's details
    Show {
        quiz_id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Mark a quiz as deleted
    Delete {
        quiz_id: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Print the live quiz list every time it changes (Ctrl-C to stop)
    Watch {
        /// Creator uid (defaults to the configured uid)
        #[arg(long)]
        uid: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

/// Completes a hand-written quiz file.
///
/// `quiz_id`, `createdAt` and `createdBy` may be left out and are filled in;
/// everything else goes through the normal quiz validation.
fn quiz_from_draft(mut draft: Value, uid: &str) -> Result<Quiz, Box<dyn std::error::Error>> {
    let object = draft
        .as_object_mut()
        .ok_or("Quiz file must contain a JSON object")?;
    object
        .entry("quiz_id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    object
        .entry("createdAt")
        .or_insert_with(|| Value::from(Utc::now().timestamp_millis()));
    object
        .entry("createdBy")
        .or_insert_with(|| Value::String(uid.to_string()));

    Ok(serde_json::from_value(draft)?)
}

fn print_quizzes(
    quizzes: &[Quiz],
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(quizzes)?);
        }
        OutputFormat::Text => {
            if quizzes.is_empty() {
                println!("No quizzes found");
                return Ok(());
            }
            println!("{:<36}  {:<4}  {:>9}  TITLE", "ID", "TYPE", "QUESTIONS");
            println!("{}", "-".repeat(80));
            for quiz in quizzes {
                let title = if quiz.title.chars().count() > 30 {
                    format!("{}...", quiz.title.chars().take(27).collect::<String>())
                } else {
                    quiz.title.clone()
                };
                println!(
                    "{:<36}  {:<4}  {:>9}  {}",
                    quiz.quiz_id,
                    quiz.type_code(),
                    quiz.kind.question_count(),
                    title
                );
            }
            println!("\nTotal: {} quiz(zes)", quizzes.len());
        }
    }
    Ok(())
}

impl QuizCommand {
    pub async fn run(
        &self,
        repo: &QuizRepository,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            QuizSubcommand::Import { file } => {
                let contents = std::fs::read_to_string(file)
                    .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
                let draft: Value = serde_json::from_str(&contents)?;
                let quiz = quiz_from_draft(draft, &config.uid.value)?;

                repo.create(&quiz).await?;
                println!("Imported quiz:");
                println!("{}", quiz);
                Ok(())
            }

            QuizSubcommand::List { uid, format } => {
                let uid = uid.as_deref().unwrap_or(&config.uid.value);
                let quizzes = repo.live_by_creator(uid).await?;
                print_quizzes(&quizzes, format)
            }

            QuizSubcommand::Show { quiz_id, format } => match repo.get(quiz_id).await? {
                Some(quiz) => {
                    match format {
                        OutputFormat::Json => {
                            println!("{}", serde_json::to_string_pretty(&quiz)?);
                        }
                        OutputFormat::Text => {
                            println!("{}", quiz);
                        }
                    }
                    Ok(())
                }
                None => Err(format!("Quiz not found: {}", quiz_id).into()),
            },

            QuizSubcommand::Delete { quiz_id, force } => {
                let quiz = match repo.get(quiz_id).await? {
                    Some(q) => q,
                    None => return Err(format!("Quiz not found: {}", quiz_id).into()),
                };

                // Confirm deletion unless --force is used
                if !force {
                    print!("Delete quiz '{}'? [y/N] ", quiz.title);
                    io::stdout().flush()?;

                    let mut input = String::new();
                    io::stdin().read_line(&mut input)?;

                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Deletion cancelled.");
                        return Ok(());
                    }
                }

                repo.delete(&quiz.quiz_id).await?;
                println!("Deleted quiz: {}", quiz.title);
                Ok(())
            }

            QuizSubcommand::Watch { uid, format } => {
                let uid = uid.clone().unwrap_or_else(|| config.uid.value.clone());
                let (tx, mut rx) = mpsc::unbounded_channel();
                let subscription = repo.subscribe_by_creator(uid, move |result| {
                    let _ = tx.send(result);
                });

                loop {
                    tokio::select! {
                        Some(result) = rx.recv() => match result {
                            Ok(quizzes) => {
                                print_quizzes(&quizzes, format)?;
                                if let OutputFormat::Text = format {
                                    println!();
                                }
                            }
                            Err(e) => eprintln!("Error: {}", e),
                        },
                        _ = tokio::signal::ctrl_c() => break,
                    }
                }

                subscription.unsubscribe();
                Ok(())
            }
        }
    }
}
