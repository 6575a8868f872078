//! Interactive line-editor front end.
//!
//! Commands typed here act as the user. `invoke` stands in for the
//! assistant runtime and calls any action by name with JSON arguments.

use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde_json::{Value, json};

use crate::context;
use crate::session::{Session, SessionEvent};
use crate::shell::{self, Shell};
use crate::state::Writer;

const PROMPT: &str = "vector-wave> ";

/// One parsed REPL command.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    List,
    Analyze(String),
    Pick(usize),
    Save {
        folder_path: String,
        metadata: Option<String>,
    },
    Pipeline(String),
    Suggest(Vec<String>),
    Copy(usize),
    Context(Option<String>),
    State,
    Actions,
    Invoke {
        name: String,
        input: Value,
    },
    Help,
    Quit,
    Empty,
}

pub const HELP: &str = "\
Commands:
  list                         Refresh the content folder list
  analyze <folder-path>        Quick analysis of a folder
  pick <n>                     Analyze folder number <n> from the list
  save <folder-path> [text]    Save editorial metadata (generated when text is omitted)
  pipeline <content-path>      Run the editorial pipeline and follow its console
  suggest <text>...            Replace the suggested actions
  copy <n>                     Copy suggestion <n> to the clipboard
  context [slice]              Show the readable context (or one slice)
  state                        Show the current editorial state
  actions                      List invocable actions
  invoke <name> [json]         Invoke an action as the assistant would
  help                         Show this help
  quit                         Leave";

/// Parse one input line.
pub fn parse_command(line: &str) -> Result<ReplCommand, String> {
    let words = shlex::split(line).ok_or_else(|| "Unbalanced quotes".to_string())?;
    let Some((head, rest)) = words.split_first() else {
        return Ok(ReplCommand::Empty);
    };

    let one = |what: &str| -> Result<String, String> {
        match rest {
            [value] => Ok(value.clone()),
            _ => Err(format!("Usage: {head} <{what}>")),
        }
    };
    let number = |what: &str| -> Result<usize, String> {
        one(what)?
            .parse::<usize>()
            .map_err(|_| format!("Usage: {head} <{what}> (a number)"))
    };

    let command = match head.as_str() {
        "list" | "ls" => ReplCommand::List,
        "analyze" => ReplCommand::Analyze(one("folder-path")?),
        "pick" => ReplCommand::Pick(number("n")?),
        "save" => match rest {
            [folder_path] => ReplCommand::Save {
                folder_path: folder_path.clone(),
                metadata: None,
            },
            [folder_path, text @ ..] => ReplCommand::Save {
                folder_path: folder_path.clone(),
                metadata: Some(text.join(" ")),
            },
            [] => return Err("Usage: save <folder-path> [text]".to_string()),
        },
        "pipeline" | "run" => ReplCommand::Pipeline(one("content-path")?),
        "suggest" => ReplCommand::Suggest(rest.to_vec()),
        "copy" => ReplCommand::Copy(number("n")?),
        "context" => ReplCommand::Context(rest.first().cloned()),
        "state" => ReplCommand::State,
        "actions" => ReplCommand::Actions,
        "invoke" => match rest {
            [name] => ReplCommand::Invoke {
                name: name.clone(),
                input: Value::Null,
            },
            [name, args @ ..] => {
                let raw = args.join(" ");
                let input = serde_json::from_str(&raw)
                    .map_err(|err| format!("Invalid JSON arguments: {err}"))?;
                ReplCommand::Invoke {
                    name: name.clone(),
                    input,
                }
            }
            [] => return Err("Usage: invoke <name> [json]".to_string()),
        },
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        other => return Err(format!("Unknown command '{other}'. Type `help`.")),
    };
    Ok(command)
}

/// The interactive loop over one session.
pub struct Repl {
    shell: Shell,
}

impl Repl {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            shell: Shell::new(session),
        }
    }

    fn session(&self) -> &Session {
        self.shell.session()
    }

    /// Initialize the session, greet, then read commands until `quit` or EOF.
    pub async fn run(&self) -> Result<()> {
        self.start().await;

        let mut editor = DefaultEditor::new().context("Failed to start line editor")?;
        loop {
            let line = tokio::task::block_in_place(|| editor.readline(PROMPT));
            let line = match line {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(anyhow::anyhow!("Failed to read input: {err}")),
            };
            let _ = editor.add_history_entry(line.as_str());

            let command = match parse_command(&line) {
                Ok(command) => command,
                Err(message) => {
                    println!("{}", message.red());
                    continue;
                }
            };
            if command == ReplCommand::Quit {
                break;
            }
            let output = self.execute(command).await;
            if !output.is_empty() {
                println!("{}", output.trim_end());
            }
        }
        Ok(())
    }

    /// Wait for the ready event, then list folders as the assistant's first turn.
    async fn start(&self) {
        let mut events = self.session().subscribe();
        let session = self.session().clone();
        let greeter = tokio::spawn(async move {
            match events.recv().await {
                Ok(SessionEvent::Ready { .. }) => Some(
                    session
                        .invoke(Writer::Assistant, "listContentFolders", Value::Null)
                        .await,
                ),
                Err(_) => None,
            }
        });

        self.session().initialize().await;
        println!("{}", "👋 Vector Wave editorial assistant".bold());
        if let Ok(Some(greeting)) = greeter.await {
            println!("{greeting}\n");
        }
        print!("{}", shell::render_suggestions(&self.session().state().suggestions()));
        println!("{}", "Type `help` for commands.".dimmed());
    }

    /// Run one command and return what to print.
    pub async fn execute(&self, command: ReplCommand) -> String {
        let session = self.session();
        match command {
            ReplCommand::List => {
                session
                    .invoke(Writer::User, "listContentFolders", Value::Null)
                    .await
            }
            ReplCommand::Analyze(path) => {
                session
                    .invoke(Writer::User, "analyzeFolder", json!({ "folderPath": path }))
                    .await
            }
            ReplCommand::Pick(number) => self.shell.pick_folder(number).await,
            ReplCommand::Save {
                folder_path,
                metadata,
            } => {
                let mut input = json!({ "folderPath": folder_path });
                if let Some(metadata) = metadata {
                    input["metadata"] = Value::String(metadata);
                }
                session.invoke(Writer::User, "saveMetadata", input).await
            }
            ReplCommand::Pipeline(path) => self.follow_pipeline(path).await,
            ReplCommand::Suggest(suggestions) => self.shell.set_suggestions(suggestions),
            ReplCommand::Copy(number) => self.shell.copy_suggestion(number),
            ReplCommand::Context(None) => context::render_for_prompt(&session.readable_context()),
            ReplCommand::Context(Some(name)) => {
                match context::slice(&session.state().snapshot(), &name) {
                    Some(slice) => slice.value,
                    None => format!("Unknown context slice '{name}'"),
                }
            }
            ReplCommand::State => self.shell.render(),
            ReplCommand::Actions => shell::render_actions(&session.registry().descriptors()),
            ReplCommand::Invoke { name, input } => {
                session.invoke(Writer::Assistant, &name, input).await
            }
            ReplCommand::Help => HELP.to_string(),
            ReplCommand::Quit | ReplCommand::Empty => String::new(),
        }
    }

    /// Start a pipeline job and print console lines as they arrive.
    async fn follow_pipeline(&self, content_path: String) -> String {
        let session = self.session().clone();
        let state = session.state().clone();
        let mut changes = state.subscribe();
        let mut cursor = state.console_cursor();
        let mut job = tokio::spawn(async move {
            session
                .invoke(
                    Writer::User,
                    "runEditorialPipeline",
                    json!({ "contentPath": content_path }),
                )
                .await
        });

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(shell::PROCESSING_TAIL);
        spinner.enable_steady_tick(Duration::from_millis(120));

        let result = loop {
            tokio::select! {
                joined = &mut job => {
                    break joined.unwrap_or_else(|err| format!("❌ Pipeline task failed: {err}"));
                }
                changed = changes.changed() => {
                    if changed.is_err() {
                        break (&mut job)
                            .await
                            .unwrap_or_else(|err| format!("❌ Pipeline task failed: {err}"));
                    }
                    for line in state.read_console(&mut cursor) {
                        spinner.println(&line);
                    }
                }
            }
        };
        for line in state.read_console(&mut cursor) {
            spinner.println(&line);
        }
        spinner.finish_and_clear();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_quoted_arguments() {
        assert_eq!(
            parse_command(r#"suggest "Analyze folder a" 'Run it'"#),
            Ok(ReplCommand::Suggest(vec![
                "Analyze folder a".to_string(),
                "Run it".to_string()
            ]))
        );
        assert_eq!(
            parse_command("save content/raw/a Short note"),
            Ok(ReplCommand::Save {
                folder_path: "content/raw/a".to_string(),
                metadata: Some("Short note".to_string()),
            })
        );
    }

    #[test]
    fn parses_invoke_json() {
        assert_eq!(
            parse_command(r#"invoke analyzeFolder '{"folderPath": "content/raw/a"}'"#),
            Ok(ReplCommand::Invoke {
                name: "analyzeFolder".to_string(),
                input: json!({"folderPath": "content/raw/a"}),
            })
        );
        assert!(parse_command("invoke analyzeFolder {oops").is_err());
    }

    #[test]
    fn rejects_bad_usage() {
        assert_eq!(parse_command("   "), Ok(ReplCommand::Empty));
        assert!(parse_command("pick two").is_err());
        assert!(parse_command("analyze").is_err());
        assert!(parse_command("dance").is_err());
        assert_eq!(parse_command("exit"), Ok(ReplCommand::Quit));
    }
}
