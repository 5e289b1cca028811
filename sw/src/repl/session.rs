//! Dialogue session management

use std::io::{self, Write};

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use crate::llm::StreamChunk;
use crate::planner::{Planner, SessionUpdate};
use crate::planning::{PlanningQuestion, ReadinessEvaluation, TurnOutcome};
use crate::session::DecisionDocument;

/// How the dialogue ended
#[derive(Debug)]
pub enum DialogueEnd {
    /// The user left; the session stays resumable
    Quit,
    /// Ready, but the user chose not to generate yet
    Ready,
    /// The document was generated
    Generated(DecisionDocument),
}

/// Interactive planning dialogue over one session
pub struct DialogueSession<'a> {
    planner: &'a mut Planner,
    id: String,
}

impl<'a> DialogueSession<'a> {
    pub fn new(planner: &'a mut Planner, id: impl Into<String>) -> Self {
        Self { planner, id: id.into() }
    }

    /// Run the dialogue from `outcome` until ready or quit
    pub async fn run(&mut self, mut outcome: TurnOutcome) -> Result<DialogueEnd> {
        self.print_welcome();

        // Create readline editor for proper line editing
        let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

        loop {
            let question = match outcome {
                TurnOutcome::Question(question) => question,
                TurnOutcome::ReadyForGeneration(evaluation) => {
                    print_ready(&evaluation);
                    return self.offer_generation(&mut rl).await;
                }
            };
            println!("{}", format_question(&question, true));

            let reply = match read_reply(&mut rl)? {
                Some(reply) => reply,
                None => return Ok(self.quit()),
            };

            if reply.starts_with('/') {
                match reply.split_whitespace().next().unwrap_or_default() {
                    "/help" | "/h" => {
                        print_help();
                        outcome = TurnOutcome::Question(question);
                        continue;
                    }
                    "/quit" | "/q" | "/exit" => return Ok(self.quit()),
                    "/tools" => {
                        self.print_tools().await;
                        outcome = TurnOutcome::Question(question);
                        continue;
                    }
                    "/done" => {
                        outcome = TurnOutcome::ReadyForGeneration(self.planner.mark_ready(&self.id).await?);
                        continue;
                    }
                    cmd => {
                        println!("{} Unknown command: {}", "?".yellow(), cmd);
                        println!("Type {} for available commands", "/help".yellow());
                        outcome = TurnOutcome::Question(question);
                        continue;
                    }
                }
            }

            println!("{}", "Thinking...".dimmed());
            let SessionUpdate { outcome: next, .. } = self.planner.continue_session(&self.id, &reply).await?;
            outcome = next;
        }
    }

    fn print_welcome(&self) {
        println!();
        println!("{}", "Specwright planning session".bright_cyan().bold());
        println!("Session: {}", self.id);
        println!(
            "Type {} for help, {} when you are done, {} to leave",
            "/help".yellow(),
            "/done".yellow(),
            "/quit".yellow()
        );
        println!();
    }

    async fn print_tools(&mut self) {
        let tools = self.planner.refresh_tools().await;
        println!();
        if tools.is_empty() {
            println!("{}", "No external tools available.".dimmed());
        }
        for tool in tools {
            println!("  {} {}", format!("{}/{}", tool.provider_id, tool.name).yellow(), tool.description);
        }
        println!();
    }

    fn quit(&self) -> DialogueEnd {
        println!();
        println!("Session saved. Continue later with {}", format!("sw resume {}", self.id).yellow());
        DialogueEnd::Quit
    }

    async fn offer_generation(&mut self, rl: &mut DefaultEditor) -> Result<DialogueEnd> {
        let answer = match rl.readline(&format!("{} ", "Generate the document now? [Y/n]".bright_green())) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => String::from("n"),
            Err(err) => return Err(eyre::eyre!("Readline error: {}", err)),
        };
        if matches!(answer.trim().to_lowercase().as_str(), "n" | "no") {
            println!("Generate later with {}", format!("sw generate {}", self.id).yellow());
            return Ok(DialogueEnd::Ready);
        }

        println!();
        let document = stream_document(&*self.planner, &self.id).await?;
        Ok(DialogueEnd::Generated(document))
    }
}

/// Generate with live output, printing text deltas as they arrive
pub async fn stream_document(planner: &Planner, id: &str) -> Result<DecisionDocument> {
    let (tx, mut rx) = mpsc::channel::<StreamChunk>(100);

    // Spawn task to receive and print chunks
    let print_handle = tokio::spawn(async move {
        while let Some(chunk) = rx.recv().await {
            match chunk {
                StreamChunk::TextDelta(text) => {
                    print!("{}", text);
                    let _ = io::stdout().flush();
                }
                StreamChunk::Error(err) => {
                    eprintln!("\n{} {}", "Stream error:".red(), err);
                }
                _ => {}
            }
        }
    });

    let document = planner.generate_document_streaming(id, tx).await?;
    let _ = print_handle.await;
    println!();
    Ok(document)
}

/// Read one non-empty reply; `None` on EOF
fn read_reply(rl: &mut DefaultEditor) -> Result<Option<String>> {
    loop {
        match rl.readline(&format!("{} ", ">".bright_green())) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);
                return Ok(Some(input.to_string()));
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C - just show new prompt
                println!("^C");
            }
            Err(ReadlineError::Eof) => return Ok(None),
            Err(err) => return Err(eyre::eyre!("Readline error: {}", err)),
        }
    }
}

fn print_help() {
    println!();
    println!("{}", "Available Commands:".bright_cyan());
    println!("  {:14} Show this help", "/help".yellow());
    println!("  {:14} Rediscover and list the available tools", "/tools".yellow());
    println!("  {:14} Stop the interview and mark it ready", "/done".yellow());
    println!("  {:14} Leave; the session stays resumable", "/quit".yellow());
    println!();
    println!("Reply with an option number to pick that option, or answer in your own words.");
    println!();
}

fn print_ready(evaluation: &ReadinessEvaluation) {
    println!();
    println!("{}", "Ready to write the document.".bright_green().bold());
    if !evaluation.reasoning.is_empty() {
        println!("{}", evaluation.reasoning.dimmed());
    }
    println!();
}

/// Lay out a question for the terminal
///
/// With `color` off the output is plain text, which keeps it testable.
pub fn format_question(question: &PlanningQuestion, color: bool) -> String {
    let mut out = String::from("\n");
    if !question.header.is_empty() {
        let header = if color {
            question.header.bright_cyan().bold().to_string()
        } else {
            question.header.clone()
        };
        out.push_str(&format!("{header}\n\n"));
    }
    if !question.body_text.is_empty() {
        out.push_str(&format!("{}\n\n", question.body_text));
    }
    if let Some(prompt) = &question.option_prompt {
        let prompt = if color { prompt.bold().to_string() } else { prompt.clone() };
        out.push_str(&format!("{prompt}\n\n"));
    }
    for option in &question.options {
        let title = if color {
            option.title.bright_white().bold().to_string()
        } else {
            option.title.clone()
        };
        out.push_str(&format!("  {}. {}", option.id, title));
        if option.recommended {
            let marker = if color {
                "(recommended)".green().to_string()
            } else {
                "(recommended)".to_string()
            };
            out.push_str(&format!(" {marker}"));
        }
        out.push('\n');
        if !option.description.is_empty() {
            for line in option.description.lines() {
                out.push_str(&format!("     {line}\n"));
            }
        }
    }
    out.trim_end().to_string()
}
