//! `consult chat`: Interactive consultation in the terminal.
//!
//! Prints the event stream as it arrives and prompts for an answer whenever
//! the session suspends on a question.

use std::io::{self, BufRead, Write};

use console::style;
use consult_core::models::SessionStatus;
use consult_core::state::AppState;
use consult_core::{Run, StreamEvent};

enum Outcome {
    Suspended,
    Finished,
    Failed(String),
}

pub async fn run(
    state: &AppState,
    message: Option<String>,
    session_id: Option<String>,
) -> Result<(), String> {
    println!("Consult CLI Chat");
    println!("══════════════════════════════════════");
    println!("Roles: {}", state.registry.all().len());
    println!("Type /quit at any prompt to leave; the session stays resumable.");
    println!("══════════════════════════════════════");

    let mut current = match session_id {
        Some(id) => {
            let session = state
                .session_store
                .get(&id)
                .await
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("Session not found: {}", id))?;
            match &session.status {
                SessionStatus::AwaitingInput { role, question, .. } => {
                    println!("{}", render_question(role, question));
                }
                other => return Err(format!("Session {} is {}", id, other.as_str())),
            }
            let Some(answer) = prompt("> ")? else {
                return Ok(());
            };
            state
                .orchestrator
                .resume(&id, &answer)
                .await
                .map_err(|e| e.to_string())?
        }
        None => {
            let message = match message {
                Some(m) => m,
                None => match prompt("Describe your symptoms: ")? {
                    Some(m) => m,
                    None => return Ok(()),
                },
            };
            state
                .orchestrator
                .start(&message)
                .await
                .map_err(|e| e.to_string())?
        }
    };

    loop {
        let session_id = current.session_id.clone();
        match drain(&mut current).await {
            Outcome::Finished => return Ok(()),
            Outcome::Failed(e) => return Err(e),
            Outcome::Suspended => {
                let Some(answer) = prompt("> ")? else {
                    println!(
                        "Session saved. Continue with: consult chat --session-id {}",
                        session_id
                    );
                    return Ok(());
                };
                current = state
                    .orchestrator
                    .resume(&session_id, &answer)
                    .await
                    .map_err(|e| e.to_string())?;
            }
        }
    }
}

/// Print events until the run's stream closes.
async fn drain(run: &mut Run) -> Outcome {
    let mut outcome = Outcome::Failed("event stream closed unexpectedly".to_string());
    while let Some(event) = run.events.recv().await {
        if let Some(line) = render(&event) {
            println!("{}", line);
        }
        match event {
            StreamEvent::AwaitingInput { .. } => outcome = Outcome::Suspended,
            StreamEvent::Final { .. } => outcome = Outcome::Finished,
            StreamEvent::Error { message, .. } => outcome = Outcome::Failed(message),
            _ => {}
        }
    }
    outcome
}

/// Read one non-empty line; `None` on EOF or `/quit`.
fn prompt(label: &str) -> Result<Option<String>, String> {
    let stdin = io::stdin();
    loop {
        print!("{}", label);
        io::stdout().flush().ok();

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .map_err(|e| format!("Failed to read input: {}", e))?;
        if read == 0 {
            return Ok(None);
        }
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" | "/q" => return Ok(None),
            text => return Ok(Some(text.to_string())),
        }
    }
}

fn render_question(role: &str, question: &str) -> String {
    format!("{} {}", style(format!("[{}] asks:", role)).yellow().bold(), question)
}

fn render(event: &StreamEvent) -> Option<String> {
    match event {
        StreamEvent::Session { session_id } => {
            Some(style(format!("session {}", session_id)).dim().to_string())
        }
        StreamEvent::Message { role, text, .. } => {
            Some(format!("{} {}", style(format!("[{}]", role)).cyan().bold(), text))
        }
        StreamEvent::Action { kind, arguments, .. } if kind != "interactive-question" => Some(
            style(format!("  -> {} {}", kind, arguments)).dim().to_string(),
        ),
        StreamEvent::Action { .. } => None,
        StreamEvent::AwaitingInput { role, question, .. } => Some(render_question(role, question)),
        StreamEvent::Final { role, report, .. } => Some(format!(
            "{}\n{}",
            style(format!("Final report ({})", role)).green().bold(),
            report
        )),
        StreamEvent::Error { message, .. } => {
            Some(style(format!("Session failed: {}", message)).red().to_string())
        }
    }
}
