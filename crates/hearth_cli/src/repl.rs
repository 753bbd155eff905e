//! Terminal conversation loop.

use anyhow::Result;
use hearth_reasoning::Brain;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;

const HELP: &str = "Commands: /state  /elastic on|off  /release  /snapshots  /help  /quit";

fn history_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("hearth").join("history.txt"))
}

pub async fn run(brain: Arc<Brain>) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = &history {
        // First run has no history yet
        let _ = editor.load_history(path);
    }

    println!("Hearth is listening. {HELP}");
    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(trimmed);

        match trimmed {
            "/quit" | "/exit" => break,
            "/help" => println!("{HELP}"),
            "/state" => {
                let state = brain.limbic_state().await;
                println!("{}  tier={}", state.describe(), state.tier());
            }
            "/elastic on" => {
                brain.set_elastic_mode(true).await;
                println!("Elastic mode on.");
            }
            "/elastic off" => {
                brain.set_elastic_mode(false).await;
                println!("Elastic mode off.");
            }
            "/release" => {
                let state = brain.limbic().release_posture().await;
                println!("Posture released ({}).", state.posture);
            }
            "/snapshots" => match brain.snapshots().await {
                Ok(list) if list.is_empty() => println!("No snapshots yet."),
                Ok(list) => {
                    for s in list {
                        println!("{}  {}  {}", s.timestamp.to_rfc3339(), s.commit_ref, s.repo.display());
                    }
                }
                Err(e) => println!("[error] {e:#}"),
            },
            input => {
                let trace = brain.process_turn(input).await;
                println!("\nHearth: {}\n", trace.response);
                tracing::debug!(
                    turn_id = %trace.turn_id,
                    selected = %trace.decision.selected_option_id,
                    "{}",
                    trace.decision.rationale
                );
            }
        }
    }

    if let Some(path) = &history {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = editor.save_history(path) {
            tracing::warn!("Failed to save history: {e}");
        }
    }
    Ok(())
}
