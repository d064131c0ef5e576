//! `vlabot plan` – run the interpretation pipeline by hand.
//!
//! Prompts for an image path and an instruction, asks the vision model
//! directly (no inference service, no robot) and prints both the raw reply
//! and what the interpreter makes of it.

use colored::Colorize;
use std::path::Path;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::runtime::Runtime;

use vlabot_inference::{VisionModel, build_prompt};
use vlabot_inference::api::normalize_image_path;
use vlabot_runtime::interpret;
use vlabot_types::VlaError;

/// Interpreter verdict on a raw model reply, one line per command.
pub fn interpretation(raw: &str) -> Result<Vec<String>, String> {
    interpret(raw)
        .map(|commands| commands.iter().map(ToString::to_string).collect())
        .map_err(|e| e.to_string())
}

/// Interactive loop; ends on EOF, Ctrl-C or `/quit`.
///
/// # Errors
///
/// Returns [`VlaError::Config`] if the line editor cannot be opened.
pub fn run(runtime: &Runtime, model: &dyn VisionModel) -> Result<(), VlaError> {
    let mut editor =
        DefaultEditor::new().map_err(|e| VlaError::Config(format!("line editor: {e}")))?;

    println!(
        "  Enter an image path and an instruction. {} to leave.\n",
        "/quit".bold()
    );

    loop {
        let Some(raw_path) = read(&mut editor, "image path> ") else {
            break;
        };
        let image = normalize_image_path(&raw_path);
        if image.is_empty() {
            continue;
        }
        if !Path::new(image).exists() {
            println!("  {} {}", "Image path does not exist:".red(), image.yellow());
            continue;
        }
        let Some(instruction) = read(&mut editor, "instruction> ") else {
            break;
        };

        let prompt = build_prompt(&instruction);
        println!("  {}", "Querying vision model …".dimmed());
        let raw = match runtime.block_on(model.generate(Path::new(image), &prompt)) {
            Ok(raw) => raw,
            Err(e) => {
                println!("  {}: {}", "Error processing image".red(), e);
                continue;
            }
        };

        println!("{}", "Raw response".bold().underline());
        println!("{raw}");
        println!("{}", "Interpreted commands".bold().underline());
        match interpretation(&raw) {
            Ok(lines) => {
                for (i, line) in lines.iter().enumerate() {
                    println!("  {:>2}. {}", i + 1, line.green());
                }
            }
            Err(diagnostic) => println!("  {}", diagnostic.red()),
        }
        println!();
    }
    Ok(())
}

/// One line of input, or `None` when the operator is done.
fn read(editor: &mut DefaultEditor, prompt: &str) -> Option<String> {
    match editor.readline(prompt) {
        Ok(line) => {
            let line = line.trim().to_string();
            if line == "/quit" || line == "/exit" {
                return None;
            }
            let _ = editor.add_history_entry(line.as_str());
            Some(line)
        }
        Err(ReadlineError::Interrupted | ReadlineError::Eof) => None,
        Err(e) => {
            println!("{}: {}", "Read error".red(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_reply_lists_commands() {
        let lines = interpretation("Sure!\n[\"go_ahead(1.5)\", \"turn_left(45)\"]").unwrap();
        assert_eq!(lines, vec!["go_ahead(1.5)", "turn_left(45)"]);
    }

    #[test]
    fn reply_without_commands_is_a_diagnostic() {
        let err = interpretation("I cannot see a robot here.").unwrap_err();
        assert!(err.contains("I cannot see a robot here."));
    }
}
