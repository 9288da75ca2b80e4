//! Interactive question loop.

use anyhow::Result;
use docqa_rag::{DocumentRecord, Session};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

const PREVIEW_CHARS: usize = 500;

const HELP: &str = "\
Type a question, or one of:
  :docs           list documents
  :preview <id>   show the start of a document
  :delete <id>    remove a document
  :history        recent questions, newest first
  :clear          forget recent questions
  :quit           leave";

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Question(&'a str),
    Docs,
    Preview(&'a str),
    Delete(&'a str),
    History,
    Clear,
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse(line: &str) -> Input<'_> {
    let line = line.trim();
    let Some(command) = line.strip_prefix(':') else {
        return Input::Question(line);
    };
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match (name, arg) {
        ("docs", _) => Input::Docs,
        ("preview", id) if !id.is_empty() => Input::Preview(id),
        ("delete", id) if !id.is_empty() => Input::Delete(id),
        ("history", _) => Input::History,
        ("clear", _) => Input::Clear,
        ("help" | "h", _) => Input::Help,
        ("quit" | "q" | "exit", _) => Input::Quit,
        _ => Input::Unknown(line),
    }
}

pub async fn run(session: Session) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("Ask about your documents (:help for commands).");

    loop {
        let line = match editor.readline("docqa> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        if !line.trim().is_empty() {
            if let Err(e) = editor.add_history_entry(line.as_str()) {
                debug!(error = %e, "could not add line to editor history");
            }
        }

        match parse(&line) {
            Input::Question(question) => match session.ask(question).await {
                Ok(answer) => {
                    println!("{}", answer.text);
                    if let Some(source) = answer.source_ids.first() {
                        println!("  (source: {source})");
                    }
                }
                Err(e) => eprintln!("Error: {e}"),
            },
            Input::Docs => print_documents(&session.documents().await),
            Input::Preview(id) => match session.knowledge_base().document(id).await {
                Some(record) => println!("{}", record.preview(PREVIEW_CHARS)),
                None => println!("No document named {id}"),
            },
            Input::Delete(id) => match session.delete(id).await {
                Ok(true) => println!("Deleted {id}"),
                Ok(false) => println!("No document named {id}"),
                Err(e) => eprintln!("Error: {e}"),
            },
            Input::History => {
                let entries = session.history().await;
                if entries.is_empty() {
                    println!("No questions yet");
                }
                for entry in entries {
                    println!("[{}] Q: {}", entry.timestamp, entry.question);
                    println!("           A: {} ({})", entry.answer, entry.source_id);
                }
            }
            Input::Clear => {
                session.clear_history().await;
                println!("History cleared");
            }
            Input::Help => println!("{HELP}"),
            Input::Quit => break,
            Input::Unknown(command) => println!("Unknown command {command}; try :help"),
        }
    }
    Ok(())
}

pub fn print_documents(documents: &[DocumentRecord]) {
    if documents.is_empty() {
        println!("No documents yet");
        return;
    }
    for doc in documents {
        println!(
            "{:<40} {:>5} {:>8} words {:>10} bytes",
            doc.id,
            doc.format.extension(),
            doc.word_count(),
            doc.size_bytes
        );
    }
    println!("{} document(s)", documents.len());
}
