use anyhow::{Context, Result};
use console::style;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::pipeline::{InstructionSource, ItemStatus, Pipeline, RunReport, StaticInstruction};

/// Interactive line-mode front end: prompts for the folder, runs the batch,
/// prints per-item status lines and a completion banner.
pub async fn run(
    pipeline: &Pipeline,
    folder: Option<PathBuf>,
    instruction: Option<String>,
) -> Result<()> {
    let folder = match folder {
        Some(folder) => folder,
        None => PathBuf::from(prompt_line(
            "Enter the full path to the folder with the videos: ",
        )?),
    };

    println!(
        "{}",
        style(format!("Processing videos in: {}", folder.display())).bold()
    );

    let report = match instruction {
        Some(text) => {
            let mut source = StaticInstruction(Some(text));
            pipeline.run_batch(&folder, &mut source).await?
        }
        None => {
            let mut source = PromptInstruction;
            pipeline.run_batch(&folder, &mut source).await?
        }
    };

    if report.items.is_empty() {
        println!("{}", style("No videos found.").yellow());
        return Ok(());
    }

    render_report(&report);
    Ok(())
}

fn render_report(report: &RunReport) {
    println!();
    for item in &report.items {
        let name = item.source.display();
        match &item.status {
            ItemStatus::Completed => {
                println!("{} {}", style("✔").green(), name);
            }
            ItemStatus::SummaryFailed => {
                println!(
                    "{} {} (summary holds an error message)",
                    style("✘").red(),
                    name
                );
            }
            ItemStatus::EmptyTranscript => {
                println!(
                    "{} {} (empty transcript, summary skipped)",
                    style("•").yellow(),
                    name
                );
            }
            ItemStatus::ExtractionFailed(reason) => {
                println!("{} {} (extraction failed: {reason})", style("✘").red(), name);
            }
            ItemStatus::TranscriptionFailed(reason) => {
                println!(
                    "{} {} (transcription failed: {reason})",
                    style("✘").red(),
                    name
                );
            }
        }
    }

    println!();
    println!(
        "{}",
        style(format!(
            "🎉 Done: {}/{} items fully processed.",
            report.completed(),
            report.items.len()
        ))
        .bold()
    );
}

/// Blocks on stdin once per run to collect the optional instruction.
pub struct PromptInstruction;

impl InstructionSource for PromptInstruction {
    fn instruction(&mut self) -> Option<String> {
        loop {
            let answer = match prompt_line("Add a context/instruction for the AI? (y/n): ") {
                Ok(answer) => answer.to_lowercase(),
                Err(_) => return None,
            };
            match answer.as_str() {
                "y" | "yes" => {
                    return prompt_line("Enter your instruction: ")
                        .ok()
                        .filter(|text| !text.is_empty());
                }
                "n" | "no" => return None,
                _ => println!("Invalid answer, please type 'y' or 'n'."),
            }
        }
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush().ok();

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim().to_string())
}
