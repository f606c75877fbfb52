use anyhow::Result;
use colored::Colorize;
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::env;
use taskflow::prelude::TaskflowConfig;
use taskflow::{ENGINE_NAME, VERSION as LIB_VERSION};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod interpreter;

use interpreter::Shell;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct ShellHighlighter;

impl Highlighter for ShellHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            Cow::Owned(format!("{} {}", command.yellow().bold(), rest.yellow()))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    let rule = "-".repeat(72);
    println!("{}", rule.dimmed());
    println!("{}", "  taskshell: step a Taskflow scheduler by hand".cyan().bold());
    println!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    println!(
        "{}",
        "  Distributed under the MIT OR Apache-2.0 license. Use at your own risk.".dimmed()
    );
    println!("{}", rule.dimmed());
}

fn print_help() {
    println!("Available commands:");
    println!("  resource <NAME>       - Adds an exclusive resource.");
    println!("  hold <NAME>           - Registers a task that holds a resource until interrupted.");
    println!("  release <NAME>        - Registers a release task for a resource.");
    println!("  default <NAME>        - Gives a resource a continuous default task.");
    println!("  wait <SECONDS>        - Registers a task that waits for the given time.");
    println!("  tick [N]              - Advances the scheduler N ticks (default 1).");
    println!("  status                - Shows resources, holders and running tasks.");
    println!("  clear                 - Interrupts every task (remove_all).");
    println!("  exit                  - Quits the shell.");
}

fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "taskflow.toml".to_string());
    let config = TaskflowConfig::load(&config_path)?;
    let mut shell = Shell::new(&config);
    info!(
        "{} ready, one tick = {:?}",
        ENGINE_NAME.cyan(),
        shell.period()
    );

    let mut rl = Editor::new()?;
    rl.set_helper(Some(ShellHighlighter));

    println!(
        "{} is waiting. Type 'help' for commands or 'exit' to quit.",
        ENGINE_NAME.cyan()
    );

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        match rl.readline(&prompt) {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.split_whitespace().collect::<Vec<_>>();
                match args.first().copied() {
                    None => {}
                    Some("help") => print_help(),
                    Some("exit") => break,
                    Some(_) => {
                        if let Err(e) = shell.execute(&args) {
                            println!("{} {:#}", "Error:".red().bold(), e);
                        }
                    }
                }
                for event in shell.drain_events() {
                    println!("<-- [EVENT] {}", event);
                }
            }
            Err(_) => break,
        }
    }

    println!("Exiting taskshell...");
    Ok(())
}
