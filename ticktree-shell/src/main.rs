use anyhow::Result;
use colored::Colorize;
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::env;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use ticktree::prelude::*;
use ticktree::{LIB_NAME, VERSION as LIB_VERSION};
use tracing::info;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct MyHighlighter;

impl Highlighter for MyHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            let colored_command = command.yellow().bold();
            let colored_rest = rest.yellow();
            Cow::Owned(format!("{} {}", colored_command, colored_rest))
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
    // The `include_str!` macro reads the file at COMPILE time and embeds
    // the text directly into the binary. This is very efficient.
    // It assumes `logo.log` is in the root of the `ticktree-shell` crate.
    const LOGO_TEXT: &str = include_str!("../logo.log");
    println!("{}", LOGO_TEXT.cyan());

    // Dynamically create the version string
    let version_string = format!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );

    println!("{}", "-----------------------------------------------------------------------------------------------".dimmed());

    let license_blurb = "
    This software is provided 'as is', without warranty of any kind.
    Distributed under the MIT OR Apache-2.0 license. Use at your own risk.
    ";

    println!("{}", version_string);
    println!("{}", license_blurb.dimmed());

    println!("{}", "-----------------------------------------------------------------------------------------------".dimmed());
}

/// Commands forwarded from the REPL to the scheduler thread.
enum ShellCommand {
    SpawnInterval { name: String, seconds: f64 },
    SpawnOnce { name: String, seconds: f64 },
    List,
    Start(String),
    Stop(String),
    Pause(String),
    Play(String),
    Retime { name: String, seconds: f64 },
    Remove(String),
    Shutdown,
}

/// Runs the registry on its own thread, interleaving polls with commands
/// from the REPL.
fn run_scheduler(config: SchedulerConfig, rx: mpsc::Receiver<ShellCommand>) {
    let tick_hz = config.tick_hz;
    let pacing = config
        .pacing
        .poll_interval()
        .unwrap_or(Duration::from_millis(1));
    let source: std::sync::Arc<dyn TickSource> =
        std::sync::Arc::new(SystemTickSource::new());
    let mut registry = Registry::with_config(source, config);

    let to_ticks = |seconds: f64| (seconds * tick_hz as f64) as Ticks;

    loop {
        registry.poll_once();
        while let Ok(command) = rx.try_recv() {
            match command {
                ShellCommand::SpawnInterval { name, seconds } => {
                    let label = name.clone();
                    registry.interval(name, to_ticks(seconds), 0, move |cx| {
                        println!("\n<-- [INTERVAL] '{}' fired frame #{}\n>> ", label, cx.frame);
                    });
                    println!("--> Added interval task every {} s.", seconds);
                }
                ShellCommand::SpawnOnce { name, seconds } => {
                    let label = name.clone();
                    registry.once(name, to_ticks(seconds), move |_cx| {
                        println!("\n<-- [ONCE] '{}' fired!\n>> ", label);
                    });
                    println!("--> Added one-shot task after {} s.", seconds);
                }
                ShellCommand::List => {
                    println!("Registered tasks:");
                    for (_key, node) in registry.iter() {
                        println!(
                            "  {:<16} {:<8} frame #{}",
                            node.name(),
                            node.state().to_string(),
                            node.trigger().fire_count()
                        );
                    }
                }
                ShellCommand::Start(name) => report(registry.start(&name), "started", &name),
                ShellCommand::Stop(name) => report(registry.stop(&name), "stopped", &name),
                ShellCommand::Pause(name) => report(registry.pause(&name), "paused", &name),
                ShellCommand::Play(name) => report(registry.play(&name), "resumed", &name),
                ShellCommand::Retime { name, seconds } => {
                    report(registry.retime(&name, to_ticks(seconds)), "retimed", &name)
                }
                ShellCommand::Remove(name) => match registry.find_by_name(&name) {
                    Some(key) => {
                        registry.remove(key);
                        println!("--> Task '{}' removed.", name);
                    }
                    None => println!("--> Error: no task named '{}'.", name),
                },
                ShellCommand::Shutdown => return,
            }
        }
        thread::sleep(pacing);
    }
}

fn report(result: ScheduleResult<()>, verb: &str, name: &str) {
    match result {
        Ok(()) => println!("--> Task '{}' {}.", name, verb),
        Err(error) => println!("--> Error: {}", error),
    }
}

fn load_config() -> Result<SchedulerConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("tickshell").required(false))
        .add_source(config::Environment::with_prefix("TICKTREE"))
        .build()?;
    Ok(settings.try_deserialize().unwrap_or_default())
}

fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let config = load_config()?;
    let (tx, rx) = mpsc::channel();

    info!("Spawning the {} scheduler in the background...", LIB_NAME.cyan());
    let scheduler = thread::spawn(move || run_scheduler(config, rx));

    let mut rl = Editor::new()?;
    let helper = MyHighlighter {};
    rl.set_helper(Some(helper));

    println!(
        "{} is running. Type 'help' for commands or 'exit' to quit.",
        LIB_NAME.cyan()
    );

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        let readline = rl.readline(&prompt);
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.trim().split_whitespace().collect::<Vec<_>>();

                if let Some(command) = args.get(0) {
                    match *command {
                        "add" => match (args.get(1), args.get(2), args.get(3)) {
                            (Some(&"interval"), Some(name), Some(seconds_str)) => {
                                if let Ok(seconds) = seconds_str.parse::<f64>() {
                                    tx.send(ShellCommand::SpawnInterval {
                                        name: name.to_string(),
                                        seconds,
                                    })?;
                                } else {
                                    println!("Error: '{}' is not a valid number of seconds.", seconds_str);
                                }
                            }
                            (Some(&"once"), Some(name), Some(seconds_str)) => {
                                if let Ok(seconds) = seconds_str.parse::<f64>() {
                                    tx.send(ShellCommand::SpawnOnce {
                                        name: name.to_string(),
                                        seconds,
                                    })?;
                                } else {
                                    println!("Error: '{}' is not a valid number of seconds.", seconds_str);
                                }
                            }
                            _ => println!("Usage: add <interval|once> <NAME> <SECONDS>"),
                        },
                        "list" => tx.send(ShellCommand::List)?,
                        "start" | "stop" | "pause" | "play" | "remove" => {
                            if let Some(name) = args.get(1) {
                                let name = name.to_string();
                                let message = match *command {
                                    "start" => ShellCommand::Start(name),
                                    "stop" => ShellCommand::Stop(name),
                                    "pause" => ShellCommand::Pause(name),
                                    "play" => ShellCommand::Play(name),
                                    _ => ShellCommand::Remove(name),
                                };
                                tx.send(message)?;
                            } else {
                                println!("Usage: {} <NAME>", command);
                            }
                        }
                        "retime" => match (args.get(1), args.get(2)) {
                            (Some(name), Some(seconds_str)) => {
                                if let Ok(seconds) = seconds_str.parse::<f64>() {
                                    tx.send(ShellCommand::Retime {
                                        name: name.to_string(),
                                        seconds,
                                    })?;
                                } else {
                                    println!("Error: '{}' is not a valid number of seconds.", seconds_str);
                                }
                            }
                            _ => println!("Usage: retime <NAME> <SECONDS>"),
                        },
                        "help" => {
                            println!("Available commands:");
                            println!("  add interval <NAME> <S>  - Adds a task firing every S seconds.");
                            println!("  add once <NAME> <S>      - Adds a one-shot task after S seconds.");
                            println!("  list                     - Shows registered tasks and their states.");
                            println!("  start <NAME>             - Starts a task with its configured schedule.");
                            println!("  stop <NAME>              - Stops a task.");
                            println!("  pause <NAME>             - Freezes a task's clock.");
                            println!("  play <NAME>              - Resumes a paused task.");
                            println!("  retime <NAME> <S>        - Rebases a task's elapsed time to S seconds.");
                            println!("  remove <NAME>            - Detaches a task from the registry.");
                            println!("  exit                     - Quits the shell.");
                        }
                        "exit" => break,
                        "" => {}
                        _ => println!("Unknown command: '{}'. Type 'help'.", line),
                    }
                }
            }
            Err(_) => {
                println!("Exiting tickshell...");
                break;
            }
        }
    }

    tx.send(ShellCommand::Shutdown)?;
    let _ = scheduler.join();
    Ok(())
}
