//! Interactive session. One lifecycle lives across commands, so the file listing cache and
//! the mount mode carry over between lines.

use clap::Parser;
use log::{debug, warn};
use std::io::{self, BufRead, Write};

use super::{CliError, Command, Session, execute};

#[derive(Parser, Debug)]
#[command(name = "phonemount", no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Command,
}

pub fn run(session: &mut Session<'_>) -> Result<(), CliError> {
    println!("phonemount shell. Type \"help\" for commands, \"exit\" to leave.");
    let stdin = io::stdin();
    loop {
        print!("phonemount> ");
        if let Err(e) = io::stdout().flush() {
            warn!("Couldn't flush stdout: {}", e);
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Couldn't read from stdin: {}", e);
                break;
            }
        }

        let args = match split_args(&line) {
            Ok(args) => args,
            Err(message) => {
                eprintln!("Error: {}", message);
                continue;
            }
        };
        let Some(first) = args.first() else { continue };
        if is_exit(first) {
            break;
        }

        debug!("Shell command: {:?}", args);
        match ShellLine::try_parse_from(&args) {
            Ok(ShellLine { command: Command::Shell }) => println!("Already in the shell."),
            Ok(parsed) => {
                if let Err(e) = execute(session, &parsed.command) {
                    eprintln!("Error: {}", e.user_message());
                }
            }
            // Help output and usage errors alike
            Err(e) => {
                if let Err(print_err) = e.print() {
                    warn!("Couldn't print usage: {}", print_err);
                }
            }
        }
    }
    leave(session)
}

/// Offers to unmount before the session ends, so the mount point isn't left busy.
fn leave(session: &mut Session<'_>) -> Result<(), CliError> {
    if session.lifecycle.is_mounted()
        && session.prompter.confirm("The iPhone is still mounted. Unmount it before exiting?")
    {
        session.lifecycle.unmount()?;
        println!("iPhone unmounted.");
    }
    Ok(())
}

fn is_exit(word: &str) -> bool {
    matches!(word, "exit" | "quit" | "q")
}

/// Splits a shell line into words. Single and double quotes group words with spaces in them;
/// a backslash escapes the next character outside single quotes.
pub fn split_args(line: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('\''), c) => current.push(c),
            (_, '\\') => match chars.next() {
                Some(escaped) => {
                    current.push(escaped);
                    in_word = true;
                }
                None => return Err("Line ends with a backslash".to_string()),
            },
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(format!("Unclosed {} quote", q));
    }
    if in_word {
        args.push(current);
    }
    Ok(args)
}
