//! Terminal implementation of the lifecycle prompts.

use phonemount_lib::{AppEntry, Prompter};
use std::io::{self, BufRead, Write};

/// Asks on stdout, reads answers from stdin. EOF or an unreadable answer counts as "no".
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn ask(&self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        io::stdout().flush().ok()?;
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl Prompter for TerminalPrompter {
    fn select_app(&self, apps: &[AppEntry]) -> Option<String> {
        println!("Apps with file sharing:");
        for (index, app) in apps.iter().enumerate() {
            println!("  {:>3}. {}", index + 1, app.label());
        }
        let answer = self.ask(&format!("Select an app [1-{}], or press Enter to cancel: ", apps.len()))?;
        parse_choice(&answer, apps.len()).map(|index| apps[index].app_id.clone())
    }

    fn confirm(&self, question: &str) -> bool {
        self.ask(&format!("{question} [y/N] ")).is_some_and(|answer| is_yes(&answer))
    }
}

/// Turns a 1-based menu answer into an index below `count`.
pub fn parse_choice(answer: &str, count: usize) -> Option<usize> {
    let choice: usize = answer.trim().parse().ok()?;
    (1..=count).contains(&choice).then(|| choice - 1)
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
