//! Renders turn progress in the terminal.

use gem_assist::kernel::{TurnEvent, TurnObserver};
use gem_assist::prompts::Phase;

const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Prints tool activity, and the plan when `show_reasoning` is set.
#[derive(Debug, Default)]
pub struct ConsoleObserver {
    show_reasoning: bool,
}

impl ConsoleObserver {
    pub fn new(show_reasoning: bool) -> Self {
        Self { show_reasoning }
    }
}

impl TurnObserver for ConsoleObserver {
    fn on_event(&self, event: &TurnEvent) {
        match event {
            TurnEvent::PhaseStarted { phase } => {
                let label = match phase {
                    Phase::Reasoning => "thinking",
                    Phase::Execution => "working",
                };
                println!("{DIM}· {label}…{RESET}");
            }
            TurnEvent::Reasoning { plan } if self.show_reasoning => {
                println!("{CYAN}── reasoning ──{RESET}\n{DIM}{plan}{RESET}");
            }
            TurnEvent::PlanReviewed { review } if !review.passed() => {
                println!(
                    "{YELLOW}! plan score {:.2} below {:.2}{RESET}",
                    review.score, review.threshold
                );
                if !review.missing_sections.is_empty() {
                    println!("{DIM}  missing: {}{RESET}", review.missing_sections.join(", "));
                }
            }
            TurnEvent::ToolCall {
                name, arguments, ..
            } => println!("{CYAN}→ {name}{RESET}{DIM}({}){RESET}", truncate(arguments, 120)),
            TurnEvent::ToolResult {
                name, elapsed_ms, ..
            } => println!("{GREEN}✓ {name}{RESET} {DIM}{elapsed_ms} ms{RESET}"),
            TurnEvent::ToolFailed { name, error, .. } => {
                println!("{RED}✗ {name}: {}{RESET}", truncate(error, 200));
            }
            TurnEvent::RetryScheduled { delay, .. } => {
                println!("{YELLOW}! rate limited, retrying in {}s{RESET}", delay.as_secs());
            }
            _ => {}
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé…");
        assert_eq!(truncate("hi", 5), "hi");
    }
}
