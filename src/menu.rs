//! Interactive menu and live progress rendering.

use crate::sampler::{Progress, ROLLING_WINDOW};
use std::io::{self, BufRead, Write};

pub const BANNER: &str = r"
    ____                          __  ___     __
   / __ \____ _      _____  _____/  |/  /__  / /____  _____
  / /_/ / __ \ | /| / / _ \/ ___/ /|_/ / _ \/ __/ _ \/ ___/
 / ____/ /_/ / |/ |/ /  __/ /  / /  / /  __/ /_/  __/ /
/_/    \____/|__/|__/\___/_/  /_/  /_/\___/\__/\___/_/
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    RunTests,
    AddCalculations,
    RerunTest,
    Exit,
}

const OPTIONS: [(&str, &str, MenuChoice); 4] = [
    ("1", "Run test sequence", MenuChoice::RunTests),
    ("2", "Add calculations to existing report", MenuChoice::AddCalculations),
    ("3", "Rerun one test", MenuChoice::RerunTest),
    ("4", "Exit", MenuChoice::Exit),
];

/// Render the numbered menu and block until the operator picks a valid
/// option. EOF on stdin selects Exit.
pub fn display_menu() -> MenuChoice {
    println!("\n{}", "=".repeat(60));
    for (key, description, _) in OPTIONS {
        println!("[{key}] {description}");
    }
    println!("{}", "=".repeat(60));

    loop {
        print!("\nSelect an option: ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).unwrap_or(0) == 0 {
            return MenuChoice::Exit;
        }
        let choice = line.trim();
        if let Some((_, _, selected)) = OPTIONS.iter().find(|(key, _, _)| *key == choice) {
            return *selected;
        }
        let keys: Vec<&str> = OPTIONS.iter().map(|(key, _, _)| *key).collect();
        println!("Invalid option. Please select from {keys:?}");
    }
}

/// Read one line from the operator, trimmed.
pub fn prompt_line(message: &str) -> String {
    print!("{message}");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
    line.trim().to_string()
}

/// Redraws a status line plus the last 15 samples in place using ANSI cursor
/// movement, padding each line to clear the previous frame.
#[derive(Default)]
pub struct ProgressRenderer {
    drawn: bool,
}

impl ProgressRenderer {
    /// Status line + one line per rolling-window slot.
    const PANE_LINES: usize = ROLLING_WINDOW + 1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, progress: &Progress<'_>) {
        if self.drawn {
            for _ in 0..Self::PANE_LINES {
                print!("\x1b[F");
            }
        }

        let status = match progress.global_elapsed_min {
            Some(global) => format!(
                "Test Progress: {:.2}/{:.2} min | Remaining: {:.2} min | Global Timer: {:.2} min | Samples: {}",
                progress.test_elapsed_min,
                progress.test_elapsed_min + progress.test_remaining_min,
                progress.test_remaining_min,
                global,
                progress.sample_count
            ),
            None => format!(
                "Test Progress: {:.2}/{:.2} min | Remaining: {:.2} min | Samples: {}",
                progress.test_elapsed_min,
                progress.test_elapsed_min + progress.test_remaining_min,
                progress.test_remaining_min,
                progress.sample_count
            ),
        };
        println!("\r{status:<120}");

        for i in 0..ROLLING_WINDOW {
            match progress.recent.get(i) {
                Some(sample) => println!("  [{:2}] {sample:<100}", i + 1),
                None => println!("{:<120}", ""),
            }
        }
        let _ = io::stdout().flush();
        self.drawn = true;
    }

    /// Move past the display area once a run finishes.
    pub fn finish(&mut self) {
        if self.drawn {
            println!();
            self.drawn = false;
        }
    }
}
