//! Stdin-backed implementation of the interactive chooser.

use std::io::{BufRead, Write};

use async_trait::async_trait;

use restitch_core::{ChoiceError, Chooser};

/// Presents numbered menus on stdout and reads the answer from stdin.
#[derive(Debug, Default)]
pub struct StdinChooser;

impl StdinChooser {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Chooser for StdinChooser {
    async fn choose_one(&self, prompt: &str, options: &[String]) -> Result<usize, ChoiceError> {
        let prompt = prompt.to_string();
        let options = options.to_vec();

        // Reading stdin is blocking; keep it off the async runtime.
        tokio::task::spawn_blocking(move || read_selection(&prompt, &options))
            .await
            .map_err(|e| ChoiceError::Io(std::io::Error::other(e)))?
    }
}

fn read_selection(prompt: &str, options: &[String]) -> Result<usize, ChoiceError> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    writeln!(stdout, "\n{}", prompt)?;
    for (i, option) in options.iter().enumerate() {
        writeln!(stdout, "  {}) {}", i + 1, option)?;
    }

    loop {
        write!(stdout, "Enter a number [1-{}]: ", options.len())?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Err(ChoiceError::Closed);
        }

        match line.trim().parse::<usize>() {
            Ok(n) if (1..=options.len()).contains(&n) => return Ok(n - 1),
            _ => writeln!(stdout, "Invalid selection.")?,
        }
    }
}
