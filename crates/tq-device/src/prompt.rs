//! Interactive device selection

use std::io::{self, BufRead, Write};

use tq_core::error::Result;

/// Asks the user to choose between options
pub trait Chooser {
    /// Show `prompt` and return the raw answer
    fn ask(&mut self, prompt: &str) -> Result<String>;

    /// Tell the user which option was picked
    fn announce(&mut self, _message: &str) {}
}

/// Reads the answer from stdin
#[derive(Debug, Default)]
pub struct StdinChooser;

impl Chooser for StdinChooser {
    fn ask(&mut self, prompt: &str) -> Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", prompt)?;
        stdout.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(answer.trim().to_string())
    }

    fn announce(&mut self, message: &str) {
        println!("{}", message);
    }
}
