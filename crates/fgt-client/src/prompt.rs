//! Interactive operator prompts
//!
//! Workflows ask questions through [`Prompter`] so the validation loops can
//! run against a console or a scripted answer list.

use std::net::Ipv4Addr;

use crate::error::{FgtError, Result};
use crate::version::parse_ipv4;

/// Source of operator answers
pub trait Prompter {
    /// Show `prompt` and read one answer line (without the line terminator)
    fn ask(&mut self, prompt: &str) -> Result<String>;

    /// Show an informational line
    fn say(&mut self, line: &str);
}

/// Ask until the answer is a valid IPv4 address
pub fn ask_ipv4<P: Prompter + ?Sized>(prompter: &mut P, prompt: &str) -> Result<Ipv4Addr> {
    loop {
        let answer = prompter.ask(prompt)?;
        match parse_ipv4(&answer) {
            Ok(address) => return Ok(address),
            Err(_) => prompter.say("Invalid IP address. Please enter a valid IPv4 address."),
        }
    }
}

/// Ask until the answer is non-empty
pub fn ask_non_empty<P: Prompter + ?Sized>(prompter: &mut P, prompt: &str) -> Result<String> {
    loop {
        let answer = prompter.ask(prompt)?;
        let answer = answer.trim();
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
        prompter.say("A value is required.");
    }
}

/// Parse a 1-based menu choice into a 0-based index
pub fn parse_menu_choice(input: &str, len: usize) -> Result<usize> {
    let choice: usize = input
        .trim()
        .parse()
        .map_err(|_| FgtError::input(format!("'{}' is not a number", input.trim())))?;
    if (1..=len).contains(&choice) {
        Ok(choice - 1)
    } else {
        Err(FgtError::input(format!(
            "choice {} is out of range 1-{}",
            choice, len
        )))
    }
}

/// Show a numbered menu and ask until a valid entry is picked
///
/// Returns the 0-based index of the chosen item.
pub fn choose<P: Prompter + ?Sized>(
    prompter: &mut P,
    title: &str,
    items: &[String],
    prompt: &str,
) -> Result<usize> {
    if items.is_empty() {
        return Err(FgtError::input("nothing to choose from"));
    }

    prompter.say(title);
    for (i, item) in items.iter().enumerate() {
        prompter.say(&format!("{}. {}", i + 1, item));
    }

    loop {
        let answer = prompter.ask(prompt)?;
        match parse_menu_choice(&answer, items.len()) {
            Ok(index) => return Ok(index),
            Err(e) => prompter.say(&e.to_string()),
        }
    }
}
