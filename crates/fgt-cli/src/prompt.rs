//! Interactive prompts on the controlling terminal

use fgt_client::{FgtError, Prompter};
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal};

use crate::output::OutputFormat;

/// Stream receiving informational prompt lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStream {
    Stdout,
    Stderr,
}

impl MessageStream {
    /// Structured formats keep stdout for the report alone
    pub fn for_format(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => Self::Stdout,
            OutputFormat::Json | OutputFormat::Csv => Self::Stderr,
        }
    }
}

/// Line editor backed prompter; the editor draws its prompt on stderr
pub struct ConsolePrompter {
    editor: Reedline,
    messages: MessageStream,
}

impl ConsolePrompter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            editor: Reedline::create(),
            messages: MessageStream::for_format(format),
        }
    }
}

impl Prompter for ConsolePrompter {
    fn ask(&mut self, message: &str) -> fgt_client::Result<String> {
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(message.trim_end().to_string()),
            DefaultPromptSegment::Empty,
        );
        match self.editor.read_line(&prompt)? {
            Signal::Success(input) => Ok(input),
            // Ctrl-C or Ctrl-D
            _ => Err(FgtError::input("operation aborted")),
        }
    }

    fn say(&mut self, line: &str) {
        match self.messages {
            MessageStream::Stdout => println!("{}", line),
            MessageStream::Stderr => eprintln!("{}", line),
        }
    }
}
