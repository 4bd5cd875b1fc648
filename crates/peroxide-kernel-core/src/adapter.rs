//! Kernel adapter over an interactive interpreter.
//!
//! The adapter forwards submitted code to the REPL one line at a time and
//! scrapes the text between prompts back as cell output:
//!
//! ```text
//! cell code ──lines──► send_line ──► expect [">>> ", "... "]
//!                                        │
//!                          ready ────────┼──── continuation
//!                            │                     │
//!                  append text before       carry state to
//!                  the prompt to output     the next line
//!
//! last prompt was continuation ─► send "#\invalid", expect "Error: .*",
//!                                 expect ">>> ", append notice
//! ```

use regex::Regex;

use crate::config::AdapterConfig;
use crate::error::Result;
use crate::expect::Match;
use crate::kernel::{ExecuteRequest, ExecuteResult, Kernel, KernelInfo, OutputSink, StreamEvent};
use crate::process::ChildProcess;
use crate::prompt::{PromptConfig, PromptSet, PromptState};

/// Line-oriented conversation with a REPL.
pub trait ReplChannel {
    /// Send one line of input; the newline is added by the channel.
    fn send_line(&mut self, line: &str) -> Result<()>;

    /// Block until one of `patterns` appears in the REPL's output.
    fn expect(&mut self, patterns: &[Regex]) -> Result<Match>;
}

impl ReplChannel for ChildProcess {
    fn send_line(&mut self, line: &str) -> Result<()> {
        ChildProcess::send_line(self, line)
    }

    fn expect(&mut self, patterns: &[Regex]) -> Result<Match> {
        ChildProcess::expect(self, patterns)
    }
}

/// Drives one interpreter process as a notebook kernel.
pub struct InteractiveProcessAdapter<C = ChildProcess> {
    channel: C,
    prompts: PromptSet,
    prompt_config: PromptConfig,
    state: PromptState,
    info: KernelInfo,
}

impl InteractiveProcessAdapter<ChildProcess> {
    /// Spawn the configured interpreter and wait for its first ready prompt.
    pub fn spawn(config: &AdapterConfig) -> Result<Self> {
        let mut child = ChildProcess::spawn(&config.interpreter)?;
        child.set_timeout(config.timeout);
        Self::attach(child, config.prompts.clone())
    }
}

impl<C: ReplChannel> InteractiveProcessAdapter<C> {
    /// Wrap an already running REPL, blocking until it shows the ready prompt.
    pub fn attach(mut channel: C, prompt_config: PromptConfig) -> Result<Self> {
        let prompts = PromptSet::compile(&prompt_config)?;

        let greeting = channel.expect(std::slice::from_ref(prompts.ready()))?;
        if !greeting.before.is_empty() {
            tracing::debug!("Interpreter greeting: {:?}", greeting.before);
        }

        Ok(Self {
            channel,
            prompts,
            prompt_config,
            state: PromptState::Ready,
            info: KernelInfo::peroxide(),
        })
    }

    /// Replace the metadata reported to the front-end.
    pub fn with_info(mut self, info: KernelInfo) -> Self {
        self.info = info;
        self
    }

    /// Prompt state after the last request.
    pub fn state(&self) -> PromptState {
        self.state
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Send `code` line by line and collect the interpreter's output.
    pub fn run_code(&mut self, code: &str) -> Result<String> {
        let mut output = String::new();

        for line in split_lines(code) {
            tracing::debug!("Sending line {:?}", line);
            self.channel.send_line(line)?;

            let found = self.channel.expect(self.prompts.line_patterns())?;
            self.state = self.state.transition(found.index)?;
            tracing::debug!("Matched {:?}, now {:?}", found.matched, self.state);

            if self.state.is_ready() {
                output.push_str(&found.before);
            }
        }

        if !self.state.is_ready() {
            self.resynchronize()?;
            output.push_str(&self.prompt_config.incomplete_notice);
        }

        Ok(output)
    }

    /// Bring a REPL stuck in continuation back to its ready prompt.
    ///
    /// Sends a token the interpreter cannot lex, which makes it drop the open
    /// expression and report an error. The error text and the ready prompt
    /// that follows it are discarded.
    fn resynchronize(&mut self) -> Result<()> {
        tracing::debug!("Incomplete expression, forcing an error to reset the REPL");
        self.channel.send_line(&self.prompt_config.invalid_token)?;

        let forced = self.channel.expect(std::slice::from_ref(self.prompts.error()))?;
        tracing::debug!("Discarding forced error {:?}", forced.matched);

        self.channel.expect(std::slice::from_ref(self.prompts.ready()))?;
        self.state = PromptState::Ready;
        Ok(())
    }
}

/// Split `code` into lines the way the REPL's terminal would end them.
///
/// Besides `\n` and `\r\n` this breaks on a lone `\r` and the other Unicode
/// line separators, so no line sent to the interpreter carries an embedded
/// line break. A trailing break does not produce an empty last line.
fn split_lines(code: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = code.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        lines.push(&code[start..i]);
        start = i + c.len_utf8();
        if c == '\r' && chars.next_if(|&(_, next)| next == '\n').is_some() {
            start += 1;
        }
    }

    if start < code.len() {
        lines.push(&code[start..]);
    }
    lines
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\x0b'
            | '\x0c'
            | '\x1c'
            | '\x1d'
            | '\x1e'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

impl<C: ReplChannel + Send> Kernel for InteractiveProcessAdapter<C> {
    fn info(&self) -> &KernelInfo {
        &self.info
    }

    fn execute(
        &mut self,
        request: &ExecuteRequest,
        execution_count: u32,
        output: &mut dyn OutputSink,
    ) -> Result<ExecuteResult> {
        let text = self.run_code(&request.code)?;

        if !request.silent {
            output.stream(StreamEvent::stdout(text));
        }

        Ok(ExecuteResult::ok(execution_count))
    }
}
