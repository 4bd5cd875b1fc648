//! Integration tests against a real child process.
//!
//! A small `/bin/sh` script stands in for the Peroxide REPL: it prints the
//! same prompts, answers complete expressions with ` => <expr>` and rejects
//! `#\invalid` with an `Error:` line.

#![cfg(unix)]

use std::path::PathBuf;
use std::time::Duration;

use peroxide_kernel_core::{
    AdapterConfig, ExecuteRequest, ExecutionStatus, InteractiveProcessAdapter, InterpreterConfig,
    Kernel, PromptState, StreamEvent, Transport,
};

// =============================================================================
// Test Helpers
// =============================================================================

const FAKE_REPL: &str = r#"
pending=''
printf '>>> '
while IFS= read -r line; do
  if [ "$line" = '#\invalid' ]; then
    pending=''
    printf 'Error: unknown character name: invalid\n>>> '
    continue
  fi
  if [ -n "$pending" ]; then
    pending="$pending $line"
  else
    pending="$line"
  fi
  opens=$(( $(printf '%s' "$pending" | tr -cd '(' | wc -c) ))
  closes=$(( $(printf '%s' "$pending" | tr -cd ')' | wc -c) ))
  if [ "$opens" -gt "$closes" ]; then
    printf '... '
    continue
  fi
  printf ' => %s\n>>> ' "$pending"
  pending=''
done
"#;

fn fake_repl(transport: Transport) -> InteractiveProcessAdapter {
    let config = AdapterConfig::new(
        InterpreterConfig::new("/bin/sh")
            .with_args(["-c", FAKE_REPL])
            .with_transport(transport),
    )
    .with_timeout(Some(Duration::from_secs(10)));

    InteractiveProcessAdapter::spawn(&config).expect("fake REPL should start")
}

fn run(adapter: &mut InteractiveProcessAdapter, code: &str) -> String {
    let mut events: Vec<StreamEvent> = Vec::new();
    let result = adapter
        .execute(&ExecuteRequest::new(code), 1, &mut events)
        .expect("execution should succeed");
    assert_eq!(result.status, ExecutionStatus::Ok);
    assert_eq!(events.len(), 1);
    events.remove(0).text
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_pipe_single_expression() {
    let mut adapter = fake_repl(Transport::Pipe);
    assert_eq!(run(&mut adapter, "(+ 1 2)"), " => (+ 1 2)\n");
}

#[test]
fn test_pty_single_expression() {
    let mut adapter = fake_repl(Transport::Pty);
    // No echo of the sent line and no \r\n translation
    assert_eq!(run(&mut adapter, "(+ 1 2)"), " => (+ 1 2)\n");
}

#[test]
fn test_pty_incomplete_then_complete() {
    let mut adapter = fake_repl(Transport::Pty);

    let text = run(&mut adapter, "(+ 1");
    assert_eq!(text, "** Incomplete expression.");
    assert_eq!(adapter.state(), PromptState::Ready);

    // The forced error must not leak into the next request
    assert_eq!(run(&mut adapter, "(+ 1 2)"), " => (+ 1 2)\n");
}

#[test]
fn test_pty_carriage_return_keeps_requests_in_step() {
    let mut adapter = fake_repl(Transport::Pty);

    assert_eq!(
        run(&mut adapter, "(+ 1 2)\r(+ 3 4)"),
        " => (+ 1 2)\n => (+ 3 4)\n"
    );
    assert_eq!(run(&mut adapter, "(* 5 6)"), " => (* 5 6)\n");
    assert_eq!(run(&mut adapter, "(* 7 8)"), " => (* 7 8)\n");
}

#[test]
fn test_pipe_multi_line_expression() {
    let mut adapter = fake_repl(Transport::Pipe);
    let text = run(&mut adapter, "(define (f x)\n  (* x 2))\n(f 21)");
    assert_eq!(text, " => (define (f x)   (* x 2))\n => (f 21)\n");
}

#[test]
fn test_silent_request() {
    let mut adapter = fake_repl(Transport::Pipe);
    let mut events: Vec<StreamEvent> = Vec::new();
    let result = adapter
        .execute(&ExecuteRequest::new("(+ 1 2)").silent(true), 3, &mut events)
        .unwrap();

    assert_eq!(result.execution_count, 3);
    assert!(events.is_empty());
}

#[test]
fn test_child_that_exits_before_prompt() {
    let config = AdapterConfig::new(
        InterpreterConfig::new("/bin/sh")
            .with_args(["-c", "echo starting; exit 1"])
            .with_transport(Transport::Pipe),
    );

    match InteractiveProcessAdapter::spawn(&config) {
        Err(peroxide_kernel_core::Error::ChildExited { pending }) => {
            assert_eq!(pending, "starting\n");
        }
        Err(other) => panic!("expected ChildExited, got {}", other),
        Ok(_) => panic!("expected ChildExited, got a running adapter"),
    }
}

#[test]
#[ignore = "Requires the peroxide REPL; set PEROXIDE_KERNEL_INTERPRETER"]
fn test_real_peroxide_repl() {
    let program = std::env::var("PEROXIDE_KERNEL_INTERPRETER")
        .map(PathBuf::from)
        .expect("PEROXIDE_KERNEL_INTERPRETER must be set");
    let config = AdapterConfig::new(InterpreterConfig::new(program))
        .with_timeout(Some(Duration::from_secs(30)));
    let mut adapter = InteractiveProcessAdapter::spawn(&config).unwrap();

    assert!(run(&mut adapter, "(+ 1 2)").contains('3'));
    assert_eq!(run(&mut adapter, "(+ 1"), "** Incomplete expression.");
    assert!(run(&mut adapter, "(* 2 3)").contains('6'));
}
