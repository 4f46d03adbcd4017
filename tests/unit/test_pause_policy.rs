//! Unit tests for the pause-after-run decision table

use subshell_host::models::{PausePolicy, SubshellState};
use subshell_host::pause::{decide, pause_on_dumb_terminal, pause_on_output, PauseContext, PauseDecision};
use subshell_host::subshell::OutputByteCount;
use subshell_host::terminal::TerminalCapabilities;

fn counter_with(output: bool) -> OutputByteCount {
    let mut counter = OutputByteCount::new();
    counter.subtract_written(9);
    counter.add_read(if output { 13 } else { 9 });
    counter
}

fn context(policy: PausePolicy, output: bool, capabilities: TerminalCapabilities) -> PauseContext {
    PauseContext {
        policy,
        quitting: false,
        state: SubshellState::Active,
        capabilities,
        output: counter_with(output),
    }
}

#[test]
fn test_decision_table() {
    let capable = TerminalCapabilities::new(true, false);
    let console = TerminalCapabilities::new(false, true);
    let dumb = TerminalCapabilities::default();

    // (policy, output observed, capabilities, expected pause)
    let table = [
        (PausePolicy::Never, false, dumb, false),
        (PausePolicy::Never, true, dumb, false),
        (PausePolicy::Never, true, capable, false),
        (PausePolicy::Always, false, capable, true),
        (PausePolicy::Always, true, capable, true),
        (PausePolicy::Always, false, dumb, true),
        (PausePolicy::OnDumbTerminals, false, dumb, true),
        (PausePolicy::OnDumbTerminals, true, dumb, true),
        (PausePolicy::OnDumbTerminals, true, capable, false),
        (PausePolicy::OnDumbTerminals, false, console, false),
        (PausePolicy::OnOutputOnly, true, capable, true),
        (PausePolicy::OnOutputOnly, false, capable, false),
        (PausePolicy::OnOutputOnly, true, dumb, true),
        (PausePolicy::OnOutputOnly, false, dumb, false),
    ];

    for (policy, output, capabilities, expected) in table {
        let decision = decide(&context(policy, output, capabilities));
        assert_eq!(
            decision.should_pause(),
            expected,
            "policy {} with output {} on {:?}",
            policy,
            output,
            capabilities
        );
    }
}

#[test]
fn test_quitting_never_pauses() {
    for policy in PausePolicy::ALL {
        let mut ctx = context(policy, true, TerminalCapabilities::default());
        ctx.quitting = true;
        assert_eq!(decide(&ctx), PauseDecision::NoPause, "policy {}", policy);
    }
}

#[test]
fn test_running_command_never_pauses() {
    for policy in PausePolicy::ALL {
        let mut ctx = context(policy, true, TerminalCapabilities::default());
        ctx.state = SubshellState::RunningCommand;
        assert_eq!(decide(&ctx), PauseDecision::NoPause, "policy {}", policy);
    }
}

#[test]
fn test_inconsistent_counter_is_no_output() {
    let mut counter = OutputByteCount::new();
    counter.subtract_written(1000);
    assert!(!pause_on_output(counter));

    let ctx = PauseContext {
        output: counter,
        ..context(PausePolicy::OnOutputOnly, false, TerminalCapabilities::default())
    };
    assert_eq!(decide(&ctx), PauseDecision::NoPause);
}

#[test]
fn test_dumb_terminal_predicate() {
    assert!(pause_on_dumb_terminal(TerminalCapabilities::new(false, false)));
    assert!(!pause_on_dumb_terminal(TerminalCapabilities::new(true, false)));
    assert!(!pause_on_dumb_terminal(TerminalCapabilities::new(false, true)));
    assert!(!pause_on_dumb_terminal(TerminalCapabilities::new(true, true)));
}

#[test]
fn test_dialog_order_and_names() {
    let names: Vec<&str> = PausePolicy::ALL.iter().map(|p| p.as_str()).collect();
    assert_eq!(
        names,
        vec!["never", "on_dumb_terminals", "always", "on_output_only"]
    );
    for (index, policy) in PausePolicy::ALL.iter().enumerate() {
        assert_eq!(policy.index(), index);
        assert_eq!(index.to_string().parse::<PausePolicy>().unwrap(), *policy);
        assert_eq!(policy.as_str().parse::<PausePolicy>().unwrap(), *policy);
    }
}

#[test]
fn test_default_policy() {
    assert_eq!(PausePolicy::default(), PausePolicy::OnDumbTerminals);
    assert_eq!(PauseDecision::default(), PauseDecision::NoPause);
}
