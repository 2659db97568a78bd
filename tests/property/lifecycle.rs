use proptest::prelude::*;

use benchrun::engine::{decide, CapturedOutput, ExcerptLimits, ProcessTermination, RunLifecycle};
use benchrun::types::RunStatus;

fn any_status() -> impl Strategy<Value = RunStatus> {
    prop_oneof![
        Just(RunStatus::Pending),
        Just(RunStatus::Running),
        Just(RunStatus::Completed),
        Just(RunStatus::Failed),
    ]
}

fn any_termination() -> impl Strategy<Value = ProcessTermination> {
    prop_oneof![
        any::<i32>().prop_map(|code| ProcessTermination::Exited { code }),
        "[a-z ]{0,20}".prop_map(|reason| ProcessTermination::LaunchFailed { reason }),
        (1u64..600).prop_map(|s| ProcessTermination::TimedOut {
            limit: std::time::Duration::from_secs(s)
        }),
        Just(ProcessTermination::StreamClosed),
    ]
}

proptest! {
    // Whatever sequence of transitions is attempted, the lifecycle only ever
    // walks pending -> running -> terminal and never leaves a terminal state.
    #[test]
    fn lifecycle_is_monotonic(attempts in proptest::collection::vec(any_status(), 0..20)) {
        let mut lc = RunLifecycle::new(7);
        let mut history = vec![lc.status()];

        for next in attempts {
            let before = lc.status();
            match lc.advance(next) {
                Ok(()) => {
                    prop_assert!(before.can_transition_to(next));
                    history.push(next);
                }
                Err(_) => prop_assert_eq!(lc.status(), before),
            }
        }

        let terminal_at = history.iter().position(|s| s.is_terminal());
        if let Some(idx) = terminal_at {
            prop_assert_eq!(idx, history.len() - 1);
        }
        prop_assert!(history.len() <= 3);
    }

    // Every way a process can end maps to exactly one terminal verdict whose
    // fields match its status.
    #[test]
    fn verdict_is_terminal_and_consistent(
        termination in any_termination(),
        stdout in "[ -~]{0,80}",
        stderr in "[ -~]{0,80}",
    ) {
        let mut output = CapturedOutput::default();
        output.push_stdout(stdout.as_bytes());
        output.push_stderr(stderr.as_bytes());

        let verdict = decide(&termination, &output, &ExcerptLimits::default());
        let status = verdict.status();
        prop_assert!(status.is_terminal());

        let update = verdict.into_update(chrono::Utc::now());
        prop_assert_eq!(update.status, status);
        prop_assert!(update.completed_at.is_some());
        match status {
            RunStatus::Completed => {
                prop_assert!(update.results.is_some());
                prop_assert!(update.error_message.is_none());
            }
            _ => {
                prop_assert!(update.results.is_none());
                prop_assert!(update.error_message.is_some_and(|m| !m.is_empty()));
            }
        }
    }

    #[test]
    fn non_zero_exit_is_always_failed(code in any::<i32>().prop_filter("non-zero", |c| *c != 0), stdout in "[ -~]{0,80}") {
        let mut output = CapturedOutput::default();
        output.push_stdout(stdout.as_bytes());
        let verdict = decide(&ProcessTermination::Exited { code }, &output, &ExcerptLimits::default());
        prop_assert_eq!(verdict.status(), RunStatus::Failed);
    }
}
