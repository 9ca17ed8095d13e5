//! End-to-end pipeline scenarios against a realistic processor.

use std::collections::HashMap;

use beacon_processor::filter::{CommandFilter, PinAndShortcuts, ResultFilter, SayEmptyOutput};
use beacon_processor::{test_processor, CommandProcessor, COMMAND_STATS};
use beacon_toolbox::{FeatureSet, ToolboxConfig, TwoFAConfig};
use beacon_types::{Command, CommandResult, ProcessorError};

fn command(content: &str) -> Command {
    Command::new("test", 10, content)
}

#[test]
fn correct_pin_runs_the_shell_feature() {
    let proc = test_processor().unwrap();
    let ret = proc.process(command("verysecret.s echo hello"), true);
    assert!(ret.error.is_none(), "unexpected error: {:?}", ret.error);
    assert_eq!(ret.combined_output, "hello");
    // The embedded command shows the post-filter content, trigger included.
    assert_eq!(ret.command.content, ".s echo hello");
}

#[test]
fn wrong_pin_is_rejected() {
    let proc = test_processor().unwrap();
    let ret = proc.process(command("wrongpin.s echo hello"), true);
    assert_eq!(ret.error, Some(ProcessorError::PinAndShortcutNotFound));
    assert_eq!(ret.output, "");
    // Commands that never pass the filters leave no content to correlate.
    assert_eq!(ret.command.content, "");
}

#[test]
fn translate_rules_rewrite_the_authenticated_command() {
    let proc = test_processor().unwrap();
    let ret = proc.process(command("verysecret.s echo alpha"), true);
    assert!(ret.error.is_none());
    assert_eq!(ret.combined_output, "beta");
}

#[test]
fn plt_override_windows_output_and_timeout() {
    let proc = test_processor().unwrap();
    let ret = proc.process(command("verysecret.plt 0 5 10 .s echo helloworld"), true);
    assert!(ret.error.is_none(), "unexpected error: {:?}", ret.error);
    assert_eq!(ret.combined_output, "hello");
    assert_eq!(ret.command.timeout_secs, 10);
}

#[test]
fn plt_window_can_skip_leading_output() {
    let proc = test_processor().unwrap();
    let ret = proc.process(command("verysecret.plt 5 5 10 .s echo helloworld"), true);
    assert!(ret.error.is_none());
    assert_eq!(ret.combined_output, "world");
}

#[test]
fn malformed_plt_is_rejected() {
    let proc = test_processor().unwrap();
    let ret = proc.process(command("verysecret.plt bogus"), true);
    assert_eq!(ret.error, Some(ProcessorError::BadPlt));
}

#[test]
fn plt_without_residual_command_is_rejected() {
    let proc = test_processor().unwrap();
    let ret = proc.process(command("verysecret.plt 1 2 3"), true);
    assert_eq!(ret.error, Some(ProcessorError::BadPlt));
}

#[test]
fn plt_needs_a_configured_linter() {
    let mut proc = test_processor().unwrap();
    proc.result_filters = vec![Box::new(SayEmptyOutput)];
    let ret = proc.process(command("verysecret.plt 0 5 10 .s echo hi"), true);
    assert_eq!(ret.error, Some(ProcessorError::PltUnavailable));
}

#[test]
fn unknown_trigger_is_rejected() {
    let proc = test_processor().unwrap();
    let ret = proc.process(command("verysecret.unknown foo"), true);
    assert_eq!(ret.error, Some(ProcessorError::BadPrefix));
}

#[test]
fn shortcut_expanding_to_nothing_is_an_empty_command() {
    let mut proc = test_processor().unwrap();
    proc.command_filters = vec![Box::new(PinAndShortcuts {
        pin: "verysecret".to_string(),
        shortcuts: HashMap::from([("noop".to_string(), "   ".to_string())]),
    })];
    let ret = proc.process(command("noop"), true);
    assert_eq!(ret.error, Some(ProcessorError::EmptyCommand));
}

#[test]
fn rate_limit_refuses_the_excess() {
    let mut proc = test_processor().unwrap();
    proc.max_cmd_per_sec = 3;
    let mut refusals = 0;
    for _ in 0..5 {
        let ret = proc.process(command("verysecret.s echo hi"), true);
        if ret.error == Some(ProcessorError::RateLimitExceeded) {
            refusals += 1;
        }
    }
    assert_eq!(refusals, 2, "3 admitted out of 5 within one window");
}

#[test]
fn sensitive_commands_are_redacted_from_the_result() {
    let mut config = ToolboxConfig::default();
    config.two_fa = TwoFAConfig {
        accounts: HashMap::from([(
            "github".to_string(),
            // "12345678901234567890" in base64.
            "MTIzNDU2Nzg5MDEyMzQ1Njc4OTA=".to_string(),
        )]),
    };
    let mut features = FeatureSet::standard(&config);
    features.initialise().unwrap();
    let mut proc = test_processor().unwrap();
    proc.features = features;

    let ret = proc.process(command("verysecret.2 github"), true);
    assert!(ret.error.is_none(), "unexpected error: {:?}", ret.error);
    assert_ne!(ret.command.content, ".2 github");
    assert!(ret.command.content.contains("hidden"));
}

#[test]
fn process_feeds_the_duration_statistics() {
    let proc = test_processor().unwrap();
    let before = COMMAND_STATS.count();
    let _ = proc.process(command("verysecret.s echo hi"), true);
    assert!(COMMAND_STATS.count() > before);
}

/// A result filter that always disapproves, for the demotion behaviour.
struct AlwaysFailingFilter;

impl ResultFilter for AlwaysFailingFilter {
    fn transform(&self, _result: &mut CommandResult) -> Result<(), ProcessorError> {
        Err(ProcessorError::feature("deliberate result filter failure"))
    }
}

#[test]
fn failing_result_filter_demotes_to_the_command_filter_verdict() {
    // With the command filters content, the demoted result carries no error
    // at all - the result-filter failure is hidden from the caller.
    let mut proc = test_processor().unwrap();
    proc.result_filters.push(Box::new(AlwaysFailingFilter));
    let ret = proc.process(command("verysecret.s echo hi"), true);
    assert_eq!(ret.error, None);
    assert_eq!(ret.combined_output, "");

    // With a disapproving command filter, the demoted result preserves that
    // earlier verdict instead of the post-processing failure.
    let mut proc = test_processor().unwrap();
    proc.result_filters.push(Box::new(AlwaysFailingFilter));
    let ret = proc.process(command("wrongpin.s echo hi"), true);
    assert_eq!(ret.error, Some(ProcessorError::PinAndShortcutNotFound));
}

#[test]
fn result_filters_can_be_skipped() {
    let proc = test_processor().unwrap();
    let ret = proc.process(command("verysecret.s echo '  spaced  '"), false);
    assert!(ret.error.is_none());
    // Without the lint filter the raw trailing newline survives.
    assert_eq!(ret.combined_output, "  spaced  \n");
}

/// A command filter probe that records whether it ran.
struct ProbeFilter(std::sync::Arc<std::sync::atomic::AtomicBool>);

impl CommandFilter for ProbeFilter {
    fn transform(&self, cmd: Command) -> Result<Command, ProcessorError> {
        self.0.store(true, std::sync::atomic::Ordering::Relaxed);
        Ok(cmd)
    }
}

#[test]
fn rate_limited_commands_never_reach_the_filters() {
    let invoked = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mut proc = test_processor().unwrap();
    proc.max_cmd_per_sec = 1;
    proc.command_filters
        .insert(0, Box::new(ProbeFilter(invoked.clone())));

    let first = proc.process(command("verysecret.s echo hi"), true);
    assert!(first.error.is_none());
    invoked.store(false, std::sync::atomic::Ordering::Relaxed);

    let second = proc.process(command("verysecret.s echo hi"), true);
    assert_eq!(second.error, Some(ProcessorError::RateLimitExceeded));
    assert!(!invoked.load(std::sync::atomic::Ordering::Relaxed));
}

#[test]
fn processor_is_shared_safely_between_threads() {
    let proc = std::sync::Arc::new({
        let mut proc = test_processor().unwrap();
        proc.max_cmd_per_sec = 1000;
        proc
    });
    let mut handles = Vec::new();
    for _ in 0..4 {
        let proc = std::sync::Arc::clone(&proc);
        handles.push(std::thread::spawn(move || {
            for _ in 0..5 {
                let ret = proc.process(command("verysecret.s echo hi"), true);
                assert!(ret.error.is_none(), "unexpected error: {:?}", ret.error);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn sanity_check_names_every_defect() {
    let proc = CommandProcessor::new(FeatureSet::new(), Vec::new(), Vec::new(), 0);
    let errs = proc.is_sane_for_internet();
    // No features, no PIN filter, no linter.
    assert_eq!(errs.len(), 3, "{errs:?}");
}
