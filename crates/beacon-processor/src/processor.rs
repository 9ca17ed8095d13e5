//! The command processor: admission, filtering, dispatch, post-processing.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use rand::RngCore;
use regex::Regex;
use tracing::{info, warn};

use beacon_toolbox::{Feature, FeatureSet, ToolboxConfig, SENSITIVE_TRIGGERS};
use beacon_types::{emergency_lock_down, Command, CommandResult, ProcessorError};

use crate::filter::{
    CommandFilter, LintText, NotifyViaEmail, PinAndShortcuts, ResultFilter, SayEmptyOutput,
    TranslateSequences,
};
use crate::ratelimit::RateLimit;
use crate::stats::COMMAND_STATS;

/// Magic prefix that windows the output and overrides the execution
/// timeout: `.plt P L T command` (position, length, timeout).
pub const PLT_PREFIX: &str = ".plt";

/// Hard upper limit of commands a processor lets through per second.
///
/// A per-IP limiter in the front-end does not help against a PIN-guessing
/// attacker spread over many source addresses; this ceiling bounds the
/// total guess rate regardless of origin.
pub const MAX_CMD_PER_SEC_HARD_LIMIT: usize = 1000;

/// PIN of the processor returned by [`test_processor`].
pub const TEST_PROCESSOR_PIN: &str = "verysecret";

/// Rate limiter key for the processor's own admission counter.
const INSTANCE_RATE_KEY: &str = "instance";

/// Stand-in for command content that must never reach a log line.
const SENSITIVE_CONTENT_MARKER: &str = "<hidden due to sensitive command content>";

/// Permissive parser for the PLT parameters: tolerates DTMF artefacts and
/// voice-to-text noise between the three integers.
fn plt_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\d]*(\d+)[^\d]+(\d+)[^\d]*(\d+)(.*)").expect("static regex"))
}

/// Pre-configured environment for processing toolbox commands.
///
/// The processor is self-contained per call apart from the global lockdown
/// flag, the lazily built rate limiter, and the duration statistics; it is
/// shared read-only between front-end request handlers after construction.
pub struct CommandProcessor {
    /// Initialised toolbox features, looked up by trigger prefix.
    pub features: FeatureSet,
    /// Applied one by one to rewrite the inbound command.
    pub command_filters: Vec<Box<dyn CommandFilter>>,
    /// Applied one by one to rewrite the execution result.
    pub result_filters: Vec<Box<dyn ResultFilter>>,
    /// Approximate ceiling of commands processed per second; clamped into
    /// `[1, MAX_CMD_PER_SEC_HARD_LIMIT]` when the limiter is built.
    pub max_cmd_per_sec: usize,
    rate_limit: OnceLock<RateLimit>,
}

impl CommandProcessor {
    pub fn new(
        features: FeatureSet,
        command_filters: Vec<Box<dyn CommandFilter>>,
        result_filters: Vec<Box<dyn ResultFilter>>,
        max_cmd_per_sec: usize,
    ) -> Self {
        Self {
            features,
            command_filters,
            result_filters,
            max_cmd_per_sec,
            rate_limit: OnceLock::new(),
        }
    }

    /// `max_cmd_per_sec` with the hard ceiling applied.
    pub fn effective_max_cmd_per_sec(&self) -> usize {
        if self.max_cmd_per_sec < 1 || self.max_cmd_per_sec > MAX_CMD_PER_SEC_HARD_LIMIT {
            MAX_CMD_PER_SEC_HARD_LIMIT
        } else {
            self.max_cmd_per_sec
        }
    }

    /// The admission limiter, built once by whichever call gets here first.
    fn rate_limit(&self) -> &RateLimit {
        self.rate_limit
            .get_or_init(|| RateLimit::new(1, self.effective_max_cmd_per_sec()))
    }

    /// True when the processor cannot authenticate anything: no command
    /// filters at all, or a PIN filter with an empty PIN. Front-ends use
    /// this to bypass command handling silently.
    pub fn is_empty(&self) -> bool {
        if self.command_filters.is_empty() {
            return true;
        }
        self.command_filters
            .iter()
            .filter_map(|f| f.as_pin())
            .any(|pin| pin.pin.is_empty())
    }

    /// Check that the configuration is fit for exposure on the public
    /// Internet. Front-ends refuse to start unless this returns empty.
    pub fn is_sane_for_internet(&self) -> Vec<ProcessorError> {
        let mut errs = Vec::new();
        if self.features.is_empty() {
            errs.push(ProcessorError::bad_config(
                "no toolbox feature is initialised, or all features lack configuration",
            ));
        }
        match self.command_filters.iter().find_map(|f| f.as_pin()) {
            None => errs.push(ProcessorError::bad_config(
                "the PIN and shortcuts filter must be configured for password protection or command shortcuts",
            )),
            Some(pin) => {
                if pin.pin.is_empty() && pin.shortcuts.is_empty() {
                    errs.push(ProcessorError::bad_config(
                        "the PIN and shortcuts filter needs a password PIN, command shortcuts, or both",
                    ));
                }
                if !pin.pin.is_empty() && pin.pin.len() < 7 {
                    errs.push(ProcessorError::bad_config(
                        "the password PIN must be at least 7 characters long",
                    ));
                }
            }
        }
        match self.result_filters.iter().find_map(|f| f.as_lint()) {
            None => errs.push(ProcessorError::bad_config(
                "the text lint filter must be configured to restrict command output length",
            )),
            Some(lint) => {
                if lint.max_length < 35 || lint.max_length > 4096 {
                    errs.push(ProcessorError::bad_config(
                        "text lint maximum output length must be within [35, 4096]",
                    ));
                }
            }
        }
        errs
    }

    /// Run a command through the whole pipeline and return its result.
    ///
    /// The first error wins: a disapproving command filter, a bad `.plt`
    /// override, or a missing trigger each short-circuits to finalisation,
    /// where the result gets the command attached (content restored to the
    /// logged form), the combined text recomputed, and - when
    /// `run_result_filters` is set - the result filter chain applied.
    pub fn process(&self, mut cmd: Command, run_result_filters: bool) -> CommandResult {
        if emergency_lock_down() {
            return CommandResult::from_error(ProcessorError::EmergencyLockDown);
        }
        if !self.rate_limit().add(INSTANCE_RATE_KEY, true) {
            return CommandResult::from_error(ProcessorError::RateLimitExceeded);
        }
        let begin = Instant::now();

        let mut filter_disapproval = None;
        let mut lint_override = None;
        let mut log_content = String::new();

        let mut ret = self.run_pipeline(
            &mut cmd,
            &mut filter_disapproval,
            &mut lint_override,
            &mut log_content,
        );

        COMMAND_STATS.observe(begin.elapsed());

        // The feature may have mutated its copy of the command; what goes
        // into the result is the processor's own copy with the content
        // restored to exactly what was logged (possibly the redaction
        // marker, possibly nothing for commands that never got that far).
        ret.command = cmd;
        ret.command.content = log_content;
        ret.reset_combined_text();

        if run_result_filters {
            for result_filter in &self.result_filters {
                let step = match (result_filter.as_lint(), &lint_override) {
                    // The `.plt` override substitutes for the configured
                    // linter, leaving the configured instance untouched.
                    (Some(_), Some(override_lint)) => override_lint.transform(&mut ret),
                    _ => result_filter.transform(&mut ret),
                };
                if let Err(err) = step {
                    // A failing result filter demotes the result to carry
                    // whatever the command-filter phase recorded (usually
                    // nothing), hiding the post-processing failure from the
                    // caller. The log line keeps it diagnosable.
                    warn!(error = %err, "result filter failed, demoting result");
                    return CommandResult {
                        command: ret.command,
                        output: String::new(),
                        error: filter_disapproval,
                        combined_output: String::new(),
                    };
                }
            }
        }
        ret
    }

    /// Filters, PLT override, trigger lookup, and feature execution.
    fn run_pipeline(
        &self,
        cmd: &mut Command,
        filter_disapproval: &mut Option<ProcessorError>,
        lint_override: &mut Option<LintText>,
        log_content: &mut String,
    ) -> CommandResult {
        for command_filter in &self.command_filters {
            match command_filter.transform(cmd.clone()) {
                Ok(next) => *cmd = next,
                Err(err) => {
                    *filter_disapproval = Some(err.clone());
                    return CommandResult::from_error(err);
                }
            }
        }
        if let Some(reject) = cmd.trim() {
            return reject;
        }

        if cmd.find_and_remove_prefix(PLT_PREFIX) {
            let Some(configured_lint) = self.result_filters.iter().find_map(|f| f.as_lint())
            else {
                return CommandResult::from_error(ProcessorError::PltUnavailable);
            };
            let mut lint = configured_lint.clone();

            let (begin_position, max_length, timeout_secs, residual) =
                match plt_regex().captures(&cmd.content) {
                    Some(captures) => {
                        let begin_position = captures[1].parse::<usize>();
                        let max_length = captures[2].parse::<usize>();
                        let timeout_secs = captures[3].parse::<u64>();
                        let residual = captures[4].to_string();
                        match (begin_position, max_length, timeout_secs) {
                            (Ok(p), Ok(l), Ok(t)) => (p, l, t, residual),
                            _ => return CommandResult::from_error(ProcessorError::BadPlt),
                        }
                    }
                    None => return CommandResult::from_error(ProcessorError::BadPlt),
                };
            if residual.is_empty() {
                return CommandResult::from_error(ProcessorError::BadPlt);
            }
            lint.begin_position = begin_position;
            lint.max_length = max_length;
            cmd.timeout_secs = timeout_secs;
            cmd.content = residual;
            *lint_override = Some(lint);
        }

        // Features may add or remove bits of the content while executing;
        // snapshot it now so logging and the returned result show the
        // post-filter form.
        *log_content = cmd.content.clone();

        let mut matched: Option<Arc<dyn Feature>> = None;
        for (trigger, feature) in self.features.lookup_by_trigger() {
            if cmd.find_and_remove_prefix(trigger) {
                if SENSITIVE_TRIGGERS.contains(&trigger) {
                    *log_content = SENSITIVE_CONTENT_MARKER.to_string();
                }
                matched = Some(Arc::clone(feature));
                break;
            }
        }
        let Some(feature) = matched else {
            return CommandResult::from_error(ProcessorError::BadPrefix);
        };

        info!(daemon = %cmd.daemon_name, command = %log_content, "going to run command");
        let ret = feature.execute(cmd.clone());
        info!(
            command = %log_content,
            ok = ret.error.is_none(),
            "command finished"
        );
        ret
    }
}

/// A realistic processor for test cases: shell execution behind the
/// [`TEST_PROCESSOR_PIN`], a translate rule, and a 35-byte text linter.
pub fn test_processor() -> Result<CommandProcessor, ProcessorError> {
    let mut features = FeatureSet::standard(&ToolboxConfig::default());
    features.initialise()?;
    let command_filters: Vec<Box<dyn CommandFilter>> = vec![
        Box::new(PinAndShortcuts {
            pin: TEST_PROCESSOR_PIN.to_string(),
            shortcuts: Default::default(),
        }),
        Box::new(TranslateSequences {
            sequences: vec![vec!["alpha".to_string(), "beta".to_string()]],
        }),
    ];
    let result_filters: Vec<Box<dyn ResultFilter>> = vec![
        Box::new(LintText {
            trim_spaces: true,
            max_length: 35,
            ..LintText::default()
        }),
        Box::new(SayEmptyOutput),
        Box::new(NotifyViaEmail::default()),
    ];
    Ok(CommandProcessor::new(
        features,
        command_filters,
        result_filters,
        0,
    ))
}

/// A do-nothing yet sane processor: its PIN is 128 random bytes in hex,
/// so no feature can realistically be invoked through it.
pub fn empty_processor() -> Result<CommandProcessor, ProcessorError> {
    let mut features = FeatureSet::standard(&ToolboxConfig::default());
    features.initialise()?;
    let mut pin_bytes = [0u8; 128];
    rand::thread_rng().fill_bytes(&mut pin_bytes);
    let pin: String = pin_bytes.iter().map(|b| format!("{b:02x}")).collect();
    Ok(CommandProcessor::new(
        features,
        vec![Box::new(PinAndShortcuts {
            pin,
            shortcuts: Default::default(),
        })],
        vec![
            Box::new(LintText {
                max_length: 35,
                ..LintText::default()
            }),
            Box::new(SayEmptyOutput),
        ],
        0,
    ))
}

/// A processor that deliberately fails the Internet sanity check: the PIN
/// is too short and the output window too narrow.
pub fn insane_processor() -> Result<CommandProcessor, ProcessorError> {
    let mut features = FeatureSet::standard(&ToolboxConfig::default());
    features.initialise()?;
    Ok(CommandProcessor::new(
        features,
        vec![Box::new(PinAndShortcuts {
            pin: "short".to_string(),
            shortcuts: Default::default(),
        })],
        vec![
            Box::new(LintText {
                max_length: 10,
                ..LintText::default()
            }),
            Box::new(SayEmptyOutput),
        ],
        0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_cmd_per_sec_is_clamped_into_range() {
        let make = |value| {
            CommandProcessor::new(FeatureSet::new(), Vec::new(), Vec::new(), value)
                .effective_max_cmd_per_sec()
        };
        assert_eq!(make(0), MAX_CMD_PER_SEC_HARD_LIMIT);
        assert_eq!(make(1), 1);
        assert_eq!(make(500), 500);
        assert_eq!(make(1000), 1000);
        assert_eq!(make(1001), MAX_CMD_PER_SEC_HARD_LIMIT);
    }

    #[test]
    fn plt_regex_is_permissive_about_separators() {
        let captures = plt_regex().captures("noise 3, 20 ; 10 .s echo hi").unwrap();
        assert_eq!(&captures[1], "3");
        assert_eq!(&captures[2], "20");
        assert_eq!(&captures[3], "10");
        assert_eq!(&captures[4], " .s echo hi");
    }

    #[test]
    fn plt_regex_rejects_incomplete_parameters() {
        assert!(plt_regex().captures("bogus").is_none());
        assert!(plt_regex().captures("1 2").is_none());
    }

    #[test]
    fn test_processor_is_sane() {
        let proc = test_processor().unwrap();
        assert!(proc.is_sane_for_internet().is_empty());
        assert!(!proc.is_empty());
    }

    #[test]
    fn empty_processor_is_sane_but_unusable() {
        let proc = empty_processor().unwrap();
        assert!(proc.is_sane_for_internet().is_empty());
        assert!(!proc.is_empty());
    }

    #[test]
    fn insane_processor_fails_the_sanity_check() {
        let proc = insane_processor().unwrap();
        let errs = proc.is_sane_for_internet();
        assert_eq!(errs.len(), 2, "short PIN and narrow linter: {errs:?}");
        for err in errs {
            assert!(err
                .to_string()
                .starts_with(beacon_types::error::BAD_PROCESSOR_CONFIG));
        }
    }

    #[test]
    fn processor_without_filters_is_empty() {
        let proc = CommandProcessor::new(FeatureSet::new(), Vec::new(), Vec::new(), 0);
        assert!(proc.is_empty());
    }

    #[test]
    fn processor_with_blank_pin_is_empty() {
        let proc = CommandProcessor::new(
            FeatureSet::new(),
            vec![Box::new(PinAndShortcuts::default())],
            Vec::new(),
            0,
        );
        assert!(proc.is_empty());
    }
}
