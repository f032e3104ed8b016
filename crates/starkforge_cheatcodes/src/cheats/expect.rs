use std::fmt;

use itertools::Itertools;
use starkforge_common::{ContractAddress, Felt, Selector};

use crate::{
    CallInfo, CheatArgs, CheatValue, Cheatcode, CheatcodeError, CheatcodeErrorKind,
    ExecutionState, OrderedEvent, Result, RevertError, VmError,
};

/// A revert the current invocation is expected to end with.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpectedRevert {
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl ExpectedRevert {
    pub fn matches(&self, revert: &RevertError) -> bool {
        let type_matches = self
            .error_type
            .as_ref()
            .is_none_or(|error_type| *error_type == revert.code);
        let message_matches = self.error_message.as_ref().is_none_or(|expected| {
            revert
                .messages
                .iter()
                .any(|message| message.contains(expected.as_str()))
        });
        type_matches && message_matches
    }
}

impl fmt::Display for ExpectedRevert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.error_type, &self.error_message) {
            (None, None) => f.write_str("any revert"),
            (Some(error_type), None) => write!(f, "error type `{error_type}`"),
            (None, Some(message)) => write!(f, "error message containing `{message}`"),
            (Some(error_type), Some(message)) => write!(
                f,
                "error type `{error_type}` with error message containing `{message}`"
            ),
        }
    }
}

/// An event the current invocation is expected to emit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpectedEvent {
    pub name: String,
    pub data: Option<Vec<Felt>>,
    pub from_address: Option<ContractAddress>,
}

impl ExpectedEvent {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: None,
            from_address: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Vec<Felt>) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn from_address(mut self, from_address: ContractAddress) -> Self {
        self.from_address = Some(from_address);
        self
    }

    fn matches(&self, name: Option<&str>, event: &OrderedEvent) -> bool {
        name == Some(self.name.as_str())
            && self.data.as_ref().is_none_or(|data| *data == event.data)
            && self
                .from_address
                .is_none_or(|from_address| from_address == event.from_address)
    }
}

impl fmt::Display for ExpectedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(data) = &self.data {
            write!(f, " data=[{}]", data.iter().join(", "))?;
        }
        if let Some(from_address) = &self.from_address {
            write!(f, " from_address={from_address}")?;
        }
        Ok(())
    }
}

/// Verifies the expectations registered while producing `outcome`.
///
/// Returns `Ok(None)` when the invocation reverted as expected. Expectations
/// are consumed, so they never leak into the next invocation.
pub fn verify_expectations(
    state: &mut ExecutionState,
    outcome: std::result::Result<CallInfo, VmError>,
) -> std::result::Result<Option<CallInfo>, VmError> {
    let expected_revert = state.expected_revert.take();
    let expected_events = std::mem::take(&mut state.expected_events);

    match (outcome, expected_revert) {
        (Err(VmError::Revert(revert)), Some(expected)) => {
            if expected.matches(&revert) {
                Ok(None)
            } else {
                Err(CheatcodeError::new(
                    CheatcodeErrorKind::ExpectedRevertMismatch,
                    format!("Expected revert matching {expected}, got:\n{revert}"),
                )
                .into())
            }
        }
        (Err(error), _) => Err(error),
        (Ok(_), Some(expected)) => Err(CheatcodeError::new(
            CheatcodeErrorKind::ExpectedRevert,
            format!("Expected revert matching {expected}, but the call succeeded"),
        )
        .into()),
        (Ok(call_info), None) => {
            verify_events(state, &call_info, &expected_events)?;
            Ok(Some(call_info))
        }
    }
}

fn verify_events(
    state: &ExecutionState,
    call_info: &CallInfo,
    expected_events: &[ExpectedEvent],
) -> std::result::Result<(), CheatcodeError> {
    let emitted = call_info.ordered_events();
    let mut emitted = emitted.iter().map(|event| {
        let name = event
            .keys
            .first()
            .and_then(|selector| state.event_name(Selector(*selector)));
        (name, *event)
    });

    let missing: Vec<_> = expected_events
        .iter()
        .skip_while(|expected| {
            emitted
                .by_ref()
                .any(|(name, event)| expected.matches(name, event))
        })
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    Err(CheatcodeError::new(
        CheatcodeErrorKind::ExpectedEventsMissing,
        format!(
            "Expected events were not emitted in order:\n{}",
            missing.iter().map(|event| format!("  - {event}")).join("\n")
        ),
    ))
}

#[derive(Debug)]
pub struct ExpectRevertCheatcode;

impl Cheatcode for ExpectRevertCheatcode {
    fn name(&self) -> &'static str {
        "expect_revert"
    }

    fn apply(&self, state: &mut ExecutionState, args: &CheatArgs) -> Result {
        ensure!(
            state.expected_revert.is_none(),
            "A revert is already expected in this test case."
        );
        state.expected_revert = Some(ExpectedRevert {
            error_type: args.opt_str(0, "error_type")?.map(str::to_string),
            error_message: args.opt_str(1, "error_message")?.map(str::to_string),
        });
        Ok(CheatValue::None)
    }
}

#[derive(Debug)]
pub struct ExpectEventsCheatcode;

impl Cheatcode for ExpectEventsCheatcode {
    fn name(&self) -> &'static str {
        "expect_events"
    }

    fn apply(&self, state: &mut ExecutionState, args: &CheatArgs) -> Result {
        for value in args.positional() {
            let event = match value {
                CheatValue::Event(event) => event.clone(),
                CheatValue::Str(name) => ExpectedEvent::named(name.as_str()),
                other => bail!("Expected an event or an event name, got {other:?}."),
            };
            state.expected_events.push(event);
        }
        Ok(CheatValue::None)
    }
}
