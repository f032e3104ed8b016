use std::fmt;

use crate::vm::VmError;

/// Cheatcode result type.
///
/// Type alias with a default Ok type of [`CheatValue`](crate::CheatValue), and
/// default Err type of [`VmError`].
pub type Result<T = crate::CheatValue, E = VmError> = std::result::Result<T, E>;

macro_rules! fmt_err {
    ($msg:literal $(,)?) => {
        $crate::VmError::Cheatcode($crate::CheatcodeError::custom(::std::format!($msg)))
    };
    ($err:expr $(,)?) => {
        <$crate::VmError as ::std::convert::From<_>>::from($err)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::VmError::Cheatcode($crate::CheatcodeError::custom(::std::format!($fmt, $($arg)*)))
    };
}

macro_rules! bail {
    ($msg:literal $(,)?) => {
        return ::std::result::Result::Err(fmt_err!($msg))
    };
    ($err:expr $(,)?) => {
        return ::std::result::Result::Err(fmt_err!($err))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return ::std::result::Result::Err(fmt_err!($fmt, $($arg)*))
    };
}

macro_rules! ensure {
    ($cond:expr $(,)?) => {
        if !$cond {
            return ::std::result::Result::Err(fmt_err!(
                $crate::CheatcodeError::custom(
                    ::std::concat!("Condition failed: `", ::std::stringify!($cond), "`")
                )
            ));
        }
    };
    ($cond:expr, $msg:literal $(,)?) => {
        if !$cond {
            return ::std::result::Result::Err(fmt_err!($msg));
        }
    };
    ($cond:expr, $err:expr $(,)?) => {
        if !$cond {
            return ::std::result::Result::Err(fmt_err!($err));
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !$cond {
            return ::std::result::Result::Err(fmt_err!($fmt, $($arg)*));
        }
    };
}

/// Classification of a [`CheatcodeError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheatcodeErrorKind {
    /// Invalid arguments or an operation the state does not allow.
    Usage,
    /// Too many positional arguments were passed.
    KeywordOnlyArgument,
    /// No cheatcode is registered under the requested name.
    UnknownCheatcode,
    /// A revert was expected but the invocation succeeded.
    ExpectedRevert,
    /// The invocation reverted differently than expected.
    ExpectedRevertMismatch,
    /// Expected events were not emitted.
    ExpectedEventsMissing,
}

/// Error thrown by cheatcodes and by the verification of expectations they
/// registered.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub struct CheatcodeError {
    cheatcode: Option<String>,
    kind: CheatcodeErrorKind,
    message: String,
}

impl CheatcodeError {
    pub fn custom(message: impl Into<String>) -> Self {
        Self::new(CheatcodeErrorKind::Usage, message)
    }

    pub fn new(kind: CheatcodeErrorKind, message: impl Into<String>) -> Self {
        Self {
            cheatcode: None,
            kind,
            message: message.into(),
        }
    }

    /// Attributes the error to `cheatcode`, unless it already names one.
    pub fn with_cheatcode(mut self, cheatcode: &str) -> Self {
        self.cheatcode.get_or_insert_with(|| cheatcode.to_string());
        self
    }

    pub fn cheatcode(&self) -> Option<&str> {
        self.cheatcode.as_deref()
    }

    pub fn kind(&self) -> CheatcodeErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CheatcodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cheatcode {
            Some(cheatcode) => write!(
                f,
                "Incorrect usage of `{cheatcode}` cheatcode\n{}",
                self.message
            ),
            None => f.write_str(&self.message),
        }
    }
}
