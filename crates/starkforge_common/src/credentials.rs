//! Account credentials used to sign transactions sent to a network.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::{address::ContractAddress, felt::Felt};

/// Environment variable holding the hex-encoded account private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "STARKFORGE_ACCOUNT_PRIVATE_KEY";

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("Invalid private key format ({0}). Please provide hex-encoded number.")]
    InvalidPrivateKey(String),
    #[error("Invalid account address format ({0}). Please provide hex-encoded number.")]
    InvalidAccountAddress(String),
    #[error("failed to read private key file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An account address together with its private key.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningCredentials {
    pub account_address: ContractAddress,
    pub private_key: Felt,
}

impl fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("account_address", &self.account_address)
            .finish_non_exhaustive()
    }
}

/// Loads signing credentials for `account_address`.
///
/// The private key is read from `private_key_path` when given, and from
/// [`PRIVATE_KEY_ENV_VAR`] otherwise. A missing key only logs a warning and
/// yields `None`, since read-only commands do not need to sign.
pub fn load_signing_credentials(
    account_address: Option<&str>,
    private_key_path: Option<&Path>,
) -> Result<Option<SigningCredentials>, CredentialsError> {
    let file_contents = private_key_path
        .map(|path| {
            std::fs::read_to_string(path).map_err(|source| CredentialsError::Io {
                path: path.to_path_buf(),
                source,
            })
        })
        .transpose()?;
    let env_value = std::env::var(PRIVATE_KEY_ENV_VAR).ok();

    resolve_signing_credentials(account_address, file_contents, env_value)
}

fn resolve_signing_credentials(
    account_address: Option<&str>,
    file_contents: Option<String>,
    env_value: Option<String>,
) -> Result<Option<SigningCredentials>, CredentialsError> {
    let Some(account_address) = account_address else {
        return Ok(None);
    };

    let Some(raw_key) = file_contents.or(env_value) else {
        warn!(
            "Provide a private key for account {account_address} with the \
             {PRIVATE_KEY_ENV_VAR} environment variable or a key file to sign transactions."
        );
        return Ok(None);
    };

    let private_key = parse_hex(raw_key.trim())
        .ok_or_else(|| CredentialsError::InvalidPrivateKey(raw_key.trim().to_string()))?;
    let account_address = parse_hex(account_address)
        .map(ContractAddress)
        .ok_or_else(|| CredentialsError::InvalidAccountAddress(account_address.to_string()))?;

    Ok(Some(SigningCredentials {
        account_address,
        private_key,
    }))
}

fn parse_hex(value: &str) -> Option<Felt> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    Felt::from_str_radix(digits, 16).ok()
}
