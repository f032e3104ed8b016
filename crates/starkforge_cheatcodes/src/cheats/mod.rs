//! Built-in cheatcodes.

use std::sync::Arc;

use crate::Cheatcode;

mod declare;
mod deploy;
mod env;
mod expect;
mod fuzz;
mod mock;
mod storage;

pub use expect::{ExpectedEvent, ExpectedRevert, verify_expectations};

pub(crate) fn builtin() -> Vec<Arc<dyn Cheatcode>> {
    vec![
        Arc::new(declare::DeclareCheatcode),
        Arc::new(deploy::PrepareCheatcode),
        Arc::new(deploy::DeployCheatcode),
        Arc::new(deploy::DeployContractCheatcode),
        Arc::new(env::PrankCheatcode),
        Arc::new(env::WarpCheatcode),
        Arc::new(env::RollCheatcode),
        Arc::new(mock::MockCallCheatcode),
        Arc::new(mock::ClearMockCallCheatcode),
        Arc::new(storage::LoadCheatcode),
        Arc::new(storage::StoreCheatcode),
        Arc::new(expect::ExpectRevertCheatcode),
        Arc::new(expect::ExpectEventsCheatcode),
        Arc::new(fuzz::AssumeCheatcode),
        Arc::new(fuzz::RejectCheatcode),
        Arc::new(fuzz::GivenCheatcode),
    ]
}
