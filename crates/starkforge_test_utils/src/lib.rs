//! Test doubles for the compiler and the VM: contracts are plain Rust
//! closures over a [`SyscallHandler`](starkforge_cheatcodes::SyscallHandler).

mod contract;
mod fixture;
mod vm;

pub use contract::{EntryPointFn, ScriptedContract, fail};
pub use fixture::ProjectFixture;
pub use vm::{ScriptedCompiler, ScriptedProject, ScriptedVm};

/// Installs a `tracing` subscriber configured from `RUST_LOG`.
pub fn init_tracing_for_tests() {
    let _ = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
