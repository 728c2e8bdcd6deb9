//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `entitydb_core` linkage.
//! - Run one create through the coordinator against an in-memory database.

use entitydb_core::db::open_db_in_memory;
use entitydb_core::{
    AccountAttributes, AccountKind, PersistenceConfig, PersistenceCoordinator, SqliteStore,
};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("entitydb_core ping={}", entitydb_core::ping());
    println!("entitydb_core version={}", entitydb_core::core_version());

    match run_probe() {
        Ok(visible) => {
            println!("entitydb_core demo_account_visible={visible}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("entitydb_core probe failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_probe() -> Result<bool, Box<dyn Error>> {
    let config = PersistenceConfig::from_env()?;
    let conn = open_db_in_memory()?;
    let store = SqliteStore::try_new(&conn)?;
    let coordinator = PersistenceCoordinator::new(AccountKind, store, &config);

    let demo = AccountAttributes::new(
        "demo.user",
        "Demo User",
        "demo@example.com",
        "Demo Institute",
    );
    coordinator.create_entity(&demo)?;
    Ok(coordinator.has_entity(&demo)?)
}
