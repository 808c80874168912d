use super::{run_in_scope, ConnectionArgs};
use crate::errors::{AppError, AppResult};
use crate::settings::Settings;
use clap::Args;
use tracing::{error, info};

#[derive(Args)]
pub struct PingCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl PingCommand {
    pub fn run(&self, settings: &Settings) -> AppResult<()> {
        info!("=== Testing Database Connection ===");

        let result = run_in_scope(&self.connection, settings.driver, |cursor| {
            cursor.execute("SELECT 1 AS ok", &[])?;
            cursor.fetch_one()
        });

        match result {
            Ok(Some(row)) if row.get("ok").and_then(|v| v.as_i64()) == Some(1) => {
                println!("Connection OK");
                Ok(())
            }
            Ok(_) => Err(AppError::InvalidData(
                "Connection test query returned an unexpected result".to_string(),
            )),
            Err(e) => {
                error!("Connection test failed: {}", e);
                Err(e)
            }
        }
    }
}
