use super::{run_in_scope, ConnectionArgs};
use crate::driver::Row;
use crate::errors::AppResult;
use crate::settings::Settings;
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

#[derive(Args)]
pub struct QueryCommand {
    /// SQL statement to execute
    pub sql: String,

    /// Positional parameter, parsed as JSON when possible (repeatable)
    #[arg(long = "param")]
    pub params: Vec<String>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// What a statement produced
#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum QueryOutput {
    Rows(Vec<Row>),
    Affected { affected_rows: u64 },
}

impl QueryCommand {
    pub fn run(&self, settings: &Settings) -> AppResult<()> {
        let output = self.execute(settings)?;
        let text = if self.pretty {
            serde_json::to_string_pretty(&output)?
        } else {
            serde_json::to_string(&output)?
        };
        println!("{}", text);
        Ok(())
    }

    pub fn execute(&self, settings: &Settings) -> AppResult<QueryOutput> {
        let params: Vec<Value> = self.params.iter().map(|raw| parse_param(raw)).collect();
        info!("Executing statement with {} parameters", params.len());

        run_in_scope(&self.connection, settings.driver, |cursor| {
            let affected = cursor.execute(&self.sql, &params)?;
            match cursor.fetch_all() {
                Ok(rows) => Ok(QueryOutput::Rows(rows)),
                Err(crate::errors::DriverError::NoResultSet) => Ok(QueryOutput::Affected {
                    affected_rows: affected,
                }),
                Err(e) => Err(e),
            }
        })
    }
}

/// `--param 5` binds a number, `--param abc` a string, `--param null` NULL
fn parse_param(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
