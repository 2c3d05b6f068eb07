//! `pagesmith search` — run one query through the orchestrator from the CLI.
//!
//! Prints the same status code and JSON body the HTTP endpoint would return.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::server::{build_orchestrator, outcome_response};

pub async fn run_search(config: &Config, query: &str) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;

    match orchestrator.search(query).await {
        Ok(outcome) => {
            let (status, body) = outcome_response(&outcome);
            println!("{}", status.as_u16());
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Err(e) if e.is_client_error() => bail!("{}", e),
        Err(e) => bail!("search failed: {}", e),
    }
}
