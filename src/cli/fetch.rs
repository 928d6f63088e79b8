use crate::core::ApiResponse;
use anyhow::{Context, Result, bail};

/// Pretty JSON for the aggregated response.
pub fn render(response: &ApiResponse) -> Result<String> {
    serde_json::to_string_pretty(response).context("Failed to serialize response")
}

/// Prints the response, then fails if the aggregation itself failed.
pub fn run(response: &ApiResponse) -> Result<()> {
    println!("{}", render(response)?);
    if !response.success {
        bail!(
            "Aggregation failed: {}",
            response.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
