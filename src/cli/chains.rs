//! Chains command

use tracing::warn;

use crate::domain::chain::ChainSource;

/// List chain definitions with their validation status
pub async fn run(config_dir: &str) -> anyhow::Result<()> {
    let (_, state) = super::bootstrap(config_dir).await?;
    let mut entries = Vec::new();

    for name in state.chain_source.list().await? {
        let entry = match state.chain_source.load(&name).await {
            Ok(chain) => {
                let problems = chain.validate().err().unwrap_or_default();
                serde_json::json!({
                    "name": name,
                    "version": chain.version,
                    "steps": chain.steps.len(),
                    "problems": problems,
                })
            }
            Err(e) => {
                warn!(chain = %name, error = %e, "Failed to load chain");
                serde_json::json!({ "name": name, "problems": [e.to_string()] })
            }
        };
        entries.push(entry);
    }

    super::print_json(&entries)
}
