use crate::config::CliConfig;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use std::path::Path;
use wagertoe_core::Result;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show saved settings
    Show,
    /// Change a saved setting
    Set {
        /// rpc_url, contract_address, poll_interval_secs, confirmations or journal
        key: String,
        value: String,
    },
}

pub async fn handle_config_command(cmd: ConfigCommands, data_dir: &Path) -> Result<()> {
    let mut config = CliConfig::load(data_dir).await?;

    match cmd {
        ConfigCommands::Show => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Setting", "Value"]);
            table.add_row(vec!["rpc_url".to_string(), config.rpc_url.clone()]);
            table.add_row(vec![
                "contract_address".to_string(),
                config.contract_address.clone(),
            ]);
            table.add_row(vec![
                "poll_interval_secs".to_string(),
                config.poll_interval_secs.to_string(),
            ]);
            table.add_row(vec![
                "confirmations".to_string(),
                config.confirmations.to_string(),
            ]);
            table.add_row(vec!["journal".to_string(), config.journal.to_string()]);

            println!("{}", table);
            println!("Stored in {}", CliConfig::path(data_dir).display());
        }

        ConfigCommands::Set { key, value } => {
            config.set(&key, &value)?;
            config.save(data_dir).await?;
            println!("Set {} = {}", key, value);
        }
    }

    Ok(())
}
