//! Pipeline settings commands.

use anyhow::Result;
use clap::Subcommand;

use crate::core::StateStore;
use crate::domain::PipelineSettings;

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Print the current settings
    Show,

    /// Change one setting (e.g. `set notify_recipient dana@example.com`)
    Set { key: String, value: String },
}

pub async fn execute(command: SettingsCommands) -> Result<()> {
    let store = StateStore::open_default().await?;
    match command {
        SettingsCommands::Show => {
            let settings = store.settings().await;
            print!("{}", serde_yaml::to_string(&settings)?);
        }
        SettingsCommands::Set { key, value } => {
            let shown = format!("{} = {}", key, value);
            match store
                .update_settings(move |s: &mut PipelineSettings| s.set(&key, &value))
                .await?
            {
                Ok(_) => println!("✅ {}", shown),
                Err(e) => {
                    anyhow::bail!("{} (known keys: {})", e, PipelineSettings::KEYS.join(", "))
                }
            }
        }
    }
    Ok(())
}
