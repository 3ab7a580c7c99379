use clap::{Args, Subcommand};

use super::OutputFormat;
use quizdeck::config::Config;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("database_path: {}", config.database_path.value.display());
                        println!("  source: {}", config.database_path.source);
                        println!("port: {}", config.port.value);
                        println!("  source: {}", config.port.source);
                        println!("uid: {}", config.uid.value);
                        println!("  source: {}", config.uid.source);
                        println!();

                        match &config.ai.endpoint {
                            Some(endpoint) => {
                                println!("ai.endpoint: {}", endpoint);
                                println!(
                                    "ai.model: {}",
                                    config.ai.model.as_deref().unwrap_or("(provider default)")
                                );
                                let key = if config.ai.api_key.is_some() {
                                    "set"
                                } else {
                                    "not set"
                                };
                                println!("ai.api_key: {}", key);
                            }
                            None => println!("ai: disabled"),
                        }
                    }
                }
                Ok(())
            }
        }
    }
}
