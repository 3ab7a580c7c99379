use clap::ValueEnum;

mod config_cmd;
mod group;
mod quiz;

pub use config_cmd::ConfigCommand;
pub use group::GroupCommand;
pub use quiz::QuizCommand;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
