use chrono::{TimeZone, Utc};
use clap::{Args, Subcommand};

use super::OutputFormat;
use quizdeck::access::GroupRepository;
use quizdeck::config::Config;
use quizdeck_core::{Group, GroupDoc};

#[derive(Args)]
pub struct GroupCommand {
    #[command(subcommand)]
    pub command: GroupSubcommand,
}

#[derive(Subcommand)]
pub enum GroupSubcommand {
    /// Create a new group owned by the configured uid
    Create {
        /// Name of the group
        name: String,

        /// Group description
        #[arg(long)]
        description: Option<String>,
    },

    /// Join a group as the configured uid
    Join { gid: String },

    /// Leave a group as the configured uid
    Leave { gid: String },

    /// Show a group with its member count and owner
    Show {
        gid: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show one user's membership in a group
    Member {
        gid: String,

        /// Member uid (defaults to the configured uid)
        #[arg(long)]
        uid: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Count the groups a user belongs to
    Count {
        /// Member uid (defaults to the configured uid)
        #[arg(long)]
        uid: Option<String>,
    },
}

fn format_millis(millis: i64) -> String {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(at) => at.format("%Y-%m-%d %H:%M").to_string(),
        None => millis.to_string(),
    }
}

/// Heading rule as wide as `title` in characters.
fn underline(title: &str) -> String {
    "=".repeat(title.chars().count())
}

fn print_group(group: &Group) {
    println!("{}", group.doc.name);
    println!("{}", underline(&group.doc.name));
    println!("ID: {}", group.doc.gid);
    println!("Created: {}", format_millis(group.doc.created_at));
    match &group.owner_data {
        Some(owner) => {
            let name = owner.display_name.as_deref().unwrap_or(&owner.uid);
            println!("Owner: {} ({})", name, owner.uid);
        }
        None => println!("Owner: {} (no profile)", group.doc.owner_id),
    }
    println!("Members: {}", group.member_count);

    if !group.doc.description.is_empty() {
        println!("\n{}", group.doc.description);
    }
}

impl GroupCommand {
    pub async fn run(
        &self,
        repo: &GroupRepository,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            GroupSubcommand::Create { name, description } => {
                if name.trim().is_empty() {
                    return Err("Group name cannot be empty".into());
                }

                let mut group = GroupDoc::new(name.trim(), &config.uid.value);
                if let Some(description) = description {
                    group = group.with_description(description);
                }

                repo.create_group(&group).await?;
                println!("Created group {} ({})", group.name, group.gid);
                Ok(())
            }

            GroupSubcommand::Join { gid } => {
                // Fails early on unknown groups
                let group = repo.get_group_data(gid).await?;
                repo.add_member(gid, &config.uid.value).await?;
                println!("Joined group: {}", group.doc.name);
                Ok(())
            }

            GroupSubcommand::Leave { gid } => {
                if repo.remove_member(gid, &config.uid.value).await? {
                    println!("Left group: {}", gid);
                    Ok(())
                } else {
                    Err(format!("Not a member of group: {}", gid).into())
                }
            }

            GroupSubcommand::Show { gid, format } => {
                let group = repo.get_group_data(gid).await?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&group)?);
                    }
                    OutputFormat::Text => print_group(&group),
                }
                Ok(())
            }

            GroupSubcommand::Member { gid, uid, format } => {
                let uid = uid.as_deref().unwrap_or(&config.uid.value);
                let member = repo
                    .get_group_member_data(gid, uid)
                    .await?
                    .ok_or_else(|| format!("{} is not a member of {}", uid, gid))?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&member)?);
                    }
                    OutputFormat::Text => {
                        println!(
                            "{} joined {} on {}",
                            member.uid,
                            member.gid,
                            format_millis(member.joined_at)
                        );
                    }
                }
                Ok(())
            }

            GroupSubcommand::Count { uid } => {
                let uid = uid.as_deref().unwrap_or(&config.uid.value);
                let total = repo.get_total_groups(uid).await?;
                println!("{}", total);
                Ok(())
            }
        }
    }
}
