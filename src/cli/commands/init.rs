//! Implementation of the `defier init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::adapters::sqlite::initialize_database;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, DatabaseConfig};
use crate::infrastructure::config::CONFIG_DIR;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force reinitialization even if already initialized
    #[arg(long, short)]
    pub force: bool,

    /// Course name written into the new configuration
    #[arg(long)]
    pub course: Option<String>,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub config_written: bool,
    pub database_initialized: bool,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.config_written {
            lines.push(format!("\nConfiguration written to {CONFIG_DIR}/config.yaml"));
        }
        if self.database_initialized {
            lines.push(format!("Database initialized at {CONFIG_DIR}/defier.db"));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let defier_dir = target_path.join(CONFIG_DIR);

    if defier_dir.exists() && !args.force {
        let output_data = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to reinitialize.".to_string(),
            initialized_path: target_path,
            config_written: false,
            database_initialized: false,
        };
        output(&output_data, json_mode);
        return Ok(());
    }

    if args.force && defier_dir.exists() {
        fs::remove_dir_all(&defier_dir)
            .await
            .with_context(|| format!("Failed to remove existing {CONFIG_DIR} directory"))?;
    }

    fs::create_dir_all(&defier_dir)
        .await
        .with_context(|| format!("Failed to create {}", defier_dir.display()))?;

    let mut config = Config::default();
    if let Some(course) = args.course {
        config.course.name = course;
    }
    write_config(&defier_dir, &config).await?;

    // The stored path stays relative; the database itself is created under the target.
    let database = DatabaseConfig {
        path: defier_dir.join("defier.db").display().to_string(),
        ..config.database.clone()
    };
    let pool = initialize_database(&database)
        .await
        .context("Failed to initialize database")?;
    pool.close().await;

    let output_data = InitOutput {
        success: true,
        message: if args.force {
            "Project reinitialized successfully.".to_string()
        } else {
            "Project initialized successfully.".to_string()
        },
        initialized_path: target_path,
        config_written: true,
        database_initialized: true,
    };
    output(&output_data, json_mode);
    Ok(())
}

async fn write_config(dir: &Path, config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    fs::write(dir.join("config.yaml"), yaml)
        .await
        .context("Failed to write config.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::ConfigLoader;

    #[tokio::test]
    async fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let args = InitArgs {
            force: false,
            course: Some("algebra".to_string()),
            path: dir.path().to_path_buf(),
        };
        execute(args, true).await.unwrap();

        let defier_dir = dir.path().join(CONFIG_DIR);
        assert!(defier_dir.join("defier.db").exists());

        let config = ConfigLoader::load_from_file(defier_dir.join("config.yaml")).unwrap();
        assert_eq!(config.course.name, "algebra");
        assert_eq!(config.database.path, ".defier/defier.db");
    }

    #[tokio::test]
    async fn test_init_keeps_existing_project_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let defier_dir = dir.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&defier_dir).unwrap();
        std::fs::write(defier_dir.join("marker"), "keep").unwrap();

        let args = InitArgs {
            force: false,
            course: None,
            path: dir.path().to_path_buf(),
        };
        execute(args, true).await.unwrap();
        assert!(defier_dir.join("marker").exists());
        assert!(!defier_dir.join("config.yaml").exists());
    }
}
