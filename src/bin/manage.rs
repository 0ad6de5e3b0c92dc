use std::{error::Error, path::PathBuf};

use clap::{Parser, Subcommand};
use foodgram::{
    actions::{find_taken_credentials, load_forbidden_words, register_user, set_role},
    cache::cache::Cache,
    config::Config,
    cryptography::hash_password,
    error::ValidationErrors,
    form::Form,
    import::import_folder,
    schema::{UserRole, Uuid},
    validation::{self, EMAIL_TAKEN, USERNAME_TAKEN},
};
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "manage", about = "Foodgram management commands")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import ingredients.csv and tags.csv
    ImportCsv {
        /// Folder containing the CSV files, defaults to CSV_FOLDER
        #[arg(long)]
        folder: Option<PathBuf>,
    },
    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        password: String,
    },
    /// Change the role of an existing user
    SetRole {
        #[arg(long)]
        user: Uuid,
        #[arg(long, value_parser = parse_role)]
        role: UserRole,
    },
}

fn parse_role(value: &str) -> Result<UserRole, String> {
    UserRole::try_from(Value::from(value)).map_err(|e| e.info)
}

async fn create_admin(
    pool: &Pool<Postgres>,
    config: &Config,
    fields: Value,
) -> Result<(), Box<dyn Error>> {
    let form = Form::from_data(serde_json::from_value(fields)?);
    let words = load_forbidden_words(pool, &Cache::disabled(), config.obscenity_threshold).await?;

    let mut errors = ValidationErrors::new();
    let user = validation::registration(&form, &words, &mut errors);
    if let Some(user) = &user {
        let (email_taken, username_taken) =
            find_taken_credentials(pool, &user.email, &user.username).await?;
        if email_taken {
            errors.add("email", EMAIL_TAKEN);
        }
        if username_taken {
            errors.add("username", USERNAME_TAKEN);
        }
    }
    errors.into_result()?;

    let Some(mut user) = user else {
        return Err("invalid user".into());
    };
    user.password = hash_password(&user.password).map_err(|e| e.to_string())?;

    let user = register_user(pool, &user, UserRole::Admin).await?;
    log::info!("Created admin {} ({})", user.username, user.id);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = Config::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!().run(&pool).await?;

    match cli.command {
        Command::ImportCsv { folder } => {
            let folder = folder.unwrap_or_else(|| config.csv_folder.clone());
            let (ingredients, tags) = import_folder(&pool, &folder).await?;

            log::info!(
                "Imported {} ingredients ({} new) and {} tags ({} new) from {}",
                ingredients.read,
                ingredients.created,
                tags.read,
                tags.created,
                folder.display()
            );
        }
        Command::CreateAdmin {
            email,
            username,
            first_name,
            last_name,
            password,
        } => {
            let fields = json!({
                "email": email,
                "username": username,
                "first_name": first_name,
                "last_name": last_name,
                "password": password,
            });
            create_admin(&pool, &config, fields).await?;
        }
        Command::SetRole { user, role } => {
            set_role(&pool, user, role).await?;
            log::info!("User {user} is now {role:?}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_from_arguments() {
        assert_eq!(parse_role("admin").unwrap(), UserRole::Admin);
        assert_eq!(parse_role("user").unwrap(), UserRole::User);
        assert!(parse_role("owner").is_err());
    }

    #[test]
    fn set_role_arguments_parse() {
        let cli =
            Cli::try_parse_from(["manage", "set-role", "--user", "4", "--role", "user"]).unwrap();
        match cli.command {
            Command::SetRole { user, role } => {
                assert_eq!(user, 4);
                assert_eq!(role, UserRole::User);
            }
            _ => panic!("expected set-role"),
        }
    }
}
