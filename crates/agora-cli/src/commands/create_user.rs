use agora_dal::user::{CreateUser, UserRepository};
use agora_types::{claim::Role, config::BackendConfig, general::ValidEmail};
use clap::Args;
use garde::Validate as _;
use tracing::info;

use crate::commands::{open_database, Executor};

#[derive(Args, Debug)]
pub struct CreateUserCmd {
    #[command(flatten)]
    backend: BackendConfig,
    #[arg(short, long, help = "User name used to log in")]
    pub username: String,
    #[arg(short, long, help = "User email")]
    pub email: ValidEmail,
    #[arg(short, long, help = "User password")]
    pub password: String,
    #[arg(short, long, num_args=0..,
        value_delimiter = ',', help = "Roles of the user (admin, librarian, member), comma separated or used multiple times, member if none given")]
    pub roles: Vec<Role>,
}

impl CreateUserCmd {
    fn new_user(&self) -> CreateUser {
        let roles = if self.roles.is_empty() {
            vec![Role::Member]
        } else {
            self.roles.clone()
        };
        CreateUser {
            username: self.username.clone(),
            email: self.email.clone(),
            password: Some(self.password.clone()),
            roles: Some(roles.iter().map(|r| r.to_string()).collect()),
            date_of_birth: None,
            profile_photo: None,
        }
    }
}

impl Executor for CreateUserCmd {
    async fn run(self) -> anyhow::Result<()> {
        let new_user = self.new_user();
        new_user.validate()?;
        let pool = open_database(&self.backend).await?;
        let repository = UserRepository::new(pool);
        let user = repository.create(new_user).await?;
        info!("Created user {} with id {}", user.username, user.id);
        println!("{}", serde_json::to_string_pretty(&user)?);

        Ok(())
    }
}
