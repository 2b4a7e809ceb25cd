use agora_types::{claim::Role, general::ValidEmail};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{Result as HashResult, SaltString, rand_core::OsRng},
};
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Executor, Pool};
use time::Date;
use tracing::debug;

use crate::{Batch, ChosenDB, Error, ListingParams, error::Result};

fn hash_password(password: &str) -> HashResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)?
        .to_string();
    Ok(password_hash)
}

fn verify_password(password: &str, password_hash: &str) -> HashResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)?;
    let res = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);
    if let Err(e) = res {
        debug!("Invalid password, error {e}");
    }
    Ok(res.is_ok())
}

fn is_valid_role(role: &str, _ctx: &()) -> garde::Result {
    role.parse::<Role>()
        .map_err(|e| garde::Error::new(e.to_string()))
        .map(|_| ())
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateUser {
    #[garde(length(min = 3, max = 150), pattern(r"^[\w.@+-]+$"))]
    pub username: String,
    #[garde(dive)]
    pub email: ValidEmail,
    #[garde(length(min = 8, max = 255))]
    pub password: Option<String>,
    #[garde(inner(inner(custom(is_valid_role))))]
    pub roles: Option<Vec<String>>,
    #[garde(skip)]
    pub date_of_birth: Option<Date>,
    #[garde(length(max = 500))]
    pub profile_photo: Option<String>,
}

/// Replaces all roles of a user
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct UpdateRoles {
    #[garde(length(min = 1))]
    pub roles: Vec<Role>,
}

/// Self registration form, new users always get member role
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct RegisterUser {
    #[garde(length(min = 3, max = 150), pattern(r"^[\w.@+-]+$"))]
    pub username: String,
    #[garde(dive)]
    pub email: ValidEmail,
    #[garde(length(min = 8, max = 255))]
    pub password: String,
    #[garde(matches(password))]
    pub password2: String,
}

impl From<RegisterUser> for CreateUser {
    fn from(value: RegisterUser) -> Self {
        CreateUser {
            username: value.username,
            email: value.email,
            password: Some(value.password),
            roles: Some(vec![Role::Member.to_string()]),
            date_of_birth: None,
            profile_photo: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
pub struct UpdateProfile {
    #[garde(dive)]
    pub email: Option<ValidEmail>,
    #[garde(skip)]
    pub date_of_birth: Option<Date>,
    #[garde(length(max = 500))]
    pub profile_photo: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserInt {
    id: i64,
    username: String,
    email: String,
    roles: Option<String>,
    date_of_birth: Option<Date>,
    profile_photo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub roles: Vec<Role>,
    pub date_of_birth: Option<Date>,
    pub profile_photo: Option<String>,
}

impl From<UserInt> for User {
    fn from(value: UserInt) -> Self {
        Self {
            id: value.id,
            username: value.username,
            email: value.email,
            roles: value
                .roles
                .map(|s| s.split(',').filter_map(|r| r.parse().ok()).collect())
                .unwrap_or_default(),
            date_of_birth: value.date_of_birth,
            profile_photo: value.profile_photo,
        }
    }
}

/// Public view of another user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserShort {
    pub id: i64,
    pub username: String,
}

const USER_COLUMNS: &str = "id, username, email, roles, date_of_birth, profile_photo";

pub(crate) async fn get_user<'c, E>(executor: E, id: i64) -> Result<User>
where
    E: Executor<'c, Database = ChosenDB>,
{
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
    sqlx::query_as::<_, UserInt>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .map(User::from)
        .ok_or_else(|| Error::RecordNotFound("User".to_string()))
}

pub type UserRepository = UserRepositoryImpl<Pool<ChosenDB>>;

pub struct UserRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> UserRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Creates user together with its profile
    pub async fn create(&self, payload: CreateUser) -> Result<User> {
        let password = payload.password.map(|p| hash_password(&p)).transpose()?;
        let roles = payload.roles.map(|roles| {
            roles
                .iter()
                .filter_map(|r| r.parse::<Role>().ok())
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(",")
        });

        let mut tx = self.executor.begin().await?;
        let result = sqlx::query(
            "INSERT INTO users (username, email, password, roles, date_of_birth, profile_photo) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&payload.username)
        .bind(payload.email.as_ref())
        .bind(password)
        .bind(roles)
        .bind(payload.date_of_birth)
        .bind(&payload.profile_photo)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::from(e).on_conflict("A user with that username already exists"))?;

        let id = result.last_insert_rowid();
        sqlx::query("INSERT INTO user_profile (user_id) VALUES (?)")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!("Created user {id} {}", payload.username);

        self.get(id).await
    }

    pub async fn list(&self, params: ListingParams) -> Result<Batch<User>> {
        let order = params.ordering(&[("id", "id"), ("username", "username")], "id")?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users{order} LIMIT ? OFFSET ?");
        let users = sqlx::query_as::<_, UserInt>(&sql)
            .bind(params.limit)
            .bind(params.offset)
            .fetch_all(&self.executor)
            .await?
            .into_iter()
            .map(User::from)
            .collect();
        let total: i64 = sqlx::query_scalar("SELECT count(*) FROM users")
            .fetch_one(&self.executor)
            .await?;
        Ok(Batch::new(&params, users, total))
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::RecordNotFound("User".to_string()))
        } else {
            Ok(())
        }
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        get_user(&self.executor, id).await
    }

    pub async fn check_password(&self, username: &str, password: &str) -> Result<User> {
        let (id, hashed_password): (i64, Option<String>) =
            sqlx::query_as("SELECT id, password FROM users WHERE username = ?")
                .bind(username)
                .fetch_one(&self.executor)
                .await
                .map_err(|e| {
                    debug!("User check error: {e}");
                    Error::InvalidCredentials
                })?;
        if let Some(hashed_password) = hashed_password {
            if verify_password(password, &hashed_password).unwrap_or(false) {
                return self.get(id).await;
            }
        }
        Err(Error::InvalidCredentials)
    }

    pub async fn update_profile(&self, id: i64, payload: UpdateProfile) -> Result<User> {
        let current = self.get(id).await?;
        let email = payload
            .email
            .map(String::from)
            .unwrap_or(current.email);
        let date_of_birth = payload.date_of_birth.or(current.date_of_birth);
        let profile_photo = payload.profile_photo.or(current.profile_photo);
        sqlx::query("UPDATE users SET email = ?, date_of_birth = ?, profile_photo = ? WHERE id = ?")
            .bind(email)
            .bind(date_of_birth)
            .bind(profile_photo)
            .bind(id)
            .execute(&self.executor)
            .await?;
        self.get(id).await
    }

    pub async fn set_roles(&self, id: i64, roles: &[Role]) -> Result<User> {
        let roles = roles
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let res = sqlx::query("UPDATE users SET roles = ? WHERE id = ?")
            .bind(roles)
            .bind(id)
            .execute(&self.executor)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::RecordNotFound("User".to_string()));
        }
        self.get(id).await
    }
}
