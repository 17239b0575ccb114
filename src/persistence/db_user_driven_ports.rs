use super::{Count, NewId};
use crate::domain;
use crate::domain::user::{CreateUser, TodoUser};
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error};
use sqlx::query_as;

pub struct DbDetectUser;

impl domain::user::driven_ports::DetectUser for DbDetectUser {
    async fn user_exists(
        &self,
        user_id: i32,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut connection = ext_cxn.database_cxn().await?;

        let user_with_id_count =
            query_as::<_, Count>("SELECT count(*) AS count FROM todo_user tu WHERE tu.id = $1")
                .bind(user_id)
                .fetch_one(connection.borrow_connection())
                .await
                .context("Detecting user with ID")?;

        Ok(user_with_id_count.count() > 0)
    }

    async fn user_with_email_exists(
        &self,
        email: &str,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut connection = ext_cxn.database_cxn().await?;

        let user_with_email_count =
            query_as::<_, Count>("SELECT count(*) AS count FROM todo_user tu WHERE tu.email = $1")
                .bind(email)
                .fetch_one(connection.borrow_connection())
                .await
                .context("Detecting user via email")?;

        Ok(user_with_email_count.count() > 0)
    }
}

pub struct DbReadUsers;

#[derive(sqlx::FromRow)]
struct TodoUserRow {
    id: i32,
    email: String,
    display_name: String,
}

impl From<TodoUserRow> for TodoUser {
    fn from(value: TodoUserRow) -> Self {
        TodoUser {
            id: value.id,
            email: value.email,
            display_name: value.display_name,
        }
    }
}

impl domain::user::driven_ports::UserReader for DbReadUsers {
    async fn get_all(&self, ext_cxn: &mut impl ExternalConnectivity) -> Result<Vec<TodoUser>, Error> {
        let mut connection = ext_cxn.database_cxn().await?;

        let users: Vec<TodoUser> = query_as::<_, TodoUserRow>(
            "SELECT tu.id, tu.email, tu.display_name FROM todo_user tu ORDER BY tu.id",
        )
        .fetch_all(connection.borrow_connection())
        .await
        .context("Fetching all users")?
        .into_iter()
        .map(TodoUser::from)
        .collect();

        Ok(users)
    }
}

pub struct DbWriteUsers;

impl domain::user::driven_ports::UserWriter for DbWriteUsers {
    async fn create_user(
        &self,
        user: &CreateUser,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<i32, Error> {
        let mut cxn_handle = ext_cxn.database_cxn().await?;

        let new_user = query_as::<_, NewId>(
            "INSERT INTO todo_user(email, display_name) VALUES ($1, $2) RETURNING todo_user.id",
        )
        .bind(&user.email)
        .bind(&user.display_name)
        .fetch_one(cxn_handle.borrow_connection())
        .await
        .context("Inserting new user")?;

        Ok(new_user.id)
    }
}
