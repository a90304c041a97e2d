use crate::Database;
use crate::models::{AnimationRow, BackgroundRow, ModelRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, email: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password) VALUES (?1, ?2, ?3)",
                (id, email, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Delete a user. Owned models, animations and backgrounds are removed
    /// by the schema's ON DELETE CASCADE. On-disk files are NOT touched.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    // -- Models --

    pub fn insert_model(
        &self,
        id: &str,
        name: &str,
        vrm_path: &str,
        user_id: &str,
    ) -> Result<ModelRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO vrm_models (id, name, vrm_path, user_id) VALUES (?1, ?2, ?3, ?4)",
                (id, name, vrm_path, user_id),
            )?;
            // Re-read so the caller sees the server-assigned timestamp
            query_model(conn, id)
        })
    }

    pub fn list_models_for_user(&self, user_id: &str) -> Result<Vec<ModelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, vrm_path, created_at, user_id
                 FROM vrm_models
                 WHERE user_id = ?1
                 ORDER BY created_at, id",
            )?;
            let rows = stmt
                .query_map([user_id], map_model_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Animations --

    pub fn insert_animation(
        &self,
        id: &str,
        anim_name: &str,
        vrma_path: &str,
        user_id: &str,
        model_id: &str,
    ) -> Result<AnimationRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO vrm_animations (id, anim_name, vrma_path, user_id, model_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, anim_name, vrma_path, user_id, model_id),
            )?;
            query_animation(conn, id)
        })
    }

    /// Batch-fetch animations for a set of model IDs.
    pub fn list_animations_for_models(&self, model_ids: &[String]) -> Result<Vec<AnimationRow>> {
        if model_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=model_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, anim_name, vrma_path, created_at, user_id, model_id
                 FROM vrm_animations
                 WHERE model_id IN ({})
                 ORDER BY created_at, id",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = model_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), map_animation_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Backgrounds --

    pub fn insert_background(
        &self,
        id: &str,
        filename: &str,
        path: &str,
        user_id: &str,
    ) -> Result<BackgroundRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO backgrounds (id, filename, path, user_id) VALUES (?1, ?2, ?3, ?4)",
                (id, filename, path, user_id),
            )?;
            query_background(conn, id)
        })
    }

    pub fn list_backgrounds_for_user(&self, user_id: &str) -> Result<Vec<BackgroundRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, filename, path, created_at, user_id
                 FROM backgrounds
                 WHERE user_id = ?1
                 ORDER BY created_at, id",
            )?;
            let rows = stmt
                .query_map([user_id], map_background_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_background(&self, id: &str) -> Result<Option<BackgroundRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, filename, path, created_at, user_id
                 FROM backgrounds WHERE id = ?1",
            )?;
            let row = stmt.query_row([id], map_background_row).optional()?;
            Ok(row)
        })
    }

    /// Remove a background row. Returns false when the id is unknown.
    pub fn delete_background_row(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM backgrounds WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is a compile-time constant ("email" or "id"), never user input
    let sql = format!(
        "SELECT id, email, password, is_active, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                is_active: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_model(conn: &Connection, id: &str) -> Result<ModelRow> {
    let mut stmt = conn.prepare(
        "SELECT id, name, vrm_path, created_at, user_id FROM vrm_models WHERE id = ?1",
    )?;
    Ok(stmt.query_row([id], map_model_row)?)
}

fn query_animation(conn: &Connection, id: &str) -> Result<AnimationRow> {
    let mut stmt = conn.prepare(
        "SELECT id, anim_name, vrma_path, created_at, user_id, model_id
         FROM vrm_animations WHERE id = ?1",
    )?;
    Ok(stmt.query_row([id], map_animation_row)?)
}

fn query_background(conn: &Connection, id: &str) -> Result<BackgroundRow> {
    let mut stmt = conn.prepare(
        "SELECT id, filename, path, created_at, user_id FROM backgrounds WHERE id = ?1",
    )?;
    Ok(stmt.query_row([id], map_background_row)?)
}

fn map_model_row(row: &rusqlite::Row<'_>) -> std::result::Result<ModelRow, rusqlite::Error> {
    Ok(ModelRow {
        id: row.get(0)?,
        name: row.get(1)?,
        vrm_path: row.get(2)?,
        created_at: row.get(3)?,
        user_id: row.get(4)?,
    })
}

fn map_animation_row(
    row: &rusqlite::Row<'_>,
) -> std::result::Result<AnimationRow, rusqlite::Error> {
    Ok(AnimationRow {
        id: row.get(0)?,
        anim_name: row.get(1)?,
        vrma_path: row.get(2)?,
        created_at: row.get(3)?,
        user_id: row.get(4)?,
        model_id: row.get(5)?,
    })
}

fn map_background_row(
    row: &rusqlite::Row<'_>,
) -> std::result::Result<BackgroundRow, rusqlite::Error> {
    Ok(BackgroundRow {
        id: row.get(0)?,
        filename: row.get(1)?,
        path: row.get(2)?,
        created_at: row.get(3)?,
        user_id: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
