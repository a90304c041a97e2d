use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            is_active   INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS vrm_models (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            vrm_path    TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_vrm_models_user
            ON vrm_models(user_id, created_at);

        CREATE TABLE IF NOT EXISTS vrm_animations (
            id          TEXT PRIMARY KEY,
            anim_name   TEXT NOT NULL,
            vrma_path   TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            model_id    TEXT REFERENCES vrm_models(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_vrm_animations_model
            ON vrm_animations(model_id);

        CREATE TABLE IF NOT EXISTS backgrounds (
            id          TEXT PRIMARY KEY,
            filename    TEXT NOT NULL,
            path        TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_backgrounds_user
            ON backgrounds(user_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
