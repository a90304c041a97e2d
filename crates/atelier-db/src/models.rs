/// Database row types — these map directly to SQLite rows.
/// Distinct from atelier-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub is_active: bool,
    pub created_at: String,
}

pub struct ModelRow {
    pub id: String,
    pub name: String,
    pub vrm_path: String,
    pub created_at: String,
    pub user_id: String,
}

pub struct AnimationRow {
    pub id: String,
    pub anim_name: String,
    pub vrma_path: String,
    pub created_at: String,
    pub user_id: String,
    pub model_id: Option<String>,
}

pub struct BackgroundRow {
    pub id: String,
    pub filename: String,
    pub path: String,
    pub created_at: String,
    pub user_id: String,
}
