use rusqlite::Row;

#[derive(Debug, Clone)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Post {
    /// Expects columns: id, user_id, body, created_at, updated_at
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            body: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub user_id: String,
    pub body: String,
    pub created_at: String,
}

impl Comment {
    /// Expects columns: id, post_id, user_id, body, created_at
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            post_id: row.get(1)?,
            user_id: row.get(2)?,
            body: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub scheduled_at: String,
    pub created_at: String,
}

impl Event {
    /// Expects columns: id, user_id, title, body, scheduled_at, created_at
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            body: row.get(3)?,
            scheduled_at: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}
