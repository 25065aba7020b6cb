use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::calc;

/// One persisted rating record, decoded from its row.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingRecord {
    pub teacher_index: i64,
    pub ratings: Vec<i64>,
    pub rating_count: i64,
    pub average_rating: f64,
}

/// Result of applying one submission inside its transaction.
#[derive(Debug)]
pub enum ApplyOutcome {
    Applied(RatingRecord),
    AlreadyRated,
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("rateboard.sqlite3");
    let conn = Connection::open(db_path)?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> anyhow::Result<()> {
    // One row per teacher index; the sequence is a JSON array in TEXT and
    // only ever grows. rating_count is maintained alongside it, not derived
    // at read time.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_ratings(
            teacher_index INTEGER PRIMARY KEY,
            ratings TEXT NOT NULL,
            rating_count INTEGER NOT NULL,
            average_rating REAL NOT NULL
        )",
        [],
    )?;

    // Accepted (identity, teacher) pairs backing the duplicate check.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS rating_submissions(
            user_id TEXT NOT NULL,
            teacher_index INTEGER NOT NULL,
            created_at TEXT,
            PRIMARY KEY(user_id, teacher_index)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_rating_submissions_teacher
         ON rating_submissions(teacher_index)",
        [],
    )?;

    Ok(())
}

pub fn fetch_all(conn: &Connection) -> anyhow::Result<Vec<RatingRecord>> {
    let mut stmt = conn.prepare(
        "SELECT teacher_index, ratings, rating_count, average_rating
         FROM teacher_ratings
         ORDER BY teacher_index",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, f64>(3)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (teacher_index, ratings_text, rating_count, average_rating) = row?;
        records.push(RatingRecord {
            teacher_index,
            ratings: serde_json::from_str(&ratings_text)?,
            rating_count,
            average_rating,
        });
    }
    Ok(records)
}

pub fn has_submission(conn: &Connection, user_id: &str, teacher_index: i64) -> anyhow::Result<bool> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM rating_submissions WHERE user_id = ? AND teacher_index = ?",
            params![user_id, teacher_index],
            |r| r.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

/// Append one accepted rating: the sequence, the maintained count, the
/// recomputed average, and the ledger row are written in ONE transaction so
/// no reader ever sees an appended sequence with a stale average and
/// concurrent appends cannot lose updates.
pub fn apply_rating(
    conn: &Connection,
    teacher_index: i64,
    rating: i64,
    user_id: &str,
) -> anyhow::Result<ApplyOutcome> {
    let tx = conn.unchecked_transaction()?;

    let hit: Option<i64> = tx
        .query_row(
            "SELECT 1 FROM rating_submissions WHERE user_id = ? AND teacher_index = ?",
            params![user_id, teacher_index],
            |r| r.get(0),
        )
        .optional()?;
    if hit.is_some() {
        return Ok(ApplyOutcome::AlreadyRated);
    }

    let mut ratings: Vec<i64> = match tx
        .query_row(
            "SELECT ratings FROM teacher_ratings WHERE teacher_index = ?",
            [teacher_index],
            |r| r.get::<_, String>(0),
        )
        .optional()?
    {
        Some(text) => serde_json::from_str(&text)?,
        None => Vec::new(),
    };
    ratings.push(rating);
    let rating_count = ratings.len() as i64;
    let average_rating = calc::rating_average(&ratings).unwrap_or(0.0);

    tx.execute(
        "INSERT INTO teacher_ratings(teacher_index, ratings, rating_count, average_rating)
         VALUES(?1, ?2, ?3, ?4)
         ON CONFLICT(teacher_index) DO UPDATE SET
             ratings = excluded.ratings,
             rating_count = excluded.rating_count,
             average_rating = excluded.average_rating",
        params![
            teacher_index,
            serde_json::to_string(&ratings)?,
            rating_count,
            average_rating
        ],
    )?;
    tx.execute(
        "INSERT INTO rating_submissions(user_id, teacher_index, created_at) VALUES(?1, ?2, ?3)",
        params![user_id, teacher_index, Utc::now().to_rfc3339()],
    )?;
    tx.commit()?;

    Ok(ApplyOutcome::Applied(RatingRecord {
        teacher_index,
        ratings,
        rating_count,
        average_rating,
    }))
}

/// Delete every rating record and ledger row unconditionally. Irreversible.
pub fn reset_all(conn: &Connection) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM teacher_ratings", [])?;
    tx.execute("DELETE FROM rating_submissions", [])?;
    tx.commit()?;
    Ok(())
}
