use chrono::{DateTime, Local};
use itertools::Itertools;
use rusqlite::{params, Connection, Result};
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::pacing::Difficulty;

/// One finished session, as recorded for the results screen and analytics.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub finished_at: DateTime<Local>,
    pub difficulty: Difficulty,
    pub score: u32,
    pub accuracy: u32,
    pub level_reached: u32,
    pub shots: u32,
    pub hits: u32,
}

/// Append-only session history
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Opens (creating if needed) the database at the default state path.
    pub fn new() -> Result<Self> {
        let db_path =
            AppDirs::history_db_path().unwrap_or_else(|| PathBuf::from("skeet_history.db"));

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("failed to create state directory: {}", e)),
                )
            })?;
        }

        Self::open(db_path)
    }

    /// Opens a database at an explicit path (tests point this at a tempdir).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                finished_at TEXT NOT NULL,
                difficulty TEXT NOT NULL,
                score INTEGER NOT NULL,
                accuracy INTEGER NOT NULL,
                level_reached INTEGER NOT NULL,
                shots INTEGER NOT NULL,
                hits INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sessions_finished_at ON sessions(finished_at)",
            [],
        )?;

        Ok(HistoryDb { conn })
    }

    pub fn record_session(&self, rec: &SessionRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO sessions
            (finished_at, difficulty, score, accuracy, level_reached, shots, hits)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                rec.finished_at.to_rfc3339(),
                rec.difficulty.to_string(),
                rec.score,
                rec.accuracy,
                rec.level_reached,
                rec.shots,
                rec.hits,
            ],
        )?;
        Ok(())
    }

    /// Most recent sessions first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT finished_at, difficulty, score, accuracy, level_reached, shots, hits
            FROM sessions
            ORDER BY finished_at DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let finished_at: String = row.get(0)?;
            let finished_at = DateTime::parse_from_rfc3339(&finished_at)
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        0,
                        "finished_at".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?
                .with_timezone(&Local);
            let difficulty: String = row.get(1)?;

            Ok(SessionRecord {
                finished_at,
                difficulty: Difficulty::from_name(&difficulty).unwrap_or_default(),
                score: row.get(2)?,
                accuracy: row.get(3)?,
                level_reached: row.get(4)?,
                shots: row.get(5)?,
                hits: row.get(6)?,
            })
        })?;

        rows.collect()
    }

    /// Best score seen per difficulty, easiest first.
    pub fn best_scores(&self) -> Result<Vec<(Difficulty, u32)>> {
        let mut stmt = self.conn.prepare("SELECT difficulty, score FROM sessions")?;
        let rows: Vec<(String, u32)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(name, score)| Difficulty::from_name(&name).map(|d| (d, score)))
            .into_group_map()
            .into_iter()
            .map(|(difficulty, scores)| (difficulty, scores.into_iter().max().unwrap_or(0)))
            .sorted_by_key(|&(difficulty, _)| difficulty)
            .collect())
    }

    pub fn session_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(difficulty: Difficulty, score: u32) -> SessionRecord {
        SessionRecord {
            finished_at: Local::now(),
            difficulty,
            score,
            accuracy: 80,
            level_reached: 3,
            shots: 10,
            hits: 8,
        }
    }

    #[test]
    fn records_and_reads_back_sessions() {
        let dir = tempdir().unwrap();
        let db = HistoryDb::open(dir.path().join("history.db")).unwrap();

        db.record_session(&record(Difficulty::Medium, 120)).unwrap();
        db.record_session(&record(Difficulty::Hard, 90)).unwrap();

        assert_eq!(db.session_count().unwrap(), 2);
        let recent = db.recent_sessions(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent
            .iter()
            .any(|r| r.difficulty == Difficulty::Hard && r.score == 90));
    }

    #[test]
    fn recent_sessions_honors_limit() {
        let dir = tempdir().unwrap();
        let db = HistoryDb::open(dir.path().join("history.db")).unwrap();

        for score in [10, 20, 30, 40] {
            db.record_session(&record(Difficulty::Easy, score)).unwrap();
        }
        assert_eq!(db.recent_sessions(2).unwrap().len(), 2);
    }

    #[test]
    fn best_scores_groups_by_difficulty() {
        let dir = tempdir().unwrap();
        let db = HistoryDb::open(dir.path().join("history.db")).unwrap();

        db.record_session(&record(Difficulty::Easy, 50)).unwrap();
        db.record_session(&record(Difficulty::Easy, 150)).unwrap();
        db.record_session(&record(Difficulty::Hard, 70)).unwrap();

        let best = db.best_scores().unwrap();
        assert_eq!(
            best,
            vec![(Difficulty::Easy, 150), (Difficulty::Hard, 70)]
        );
    }

    #[test]
    fn empty_database_has_no_bests() {
        let dir = tempdir().unwrap();
        let db = HistoryDb::open(dir.path().join("history.db")).unwrap();
        assert!(db.best_scores().unwrap().is_empty());
        assert_eq!(db.session_count().unwrap(), 0);
    }
}
