//! SQLite persistence for FAQ answers and the interaction log

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use super::{CollaboratorError, Persistence};

const CREATE_FAQ_TABLE: &str = "CREATE TABLE IF NOT EXISTS faq (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    question TEXT NOT NULL,
    answer TEXT NOT NULL
)";

const CREATE_INTERACTIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS interactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    command TEXT NOT NULL,
    response TEXT NOT NULL,
    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
)";

/// Connection is not `Sync`; every call takes the mutex
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, CollaboratorError> {
        info!(?path, "opening database");
        Self::init(Connection::open(path)?)
    }

    fn init(conn: Connection) -> Result<Self, CollaboratorError> {
        conn.execute_batch(&format!(
            "{};\n{};",
            CREATE_FAQ_TABLE, CREATE_INTERACTIONS_TABLE
        ))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a FAQ entry unless the exact question is already stored.
    /// Returns whether a row was added.
    pub fn add_faq(&self, question: &str, answer: &str) -> Result<bool, CollaboratorError> {
        let inserted = self.conn().execute(
            "INSERT INTO faq (question, answer)
             SELECT ?1, ?2 WHERE NOT EXISTS (SELECT 1 FROM faq WHERE question = ?1)",
            (question, answer),
        )?;
        Ok(inserted > 0)
    }
}

#[cfg(test)]
impl SqliteStore {
    pub fn open_in_memory() -> Result<Self, CollaboratorError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Most recent `count` interactions, newest first
    pub fn recent_interactions(
        &self,
        count: usize,
    ) -> Result<Vec<(String, String)>, CollaboratorError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT command, response FROM interactions ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map([count as i64], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Escape LIKE wildcards so `text` only matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl Persistence for SqliteStore {
    fn get_faq(&self, question: &str) -> Result<Option<String>, CollaboratorError> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(None);
        }

        let pattern = format!("%{}%", escape_like(question));
        let answer = self
            .conn()
            .query_row(
                "SELECT answer FROM faq WHERE question LIKE ?1 ESCAPE '\\' ORDER BY id LIMIT 1",
                [pattern],
                |row| row.get(0),
            )
            .optional()?;
        Ok(answer)
    }

    fn log_interaction(&self, command: &str, response: &str) -> Result<(), CollaboratorError> {
        self.conn().execute(
            "INSERT INTO interactions (command, response) VALUES (?1, ?2)",
            (command, response),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faq_lookup_is_substring() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .add_faq("what are your hours today", "We are open nine to five.")
            .unwrap();

        assert_eq!(
            store.get_faq("what are your hours").unwrap().as_deref(),
            Some("We are open nine to five.")
        );
        assert_eq!(store.get_faq("where are you").unwrap(), None);
    }

    #[test]
    fn test_interaction_log() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.log_interaction("hello", "Hi there!").unwrap();
        store.log_interaction("open calculator", "Opening calculator.").unwrap();

        let recent = store.recent_interactions(1).unwrap();
        assert_eq!(
            recent,
            vec![("open calculator".to_string(), "Opening calculator.".to_string())]
        );
    }

    #[test]
    fn test_open_on_disk_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assistant.db");

        assert!(SqliteStore::open(&path).unwrap().add_faq("q", "a").unwrap());
        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.get_faq("q").unwrap().as_deref(), Some("a"));
    }

    #[test]
    fn test_add_faq_skips_existing_question() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.add_faq("where are you", "Downtown.").unwrap());
        assert!(!store.add_faq("where are you", "Uptown.").unwrap());

        assert_eq!(
            store.get_faq("where are you").unwrap().as_deref(),
            Some("Downtown.")
        );
    }

    #[test]
    fn test_faq_lookup_treats_wildcards_literally() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.add_faq("what are your hours", "Nine to five.").unwrap();
        store.add_faq("where are we", "Downtown.").unwrap();
        store.add_faq("is 100% refund possible", "Yes.").unwrap();

        assert_eq!(store.get_faq("").unwrap(), None);
        assert_eq!(store.get_faq("   ").unwrap(), None);
        assert_eq!(store.get_faq("w_e_e").unwrap(), None);
        assert_eq!(store.get_faq("a%h").unwrap(), None);
        assert_eq!(store.get_faq("100%").unwrap().as_deref(), Some("Yes."));
    }
}
