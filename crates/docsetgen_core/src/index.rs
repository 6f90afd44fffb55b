use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use serde::Serialize;

const SEARCH_INDEX_SCHEMA_SQL: &str = r#"
DROP TABLE IF EXISTS searchIndex;
CREATE TABLE searchIndex(id INTEGER PRIMARY KEY, name TEXT, type TEXT, path TEXT);
CREATE UNIQUE INDEX anchor ON searchIndex (name, type, path);
"#;

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub total_entries: usize,
    pub by_type: BTreeMap<String, usize>,
}

/// Dash search index, rebuilt from scratch on every run.
pub struct SearchIndex {
    connection: Connection,
}

impl SearchIndex {
    /// Opens the index file and drops any table left by a previous run.
    pub fn create(index_path: &Path) -> Result<Self> {
        ensure_parent(index_path)?;
        let connection = open_connection(index_path)?;
        connection
            .execute_batch(SEARCH_INDEX_SCHEMA_SQL)
            .context("failed to initialize searchIndex schema")?;
        Ok(Self { connection })
    }

    /// Returns `false` when the `(name, type, path)` triple already exists.
    pub fn insert_entry(&self, name: &str, entry_type: &str, path: &str) -> Result<bool> {
        let changed = self
            .connection
            .execute(
                "INSERT OR IGNORE INTO searchIndex(name, type, path) VALUES (?1, ?2, ?3)",
                params![name, entry_type, path],
            )
            .with_context(|| format!("failed to insert index entry {name} ({entry_type})"))?;
        Ok(changed > 0)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        stats_for_connection(&self.connection)
    }
}

pub fn load_index_stats(index_path: &Path) -> Result<Option<IndexStats>> {
    if !index_path.exists() {
        return Ok(None);
    }
    let connection = open_connection(index_path)?;
    if !table_exists(&connection, "searchIndex")? {
        return Ok(None);
    }
    stats_for_connection(&connection).map(Some)
}

fn stats_for_connection(connection: &Connection) -> Result<IndexStats> {
    let total: i64 = connection
        .query_row("SELECT COUNT(*) FROM searchIndex", [], |row| row.get(0))
        .context("failed to count searchIndex rows")?;
    let total_entries = usize::try_from(total).context("count does not fit into usize")?;

    let mut statement = connection
        .prepare(
            "SELECT type, COUNT(*) AS count
             FROM searchIndex
             GROUP BY type
             ORDER BY type ASC",
        )
        .context("failed to prepare type aggregation query")?;
    let rows = statement
        .query_map([], |row| {
            let entry_type: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((entry_type, count))
        })
        .context("failed to run type aggregation query")?;

    let mut by_type = BTreeMap::new();
    for row in rows {
        let (entry_type, count) = row.context("failed to read type aggregation row")?;
        let count = usize::try_from(count).context("type count does not fit into usize")?;
        by_type.insert(entry_type, count);
    }

    Ok(IndexStats {
        total_entries,
        by_type,
    })
}

fn open_connection(index_path: &Path) -> Result<Connection> {
    let connection = Connection::open(index_path)
        .with_context(|| format!("failed to open {}", index_path.display()))?;
    connection
        .busy_timeout(Duration::from_secs(5))
        .context("failed to set sqlite busy timeout")?;
    Ok(connection)
}

fn ensure_parent(index_path: &Path) -> Result<()> {
    let parent = index_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("index path has no parent: {}", index_path.display()))?;
    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create index parent directory {}",
            parent.display()
        )
    })
}

fn table_exists(connection: &Connection, table_name: &str) -> Result<bool> {
    let exists: i64 = connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [table_name],
            |row| row.get(0),
        )
        .with_context(|| format!("failed to check sqlite_master for table {table_name}"))?;
    Ok(exists == 1)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{SearchIndex, load_index_stats};

    #[test]
    fn duplicate_triples_are_ignored() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("Resources").join("docSet.dsidx");
        let index = SearchIndex::create(&path).expect("create index");

        assert!(
            index
                .insert_entry("love.load", "Callback", "love-load.html")
                .expect("insert")
        );
        assert!(
            !index
                .insert_entry("love.load", "Callback", "love-load.html")
                .expect("insert duplicate")
        );
        assert!(
            index
                .insert_entry("love.load", "Function", "love-load.html")
                .expect("insert other type")
        );

        let stats = index.stats().expect("stats");
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.by_type.get("Callback"), Some(&1));
        assert_eq!(stats.by_type.get("Function"), Some(&1));
    }

    #[test]
    fn create_drops_rows_from_previous_run() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("docSet.dsidx");
        {
            let index = SearchIndex::create(&path).expect("create index");
            index
                .insert_entry("Source", "Type", "source.html")
                .expect("insert");
        }

        let index = SearchIndex::create(&path).expect("recreate index");
        assert_eq!(index.stats().expect("stats").total_entries, 0);
    }

    #[test]
    fn load_index_stats_reports_missing_storage() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("docSet.dsidx");
        assert!(load_index_stats(&path).expect("stats").is_none());

        {
            let index = SearchIndex::create(&path).expect("create index");
            index
                .insert_entry("BlendMode", "Enum", "blendmode.html")
                .expect("insert");
        }
        let stats = load_index_stats(&path).expect("stats").expect("present");
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.by_type.get("Enum"), Some(&1));
    }
}
