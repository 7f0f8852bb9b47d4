//! Namespace lifecycle: open, list, delete and generational cleanup.

use std::collections::HashSet;

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

/// Namespace name with the number of entries it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceInfo {
    pub name: String,
    pub entries: u64,
    pub created_at: String,
}

impl CacheDb {
    /// Open a namespace, creating it if absent. Idempotent.
    pub async fn open_namespace(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO namespaces (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether a namespace exists.
    pub async fn has_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM namespaces WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// List namespace names in creation order.
    pub async fn list_namespaces(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM namespaces ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// List namespaces with entry counts, in creation order.
    pub async fn namespace_stats(&self) -> Result<Vec<NamespaceInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<NamespaceInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT n.name, n.created_at, COUNT(e.key)
                     FROM namespaces n LEFT JOIN entries e ON e.namespace = n.name
                     GROUP BY n.name
                     ORDER BY n.rowid",
                )?;
                let stats = stmt
                    .query_map([], |row| {
                        Ok(NamespaceInfo {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            entries: row.get::<_, i64>(2)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(stats)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a namespace and all of its entries.
    ///
    /// Returns false if the namespace did not exist.
    pub async fn delete_namespace(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM namespaces WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every namespace whose name is not in `current`.
    ///
    /// Returns the deleted names in creation order.
    pub async fn cleanup_generations(&self, current: &HashSet<String>) -> Result<Vec<String>, Error> {
        let current = current.clone();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let tx = conn.transaction()?;
                let stale: Vec<String> = {
                    let mut stmt = tx.prepare("SELECT name FROM namespaces ORDER BY rowid")?;
                    let names = stmt
                        .query_map([], |row| row.get::<_, String>(0))?
                        .collect::<Result<Vec<_>, _>>()?;
                    names.into_iter().filter(|name| !current.contains(name)).collect()
                };

                for name in &stale {
                    tx.execute("DELETE FROM namespaces WHERE name = ?1", params![name])?;
                }
                tx.commit()?;

                Ok(stale)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_namespace("app-shell-v1").await.unwrap();
        db.open_namespace("app-shell-v1").await.unwrap();

        assert_eq!(db.list_namespaces().await.unwrap(), vec!["app-shell-v1"]);
        assert!(db.has_namespace("app-shell-v1").await.unwrap());
        assert!(!db.has_namespace("app-shell-v2").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_in_creation_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_namespace("b").await.unwrap();
        db.open_namespace("a").await.unwrap();
        db.open_namespace("c").await.unwrap();

        assert_eq!(db.list_namespaces().await.unwrap(), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_delete_namespace() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_namespace("app-runtime-v1").await.unwrap();

        assert!(db.delete_namespace("app-runtime-v1").await.unwrap());
        assert!(!db.delete_namespace("app-runtime-v1").await.unwrap());
        assert!(db.list_namespaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_generations_removes_stale() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for name in ["app-shell-v1", "app-runtime-v1", "app-shell-v2", "app-runtime-v2", "unrelated"] {
            db.open_namespace(name).await.unwrap();
        }

        let deleted = db
            .cleanup_generations(&set(&["app-shell-v2", "app-runtime-v2"]))
            .await
            .unwrap();

        assert_eq!(deleted, vec!["app-shell-v1", "app-runtime-v1", "unrelated"]);
        assert_eq!(db.list_namespaces().await.unwrap(), vec!["app-shell-v2", "app-runtime-v2"]);
    }

    #[tokio::test]
    async fn test_cleanup_generations_nothing_stale() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_namespace("app-shell-v1").await.unwrap();

        let deleted = db
            .cleanup_generations(&set(&["app-shell-v1", "app-runtime-v1"]))
            .await
            .unwrap();

        assert!(deleted.is_empty());
        assert_eq!(db.list_namespaces().await.unwrap(), vec!["app-shell-v1"]);
    }

    #[tokio::test]
    async fn test_namespace_stats_empty() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_namespace("app-shell-v1").await.unwrap();

        let stats = db.namespace_stats().await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].name, "app-shell-v1");
        assert_eq!(stats[0].entries, 0);
    }
}
