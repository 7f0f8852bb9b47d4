//! Entry reads and writes.
//!
//! An entry maps a request identity (method + absolute URL) to the last
//! response stored for it in a namespace. Only GET requests are stored.

use super::connection::CacheDb;
use super::hash::compute_entry_key;
use crate::Error;
use crate::exchange::{Request, Response};
use bytes::Bytes;
use tokio_rusqlite::{params, rusqlite};

/// A stored response and the namespace it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub namespace: String,
    pub response: Response,
}

struct EntryRow {
    key: String,
    method: String,
    url: String,
    status: i64,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn new(request: &Request, response: &Response) -> Result<Self, Error> {
        if !request.is_cacheable() {
            return Err(Error::UncacheableMethod(format!("{} {}", request.method, request.url)));
        }

        Ok(Self {
            key: compute_entry_key(&request.method, request.url.as_str()),
            method: request.method.clone(),
            url: request.url.to_string(),
            status: i64::from(response.status),
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.to_vec(),
        })
    }
}

fn insert_row(conn: &rusqlite::Connection, namespace: &str, row: &EntryRow, now: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO namespaces (name, created_at) VALUES (?1, ?2)",
        params![namespace, now],
    )?;
    conn.execute(
        "INSERT INTO entries (namespace, key, method, url, status, headers_json, body, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(namespace, key) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![namespace, row.key, row.method, row.url, row.status, row.headers_json, row.body, now],
    )?;
    Ok(())
}

fn decode_response(status: i64, headers_json: &str, body: Vec<u8>) -> Result<Response, Error> {
    let status = u16::try_from(status).map_err(|_| Error::Serialization(format!("stored status {status}")))?;
    let headers: Vec<(String, String)> = serde_json::from_str(headers_json)?;
    Ok(Response { status, headers, body: Bytes::from(body) })
}

impl CacheDb {
    /// Store a response for a request, replacing any previous entry.
    ///
    /// Creates the namespace if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `Error::UncacheableMethod` for non-GET requests; nothing is written.
    pub async fn put_entry(&self, namespace: &str, request: &Request, response: &Response) -> Result<(), Error> {
        let row = EntryRow::new(request, response)?;
        let namespace = namespace.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                insert_row(&tx, &namespace, &row, &now)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Store several responses in one transaction. Either all are written or none.
    pub async fn put_entries(&self, namespace: &str, entries: &[(Request, Response)]) -> Result<(), Error> {
        let rows = entries
            .iter()
            .map(|(request, response)| EntryRow::new(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let namespace = namespace.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO namespaces (name, created_at) VALUES (?1, ?2)",
                    params![namespace, now],
                )?;
                for row in &rows {
                    insert_row(&tx, &namespace, row, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the entry for a request in one namespace.
    pub async fn match_entry(&self, namespace: &str, request: &Request) -> Result<Option<Response>, Error> {
        let key = compute_entry_key(&request.method, request.url.as_str());
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let result = conn.query_row(
                    "SELECT status, headers_json, body FROM entries WHERE namespace = ?1 AND key = ?2",
                    params![namespace, key],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, Vec<u8>>(2)?)),
                );

                match result {
                    Ok((status, headers_json, body)) => decode_response(status, &headers_json, body).map(Some),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a request across every namespace, oldest namespace first.
    pub async fn match_any(&self, request: &Request) -> Result<Option<CachedEntry>, Error> {
        let key = compute_entry_key(&request.method, request.url.as_str());
        self.conn
            .call(move |conn| -> Result<Option<CachedEntry>, Error> {
                let result = conn.query_row(
                    "SELECT e.namespace, e.status, e.headers_json, e.body
                     FROM entries e JOIN namespaces n ON n.name = e.namespace
                     WHERE e.key = ?1
                     ORDER BY n.rowid
                     LIMIT 1",
                    params![key],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, Vec<u8>>(3)?,
                        ))
                    },
                );

                match result {
                    Ok((namespace, status, headers_json, body)) => {
                        let response = decode_response(status, &headers_json, body)?;
                        Ok(Some(CachedEntry { namespace, response }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries stored in a namespace.
    pub async fn entry_count(&self, namespace: &str) -> Result<u64, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE namespace = ?1", params![namespace], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in a namespace, in insertion order.
    pub async fn entry_urls(&self, namespace: &str) -> Result<Vec<String>, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE namespace = ?1 ORDER BY rowid")?;
                let urls = stmt
                    .query_map(params![namespace], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    fn html(body: &str) -> Response {
        Response::new(200, body.to_string()).with_header("content-type", "text/html")
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = get("https://app.example.com/index.html");

        db.put_entry("app-shell-v1", &req, &html("<h1>shell</h1>")).await.unwrap();

        let found = db.match_entry("app-shell-v1", &req).await.unwrap().unwrap();
        assert_eq!(found.status, 200);
        assert_eq!(found.body, Bytes::from("<h1>shell</h1>"));
        assert_eq!(found.header("content-type"), Some("text/html"));
        assert!(db.has_namespace("app-shell-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.match_entry("app-shell-v1", &get("https://app.example.com/")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = get("https://app.example.com/data.json");

        db.put_entry("app-runtime-v1", &req, &Response::new(200, "old")).await.unwrap();
        db.put_entry("app-runtime-v1", &req, &Response::new(201, "new")).await.unwrap();

        let found = db.match_entry("app-runtime-v1", &req).await.unwrap().unwrap();
        assert_eq!(found.status, 201);
        assert_eq!(found.body, Bytes::from("new"));
        assert_eq!(db.entry_count("app-runtime-v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_string_is_distinct_key() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("app-runtime-v1", &get("https://app.example.com/a?x=1"), &Response::new(200, "1"))
            .await
            .unwrap();

        let other = db
            .match_entry("app-runtime-v1", &get("https://app.example.com/a?x=2"))
            .await
            .unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_fragment_shares_key() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("app-runtime-v1", &get("https://app.example.com/guide"), &html("guide"))
            .await
            .unwrap();

        let found = db
            .match_entry("app-runtime-v1", &get("https://app.example.com/guide#install"))
            .await
            .unwrap();
        assert_eq!(found.map(|r| r.body), Some(Bytes::from("guide")));
    }

    #[tokio::test]
    async fn test_non_get_rejected() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = Request::new("POST", Url::parse("https://app.example.com/form").unwrap(), false);

        let result = db.put_entry("app-runtime-v1", &req, &Response::new(200, "ok")).await;
        assert!(matches!(result, Err(Error::UncacheableMethod(_))));
        assert!(!db.has_namespace("app-runtime-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_entries_is_atomic() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entries = vec![
            (get("https://app.example.com/"), html("root")),
            (Request::new("PUT", Url::parse("https://app.example.com/x").unwrap(), false), html("x")),
        ];

        assert!(db.put_entries("app-shell-v1", &entries).await.is_err());
        assert_eq!(db.entry_count("app-shell-v1").await.unwrap(), 0);
        assert!(!db.has_namespace("app-shell-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_entries_in_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entries = vec![
            (get("https://app.example.com/"), html("root")),
            (get("https://app.example.com/index.html"), html("index")),
        ];

        db.put_entries("app-shell-v1", &entries).await.unwrap();
        assert_eq!(
            db.entry_urls("app-shell-v1").await.unwrap(),
            vec!["https://app.example.com/", "https://app.example.com/index.html"]
        );
    }

    #[tokio::test]
    async fn test_match_any_prefers_oldest_namespace() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = get("https://app.example.com/logo.png");

        db.open_namespace("app-shell-v1").await.unwrap();
        db.put_entry("app-runtime-v1", &req, &Response::new(200, "runtime")).await.unwrap();
        db.put_entry("app-shell-v1", &req, &Response::new(200, "shell")).await.unwrap();

        let found = db.match_any(&req).await.unwrap().unwrap();
        assert_eq!(found.namespace, "app-shell-v1");
        assert_eq!(found.response.body, Bytes::from("shell"));
    }

    #[tokio::test]
    async fn test_delete_namespace_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = get("https://app.example.com/logo.png");
        db.put_entry("app-runtime-v1", &req, &Response::new(200, "x")).await.unwrap();

        db.delete_namespace("app-runtime-v1").await.unwrap();

        assert!(db.match_any(&req).await.unwrap().is_none());
        assert_eq!(db.entry_count("app-runtime-v1").await.unwrap(), 0);
    }
}
