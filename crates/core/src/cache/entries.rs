//! Tier and entry operations on the SQLite backend.
//!
//! Implements [`CacheStorage`] for [`CacheDb`]. Entries are upserted on every
//! write and only ever removed by deleting their tier (cascade).

use async_trait::async_trait;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheDb;
use super::{CacheStorage, RequestKey};
use crate::Error;
use crate::http::Response;

fn ensure_tier(conn: &rusqlite::Connection, tier: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO tiers (name, created_at) VALUES (?1, ?2)",
        params![tier, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open_tier(&self, tier: &str) -> Result<(), Error> {
        let tier = tier.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> { ensure_tier(conn, &tier) })
            .await
            .map_err(Error::from)
    }

    async fn tier_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM tiers ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_tier(&self, tier: &str) -> Result<bool, Error> {
        let tier = tier.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                // Explicit delete keeps this correct even if foreign keys were off.
                tx.execute("DELETE FROM entries WHERE tier = ?1", params![tier])?;
                let removed = tx.execute("DELETE FROM tiers WHERE name = ?1", params![tier])?;
                tx.commit()?;
                Ok(removed > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn get_entry(&self, tier: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        let tier = tier.to_string();
        let hash = key.hash.clone();
        self.conn
            .call(move |conn| -> Result<Option<Response>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, headers_json, body
                     FROM entries WHERE tier = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![tier, hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                });

                match result {
                    Ok((url, status, headers_json, body)) => {
                        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                        Ok(Some(Response::new(url, status, headers, body)))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn put_entry(&self, tier: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let tier = tier.to_string();
        let key = key.clone();
        let headers_json = serde_json::to_string(&response.headers)?;
        let status = response.status;
        let body = response.body.to_vec();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_tier(&tx, &tier)?;
                tx.execute(
                    "INSERT INTO entries (tier, key, url, method, status, headers_json, body, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(tier, key) DO UPDATE SET
                        url = excluded.url,
                        method = excluded.method,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        &tier,
                        &key.hash,
                        &key.url,
                        &key.method,
                        status,
                        &headers_json,
                        &body,
                        chrono::Utc::now().to_rfc3339(),
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn entry_urls(&self, tier: &str) -> Result<Vec<String>, Error> {
        let tier = tier.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE tier = ?1 ORDER BY url")?;
                let urls = stmt
                    .query_map(params![tier], |row| row.get(0))?
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

    fn key(url: &str) -> RequestKey {
        RequestKey::get(&Url::parse(url).unwrap())
    }

    fn page(url: &str, body: &str) -> Response {
        Response::new(url, 200, vec![("content-type".into(), "text/html".into())], body.to_string())
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let k = key("http://localhost:5000/offline");

        db.put_entry("static-v2", &k, &page(&k.url, "offline")).await.unwrap();

        let got = db.get_entry("static-v2", &k).await.unwrap().unwrap();
        assert_eq!(got.status, 200);
        assert_eq!(got.body.as_ref(), b"offline");
        assert_eq!(got.content_type(), Some("text/html"));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.get_entry("static-v2", &key("http://localhost:5000/")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_entries_are_tier_scoped() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let k = key("http://localhost:5000/logo.png");
        db.put_entry("image-v2", &k, &page(&k.url, "png")).await.unwrap();

        assert!(db.get_entry("static-v2", &k).await.unwrap().is_none());
        assert!(db.get_entry("image-v2", &k).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let k = key("http://localhost:5000/");
        db.put_entry("static-v2", &k, &page(&k.url, "old")).await.unwrap();
        db.put_entry("static-v2", &k, &page(&k.url, "new")).await.unwrap();

        let got = db.get_entry("static-v2", &k).await.unwrap().unwrap();
        assert_eq!(got.body.as_ref(), b"new");
        assert_eq!(db.entry_urls("static-v2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_tier("static-v2").await.unwrap();
        db.open_tier("static-v2").await.unwrap();
        assert_eq!(db.tier_names().await.unwrap(), vec!["static-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_tier_frees_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let k = key("http://localhost:5000/");
        db.put_entry("static-v1", &k, &page(&k.url, "v1")).await.unwrap();

        assert!(db.delete_tier("static-v1").await.unwrap());
        assert!(db.tier_names().await.unwrap().is_empty());
        assert!(db.entry_urls("static-v1").await.unwrap().is_empty());

        // Reopening a deleted tier starts empty.
        db.open_tier("static-v1").await.unwrap();
        assert!(db.get_entry("static-v1", &k).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_tier_is_noop() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(!db.delete_tier("nope").await.unwrap());
    }
}
