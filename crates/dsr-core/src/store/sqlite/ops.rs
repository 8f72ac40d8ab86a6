//! Connection-level document operations shared by pooled calls and sessions.

use sqlx::{Row, SqliteConnection};

use crate::fault::{kinds, StoreFault};
use crate::store::document::{ensure_id, DocId, Document, Filter, Update};
use crate::store::options::UpdateResult;

use super::fault::fault_from_sqlx;

/// All documents of a collection with their row sequence numbers, in insertion order.
async fn load(conn: &mut SqliteConnection, collection: &str) -> Result<Vec<(i64, Document)>, StoreFault> {
    let rows = sqlx::query(
        r#"
        SELECT seq, body FROM documents
        WHERE collection = ?1
        ORDER BY seq ASC
        "#,
    )
    .bind(collection)
    .fetch_all(&mut *conn)
    .await
    .map_err(fault_from_sqlx)?;

    rows.into_iter()
        .map(|row| {
            let seq: i64 = row.try_get("seq").map_err(fault_from_sqlx)?;
            let body: String = row.try_get("body").map_err(fault_from_sqlx)?;
            let doc = serde_json::from_str::<Document>(&body)
                .map_err(|e| StoreFault::new(kinds::CORRUPT_DOCUMENT, e.to_string()))?;
            Ok((seq, doc))
        })
        .collect()
}

async fn first_match(
    conn: &mut SqliteConnection,
    collection: &str,
    filter: &Filter,
) -> Result<Option<(i64, Document)>, StoreFault> {
    Ok(load(conn, collection)
        .await?
        .into_iter()
        .find(|(_, d)| filter.matches(d)))
}

fn encode(doc: &Document) -> Result<String, StoreFault> {
    serde_json::to_string(doc).map_err(|e| StoreFault::new(kinds::INVALID_DOCUMENT, e.to_string()))
}

pub(super) async fn find(
    conn: &mut SqliteConnection,
    collection: &str,
    filter: &Filter,
) -> Result<Vec<Document>, StoreFault> {
    Ok(load(conn, collection)
        .await?
        .into_iter()
        .map(|(_, d)| d)
        .filter(|d| filter.matches(d))
        .collect())
}

pub(super) async fn insert(
    conn: &mut SqliteConnection,
    collection: &str,
    mut doc: Document,
) -> Result<DocId, StoreFault> {
    let id = ensure_id(&mut doc)?;
    sqlx::query(
        r#"
        INSERT INTO documents (collection, id, body)
        VALUES (?1, ?2, ?3)
        "#,
    )
    .bind(collection)
    .bind(&id)
    .bind(encode(&doc)?)
    .execute(&mut *conn)
    .await
    .map_err(fault_from_sqlx)?;
    Ok(id)
}

pub(super) async fn update(
    conn: &mut SqliteConnection,
    collection: &str,
    filter: &Filter,
    update: &Update,
    upsert: bool,
) -> Result<UpdateResult, StoreFault> {
    if let Some((seq, mut doc)) = first_match(conn, collection, filter).await? {
        let modified = update.apply(&mut doc)?;
        if modified {
            sqlx::query("UPDATE documents SET body = ?1 WHERE seq = ?2")
                .bind(encode(&doc)?)
                .bind(seq)
                .execute(&mut *conn)
                .await
                .map_err(fault_from_sqlx)?;
        }
        return Ok(UpdateResult {
            matched: 1,
            modified: u64::from(modified),
            upserted_id: None,
        });
    }
    if !upsert {
        return Ok(UpdateResult::default());
    }
    let mut seed = filter.seed();
    update.apply(&mut seed)?;
    let id = insert(conn, collection, seed).await?;
    Ok(UpdateResult {
        matched: 0,
        modified: 0,
        upserted_id: Some(id),
    })
}

pub(super) async fn delete(
    conn: &mut SqliteConnection,
    collection: &str,
    filter: &Filter,
) -> Result<u64, StoreFault> {
    let Some((seq, _)) = first_match(conn, collection, filter).await? else {
        return Ok(0);
    };
    let r = sqlx::query("DELETE FROM documents WHERE seq = ?1")
        .bind(seq)
        .execute(&mut *conn)
        .await
        .map_err(fault_from_sqlx)?;
    Ok(r.rows_affected())
}
