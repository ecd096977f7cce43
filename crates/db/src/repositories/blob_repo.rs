//! Repository for the `blobs` table (experiment file contents).

use labcoord_core::attachments::FileDescriptor;
use labcoord_core::types::DbId;
use sqlx::PgPool;

use crate::store::Blob;

/// Provides storage for file contents keyed by file identity.
pub struct BlobRepo;

#[derive(sqlx::FromRow)]
struct BlobRow {
    id: DbId,
    filename: String,
    content_type: String,
    data: Vec<u8>,
}

impl BlobRepo {
    pub async fn create(
        pool: &PgPool,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<FileDescriptor, sqlx::Error> {
        let id: DbId = sqlx::query_scalar(
            "INSERT INTO blobs (filename, content_type, data) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(filename)
        .bind(content_type)
        .bind(data)
        .fetch_one(pool)
        .await?;
        Ok(FileDescriptor {
            id,
            filename: filename.to_string(),
            mimetype: content_type.to_string(),
        })
    }

    /// Write content under an existing identity.
    pub async fn overwrite(
        pool: &PgPool,
        id: DbId,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<FileDescriptor, sqlx::Error> {
        sqlx::query(
            "INSERT INTO blobs (id, filename, content_type, data) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET \
                filename = EXCLUDED.filename, \
                content_type = EXCLUDED.content_type, \
                data = EXCLUDED.data",
        )
        .bind(id)
        .bind(filename)
        .bind(content_type)
        .bind(data)
        .execute(pool)
        .await?;
        Ok(FileDescriptor {
            id,
            filename: filename.to_string(),
            mimetype: content_type.to_string(),
        })
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Blob>, sqlx::Error> {
        let row = sqlx::query_as::<_, BlobRow>(
            "SELECT id, filename, content_type, data FROM blobs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|r| Blob {
            descriptor: FileDescriptor {
                id: r.id,
                filename: r.filename,
                mimetype: r.content_type,
            },
            data: r.data,
        }))
    }

    pub async fn delete(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM blobs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
