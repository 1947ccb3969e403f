//! Material records.

use libsql::params;
use studyaid_shared::{ContentKind, Material, MaterialId, NewMaterial, Result, UserId};

use crate::{Storage, now_rfc3339, parse_id, parse_timestamp, storage_err};

const MATERIAL_COLUMNS: &str = "id, title, content, content_type, file_url, user_id, created_at";

impl Storage {
    /// Insert a material and return the stored record.
    pub async fn insert_material(&self, new: NewMaterial) -> Result<Material> {
        let id = MaterialId::new();
        let now = now_rfc3339();
        self.conn
            .execute(
                "INSERT INTO materials (id, title, content, content_type, file_url, user_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.to_string(),
                    new.title.as_str(),
                    new.content.as_str(),
                    new.content_type.as_str(),
                    new.file_url.as_deref(),
                    new.user_id.to_string(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;

        tracing::info!(
            material_id = %id,
            user_id = %new.user_id,
            kind = %new.content_type,
            chars = new.content.chars().count(),
            "material stored"
        );

        Ok(Material {
            id,
            title: new.title,
            content: new.content,
            content_type: new.content_type,
            file_url: new.file_url,
            user_id: new.user_id,
            created_at: parse_timestamp(&now)?,
        })
    }

    /// Fetch a material regardless of owner.
    pub async fn get_material(&self, id: MaterialId) -> Result<Option<Material>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_material(&row)?)),
            None => Ok(None),
        }
    }

    /// Fetch a material only if `user_id` owns it.
    pub async fn get_material_for_user(
        &self,
        id: MaterialId,
        user_id: UserId,
    ) -> Result<Option<Material>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = ?1 AND user_id = ?2"),
                params![id.to_string(), user_id.to_string()],
            )
            .await
            .map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_material(&row)?)),
            None => Ok(None),
        }
    }

    /// A user's materials, newest first.
    pub async fn list_materials_for_user(&self, user_id: UserId) -> Result<Vec<Material>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {MATERIAL_COLUMNS} FROM materials WHERE user_id = ?1
                     ORDER BY created_at DESC, id DESC"
                ),
                params![user_id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_material(&row)?);
        }
        Ok(results)
    }

    /// Delete a material with its artifacts and job history in one transaction.
    /// Returns whether the material existed.
    pub async fn delete_material(&self, id: MaterialId) -> Result<bool> {
        let id = id.to_string();
        let tx = self.write_transaction().await?;

        tx.execute(
            "DELETE FROM generated_data WHERE material_id = ?1",
            params![id.as_str()],
        )
        .await
        .map_err(storage_err)?;
        tx.execute(
            "DELETE FROM enrichment_jobs WHERE material_id = ?1",
            params![id.as_str()],
        )
        .await
        .map_err(storage_err)?;
        let removed = tx
            .execute("DELETE FROM materials WHERE id = ?1", params![id.as_str()])
            .await
            .map_err(storage_err)?;

        tx.commit().await.map_err(storage_err)?;
        tracing::info!(material_id = %id, removed, "material deleted");
        Ok(removed > 0)
    }
}

fn row_to_material(row: &libsql::Row) -> Result<Material> {
    Ok(Material {
        id: parse_id(&row.get::<String>(0).map_err(storage_err)?)?,
        title: row.get::<String>(1).map_err(storage_err)?,
        content: row.get::<String>(2).map_err(storage_err)?,
        content_type: row
            .get::<String>(3)
            .map_err(storage_err)?
            .parse::<ContentKind>()?,
        file_url: row.get::<String>(4).ok(),
        user_id: parse_id(&row.get::<String>(5).map_err(storage_err)?)?,
        created_at: parse_timestamp(&row.get::<String>(6).map_err(storage_err)?)?,
    })
}
