//! Opportunistic `gha_payloads.size` refresh.

use sqlx::PgConnection;

use lineage_core::types::DbId;

pub struct PayloadRepo;

impl PayloadRepo {
    /// Set the payload's declared commit count to the reconstructed one,
    /// but only when the stored value is missing or was clearly never
    /// populated (null or <= 1) and actually differs.
    pub async fn refresh_size(
        conn: &mut PgConnection,
        event_id: DbId,
        size: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "update gha_payloads set size = $2 \
             where event_id = $1 \
               and (size is null or size <= 1) \
               and (size is null or size <> $2)",
        )
        .bind(event_id)
        .bind(size)
        .execute(conn)
        .await?;
        Ok(())
    }
}
