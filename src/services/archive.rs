//! Cascade archive and restore
//!
//! Soft-delete propagation down the entity tree, walked explicitly with a
//! typed accumulator. Every row archived by a cascade is flagged
//! `archived_by_cascade`, and a cascade restore only touches rows carrying
//! that flag. A child archived independently of its parent stays archived
//! when the parent comes back, until restored directly.

use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Per-entity-type counts accumulated by one archive or restore walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveCounts {
    pub warehouses: u64,
    pub seasons: u64,
    pub weeks: u64,
    pub receptions: u64,
    pub classification_lines: u64,
    pub orders: u64,
    pub order_lines: u64,
    pub order_consumptions: u64,
    pub trucks: u64,
    pub manifest_items: u64,
    pub truck_consumptions: u64,
    pub purchases: u64,
    pub consumables: u64,
}

impl ArchiveCounts {
    /// Total rows touched across all entity types.
    pub fn total(&self) -> u64 {
        self.warehouses
            + self.seasons
            + self.weeks
            + self.receptions
            + self.classification_lines
            + self.orders
            + self.order_lines
            + self.order_consumptions
            + self.trucks
            + self.manifest_items
            + self.truck_consumptions
            + self.purchases
            + self.consumables
    }

    pub fn merge(&mut self, other: &ArchiveCounts) {
        self.warehouses += other.warehouses;
        self.seasons += other.seasons;
        self.weeks += other.weeks;
        self.receptions += other.receptions;
        self.classification_lines += other.classification_lines;
        self.orders += other.orders;
        self.order_lines += other.order_lines;
        self.order_consumptions += other.order_consumptions;
        self.trucks += other.trucks;
        self.manifest_items += other.manifest_items;
        self.truck_consumptions += other.truck_consumptions;
        self.purchases += other.purchases;
        self.consumables += other.consumables;
    }
}

/// Whether a cascade restore may reactivate a child in this state. Direct
/// restores always may; a cascade only resurrects what it archived.
pub fn should_cascade_restore(archived_by_cascade: bool, via_cascade: bool) -> bool {
    !via_cascade || archived_by_cascade
}

/// Cascade archive/restore walks
#[derive(Clone)]
pub struct ArchiveService {
    db: PgPool,
}

impl ArchiveService {
    /// Create a new ArchiveService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Archive a warehouse and everything under it.
    pub async fn archive_warehouse(&self, warehouse_id: Uuid) -> AppResult<ArchiveCounts> {
        let mut tx = self.db.begin().await?;
        let mut counts = ArchiveCounts::default();

        let active = sqlx::query_scalar::<_, bool>(
            "SELECT active FROM warehouses WHERE id = $1 FOR UPDATE",
        )
        .bind(warehouse_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))?;

        if !active {
            return Ok(counts);
        }

        counts.warehouses += archive_rows(
            &mut tx,
            "UPDATE warehouses SET active = FALSE, archived_at = NOW(), archived_by_cascade = FALSE \
             WHERE id = $1 AND active",
            warehouse_id,
        )
        .await?;

        let season_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM seasons WHERE warehouse_id = $1 AND active FOR UPDATE",
        )
        .bind(warehouse_id)
        .fetch_all(&mut *tx)
        .await?;

        for season_id in season_ids {
            cascade_archive_season(&mut tx, season_id, true, &mut counts).await?;
        }

        counts.consumables += archive_rows(
            &mut tx,
            "UPDATE consumables SET active = FALSE, archived_at = NOW(), archived_by_cascade = TRUE \
             WHERE warehouse_id = $1 AND active",
            warehouse_id,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(warehouse_id = %warehouse_id, total = counts.total(), "warehouse archived");
        Ok(counts)
    }

    /// Restore a warehouse; cascade-archived descendants come back,
    /// independently archived ones stay down.
    pub async fn restore_warehouse(&self, warehouse_id: Uuid) -> AppResult<ArchiveCounts> {
        let mut tx = self.db.begin().await?;
        let mut counts = ArchiveCounts::default();

        let active = sqlx::query_scalar::<_, bool>(
            "SELECT active FROM warehouses WHERE id = $1 FOR UPDATE",
        )
        .bind(warehouse_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))?;

        if active {
            return Ok(counts);
        }

        counts.warehouses += archive_rows(
            &mut tx,
            "UPDATE warehouses SET active = TRUE, archived_at = NULL, archived_by_cascade = FALSE \
             WHERE id = $1 AND NOT active",
            warehouse_id,
        )
        .await?;

        let season_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM seasons \
             WHERE warehouse_id = $1 AND NOT active AND archived_by_cascade \
             FOR UPDATE",
        )
        .bind(warehouse_id)
        .fetch_all(&mut *tx)
        .await?;

        for season_id in season_ids {
            cascade_restore_season(&mut tx, season_id, true, &mut counts).await?;
        }

        counts.consumables += archive_rows(
            &mut tx,
            "UPDATE consumables SET active = TRUE, archived_at = NULL, archived_by_cascade = FALSE \
             WHERE warehouse_id = $1 AND NOT active AND archived_by_cascade",
            warehouse_id,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(warehouse_id = %warehouse_id, total = counts.total(), "warehouse restored");
        Ok(counts)
    }

    /// Archive a season and everything under it.
    pub async fn archive_season(&self, season_id: Uuid) -> AppResult<ArchiveCounts> {
        let mut tx = self.db.begin().await?;
        let mut counts = ArchiveCounts::default();

        let active =
            sqlx::query_scalar::<_, bool>("SELECT active FROM seasons WHERE id = $1 FOR UPDATE")
                .bind(season_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Season".to_string()))?;

        if !active {
            return Ok(counts);
        }

        cascade_archive_season(&mut tx, season_id, false, &mut counts).await?;
        tx.commit().await?;

        tracing::info!(season_id = %season_id, total = counts.total(), "season archived");
        Ok(counts)
    }

    /// Restore a season and its cascade-archived descendants.
    pub async fn restore_season(&self, season_id: Uuid) -> AppResult<ArchiveCounts> {
        let mut tx = self.db.begin().await?;
        let mut counts = ArchiveCounts::default();

        let active =
            sqlx::query_scalar::<_, bool>("SELECT active FROM seasons WHERE id = $1 FOR UPDATE")
                .bind(season_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Season".to_string()))?;

        if active {
            return Ok(counts);
        }

        cascade_restore_season(&mut tx, season_id, false, &mut counts).await?;
        tx.commit().await?;

        tracing::info!(season_id = %season_id, total = counts.total(), "season restored");
        Ok(counts)
    }

    /// Archive a reception and its classification lines.
    pub async fn archive_reception(&self, reception_id: Uuid) -> AppResult<ArchiveCounts> {
        let mut tx = self.db.begin().await?;
        let mut counts = ArchiveCounts::default();

        let active = sqlx::query_scalar::<_, bool>(
            "SELECT active FROM receptions WHERE id = $1 FOR UPDATE",
        )
        .bind(reception_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Reception".to_string()))?;

        if !active {
            return Ok(counts);
        }

        cascade_archive_reception(&mut tx, reception_id, false, &mut counts).await?;
        tx.commit().await?;
        Ok(counts)
    }

    /// Restore a reception and its cascade-archived lines.
    pub async fn restore_reception(&self, reception_id: Uuid) -> AppResult<ArchiveCounts> {
        let mut tx = self.db.begin().await?;
        let mut counts = ArchiveCounts::default();

        let active = sqlx::query_scalar::<_, bool>(
            "SELECT active FROM receptions WHERE id = $1 FOR UPDATE",
        )
        .bind(reception_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Reception".to_string()))?;

        if active {
            return Ok(counts);
        }

        counts.receptions += archive_rows(
            &mut tx,
            "UPDATE receptions SET active = TRUE, archived_at = NULL, archived_by_cascade = FALSE \
             WHERE id = $1 AND NOT active",
            reception_id,
        )
        .await?;

        counts.classification_lines += archive_rows(
            &mut tx,
            "UPDATE classification_lines \
             SET active = TRUE, archived_at = NULL, archived_by_cascade = FALSE \
             WHERE reception_id = $1 AND NOT active AND archived_by_cascade",
            reception_id,
        )
        .await?;

        tx.commit().await?;
        Ok(counts)
    }
}

/// Run one parameterized UPDATE and report rows touched.
async fn archive_rows(
    tx: &mut Transaction<'_, Postgres>,
    sql: &str,
    id: Uuid,
) -> AppResult<u64> {
    let result = sqlx::query(sql).bind(id).execute(&mut **tx).await?;
    Ok(result.rows_affected())
}

/// Depth-first archive of a season subtree. `by_cascade` marks whether the
/// season itself was reached through its warehouse.
async fn cascade_archive_season(
    tx: &mut Transaction<'_, Postgres>,
    season_id: Uuid,
    by_cascade: bool,
    counts: &mut ArchiveCounts,
) -> AppResult<()> {
    counts.seasons += archive_rows(
        tx,
        if by_cascade {
            "UPDATE seasons SET active = FALSE, archived_at = NOW(), archived_by_cascade = TRUE \
             WHERE id = $1 AND active"
        } else {
            "UPDATE seasons SET active = FALSE, archived_at = NOW(), archived_by_cascade = FALSE \
             WHERE id = $1 AND active"
        },
        season_id,
    )
    .await?;

    counts.weeks += archive_rows(
        tx,
        "UPDATE operating_weeks SET active = FALSE, archived_at = NOW(), archived_by_cascade = TRUE \
         WHERE season_id = $1 AND active",
        season_id,
    )
    .await?;

    let reception_ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM receptions WHERE season_id = $1 AND active",
    )
    .bind(season_id)
    .fetch_all(&mut **tx)
    .await?;

    for reception_id in reception_ids {
        cascade_archive_reception(tx, reception_id, true, counts).await?;
    }

    counts.order_consumptions += archive_rows(
        tx,
        "UPDATE order_consumptions SET active = FALSE, archived_at = NOW(), archived_by_cascade = TRUE \
         WHERE active AND order_line_id IN ( \
             SELECT ol.id FROM order_lines ol \
             JOIN orders o ON o.id = ol.order_id WHERE o.season_id = $1)",
        season_id,
    )
    .await?;

    counts.order_lines += archive_rows(
        tx,
        "UPDATE order_lines SET active = FALSE, archived_at = NOW(), archived_by_cascade = TRUE \
         WHERE active AND order_id IN (SELECT id FROM orders WHERE season_id = $1)",
        season_id,
    )
    .await?;

    counts.orders += archive_rows(
        tx,
        "UPDATE orders SET active = FALSE, archived_at = NOW(), archived_by_cascade = TRUE \
         WHERE season_id = $1 AND active",
        season_id,
    )
    .await?;

    counts.truck_consumptions += archive_rows(
        tx,
        "UPDATE truck_consumptions SET active = FALSE, archived_at = NOW(), archived_by_cascade = TRUE \
         WHERE active AND truck_id IN (SELECT id FROM trucks WHERE season_id = $1)",
        season_id,
    )
    .await?;

    counts.manifest_items += archive_rows(
        tx,
        "UPDATE truck_manifest_items SET active = FALSE, archived_at = NOW(), archived_by_cascade = TRUE \
         WHERE active AND truck_id IN (SELECT id FROM trucks WHERE season_id = $1)",
        season_id,
    )
    .await?;

    counts.trucks += archive_rows(
        tx,
        "UPDATE trucks SET active = FALSE, archived_at = NOW(), archived_by_cascade = TRUE \
         WHERE season_id = $1 AND active",
        season_id,
    )
    .await?;

    counts.purchases += archive_rows(
        tx,
        "UPDATE purchases SET active = FALSE, archived_at = NOW(), archived_by_cascade = TRUE \
         WHERE season_id = $1 AND active",
        season_id,
    )
    .await?;

    Ok(())
}

/// Archive one reception and its lines. `by_cascade` distinguishes a direct
/// call from one reached through the season walk.
async fn cascade_archive_reception(
    tx: &mut Transaction<'_, Postgres>,
    reception_id: Uuid,
    by_cascade: bool,
    counts: &mut ArchiveCounts,
) -> AppResult<()> {
    counts.receptions += archive_rows(
        tx,
        if by_cascade {
            "UPDATE receptions SET active = FALSE, archived_at = NOW(), archived_by_cascade = TRUE \
             WHERE id = $1 AND active"
        } else {
            "UPDATE receptions SET active = FALSE, archived_at = NOW(), archived_by_cascade = FALSE \
             WHERE id = $1 AND active"
        },
        reception_id,
    )
    .await?;

    counts.classification_lines += archive_rows(
        tx,
        "UPDATE classification_lines \
         SET active = FALSE, archived_at = NOW(), archived_by_cascade = TRUE \
         WHERE reception_id = $1 AND active",
        reception_id,
    )
    .await?;

    Ok(())
}

/// Depth-first restore of a season subtree. Only rows flagged
/// `archived_by_cascade` are reactivated below the entry point.
async fn cascade_restore_season(
    tx: &mut Transaction<'_, Postgres>,
    season_id: Uuid,
    via_cascade: bool,
    counts: &mut ArchiveCounts,
) -> AppResult<()> {
    counts.seasons += archive_rows(
        tx,
        if via_cascade {
            "UPDATE seasons SET active = TRUE, archived_at = NULL, archived_by_cascade = FALSE \
             WHERE id = $1 AND NOT active AND archived_by_cascade"
        } else {
            "UPDATE seasons SET active = TRUE, archived_at = NULL, archived_by_cascade = FALSE \
             WHERE id = $1 AND NOT active"
        },
        season_id,
    )
    .await?;

    counts.weeks += archive_rows(
        tx,
        "UPDATE operating_weeks SET active = TRUE, archived_at = NULL, archived_by_cascade = FALSE \
         WHERE season_id = $1 AND NOT active AND archived_by_cascade",
        season_id,
    )
    .await?;

    counts.receptions += archive_rows(
        tx,
        "UPDATE receptions SET active = TRUE, archived_at = NULL, archived_by_cascade = FALSE \
         WHERE season_id = $1 AND NOT active AND archived_by_cascade",
        season_id,
    )
    .await?;

    counts.classification_lines += archive_rows(
        tx,
        "UPDATE classification_lines \
         SET active = TRUE, archived_at = NULL, archived_by_cascade = FALSE \
         WHERE season_id = $1 AND NOT active AND archived_by_cascade \
           AND reception_id IN (SELECT id FROM receptions WHERE season_id = $1 AND active)",
        season_id,
    )
    .await?;

    counts.order_consumptions += archive_rows(
        tx,
        "UPDATE order_consumptions SET active = TRUE, archived_at = NULL, archived_by_cascade = FALSE \
         WHERE NOT active AND archived_by_cascade AND order_line_id IN ( \
             SELECT ol.id FROM order_lines ol \
             JOIN orders o ON o.id = ol.order_id WHERE o.season_id = $1)",
        season_id,
    )
    .await?;

    counts.order_lines += archive_rows(
        tx,
        "UPDATE order_lines SET active = TRUE, archived_at = NULL, archived_by_cascade = FALSE \
         WHERE NOT active AND archived_by_cascade \
           AND order_id IN (SELECT id FROM orders WHERE season_id = $1)",
        season_id,
    )
    .await?;

    counts.orders += archive_rows(
        tx,
        "UPDATE orders SET active = TRUE, archived_at = NULL, archived_by_cascade = FALSE \
         WHERE season_id = $1 AND NOT active AND archived_by_cascade",
        season_id,
    )
    .await?;

    counts.truck_consumptions += archive_rows(
        tx,
        "UPDATE truck_consumptions SET active = TRUE, archived_at = NULL, archived_by_cascade = FALSE \
         WHERE NOT active AND archived_by_cascade \
           AND truck_id IN (SELECT id FROM trucks WHERE season_id = $1 AND state <> 'void')",
        season_id,
    )
    .await?;

    counts.manifest_items += archive_rows(
        tx,
        "UPDATE truck_manifest_items SET active = TRUE, archived_at = NULL, archived_by_cascade = FALSE \
         WHERE NOT active AND archived_by_cascade \
           AND truck_id IN (SELECT id FROM trucks WHERE season_id = $1)",
        season_id,
    )
    .await?;

    counts.trucks += archive_rows(
        tx,
        "UPDATE trucks SET active = TRUE, archived_at = NULL, archived_by_cascade = FALSE \
         WHERE season_id = $1 AND NOT active AND archived_by_cascade",
        season_id,
    )
    .await?;

    counts.purchases += archive_rows(
        tx,
        "UPDATE purchases SET active = TRUE, archived_at = NULL, archived_by_cascade = FALSE \
         WHERE season_id = $1 AND NOT active AND archived_by_cascade",
        season_id,
    )
    .await?;

    Ok(())
}
