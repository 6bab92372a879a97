use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Open the configured database and create the schema if needed.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes on an open pool. Safe to run repeatedly.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            ean_code TEXT NOT NULL,
            title TEXT NOT NULL,
            brand TEXT NOT NULL,
            model TEXT NOT NULL,
            color TEXT NOT NULL,
            category TEXT NOT NULL,
            price REAL,
            description TEXT NOT NULL,
            characteristics_json TEXT NOT NULL DEFAULT '{}',
            sizes_json TEXT NOT NULL DEFAULT '[]',
            weight_json TEXT NOT NULL DEFAULT '{}',
            images_json TEXT NOT NULL DEFAULT '[]',
            search_source TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_sheets (
            id TEXT PRIMARY KEY,
            product_id TEXT NOT NULL,
            title TEXT NOT NULL,
            reference TEXT NOT NULL,
            color_code TEXT NOT NULL,
            price_ttc REAL NOT NULL,
            description TEXT NOT NULL,
            characteristics_json TEXT NOT NULL DEFAULT '{}',
            variants_json TEXT NOT NULL DEFAULT '[]',
            weight_info_json TEXT NOT NULL DEFAULT '{}',
            seo_title TEXT NOT NULL,
            seo_description TEXT NOT NULL,
            associated_json TEXT NOT NULL DEFAULT '[]',
            export_json TEXT NOT NULL DEFAULT '{}',
            status TEXT NOT NULL DEFAULT 'draft',
            created_at INTEGER NOT NULL,
            FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Append-only audit log, never read back by the pipeline.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS product_searches (
            id TEXT PRIMARY KEY,
            ean_code TEXT NOT NULL,
            search_query TEXT NOT NULL,
            results_json TEXT NOT NULL DEFAULT '[]',
            evidence_json TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_ean ON products(ean_code)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_category ON products(category)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_products_created_at ON products(created_at DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sheets_product_id ON product_sheets(product_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sheets_status ON product_sheets(status)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_searches_ean ON product_searches(ean_code)")
        .execute(pool)
        .await?;

    Ok(())
}
