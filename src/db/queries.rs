use crate::models::{
    AgentMappingRecord, NewSkuMapping, SalesSummaryRow, SkuMapping, UploadRecord, UploadRow,
    User, UserRow, UserStatus, UserTemplate,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

/// 单条 INSERT 的最大行数 (绑定参数上限 65535)
const INSERT_CHUNK: usize = 1000;

// ================= SKU 映射 =================

pub async fn list_sku_mappings(pool: &PgPool) -> Result<Vec<SkuMapping>, sqlx::Error> {
    sqlx::query_as::<_, SkuMapping>(
        r#"
        SELECT id, market_sku, variant_description, created_at, created_by
        FROM sku_mapping
        ORDER BY market_sku ASC
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn insert_sku_mapping(
    pool: &PgPool,
    new: &NewSkuMapping,
    created_by: Option<Uuid>,
) -> Result<SkuMapping, sqlx::Error> {
    sqlx::query_as::<_, SkuMapping>(
        r#"
        INSERT INTO sku_mapping (id, market_sku, variant_description, created_by)
        VALUES ($1, $2, $3, $4)
        RETURNING id, market_sku, variant_description, created_at, created_by
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&new.market_sku)
    .bind(&new.variant_description)
    .bind(created_by)
    .fetch_one(pool)
    .await
}

pub async fn update_sku_mapping(
    pool: &PgPool,
    id: Uuid,
    patch: &NewSkuMapping,
) -> Result<Option<SkuMapping>, sqlx::Error> {
    sqlx::query_as::<_, SkuMapping>(
        r#"
        UPDATE sku_mapping
        SET market_sku = $2, variant_description = $3
        WHERE id = $1
        RETURNING id, market_sku, variant_description, created_at, created_by
        "#,
    )
    .bind(id)
    .bind(&patch.market_sku)
    .bind(&patch.variant_description)
    .fetch_optional(pool)
    .await
}

pub async fn delete_sku_mapping(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sku_mapping WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// 在一个事务中清空并重写映射表
pub async fn replace_sku_mappings(
    pool: &PgPool,
    rows: &[NewSkuMapping],
    created_by: Option<Uuid>,
) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let deleted = sqlx::query("DELETE FROM sku_mapping").execute(&mut *tx).await?;
    tracing::info!("Cleared {} existing SKU mappings", deleted.rows_affected());

    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO sku_mapping (id, market_sku, variant_description, created_by) ",
        );
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(Uuid::new_v4())
                .push_bind(&row.market_sku)
                .push_bind(&row.variant_description)
                .push_bind(created_by);
        });
        builder.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(rows.len())
}

// ================= 用户 =================

pub async fn list_users(pool: &PgPool) -> Result<Vec<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, username, role, status, created_at, updated_at
        FROM users
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, username, role, status, created_at, updated_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_user(pool: &PgPool, user: &User) -> Result<UserRow, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users (id, username, role, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, username, role, status, created_at, updated_at
        "#,
    )
    .bind(user.id)
    .bind(&user.username)
    .bind(user.role.to_string())
    .bind(user.status.to_string())
    .bind(user.created_at)
    .bind(user.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn set_user_status(
    pool: &PgPool,
    id: Uuid,
    status: UserStatus,
) -> Result<Option<UserRow>, sqlx::Error> {
    sqlx::query_as::<_, UserRow>(
        r#"
        UPDATE users
        SET status = $2, updated_at = now()
        WHERE id = $1
        RETURNING id, username, role, status, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(status.to_string())
    .fetch_optional(pool)
    .await
}

// ================= 模板 =================

pub async fn latest_template(pool: &PgPool, user_id: Uuid) -> Result<Option<UserTemplate>, sqlx::Error> {
    sqlx::query_as::<_, UserTemplate>(
        r#"
        SELECT id, user_id, file_name, file_path, upload_date
        FROM user_templates
        WHERE user_id = $1
        ORDER BY upload_date DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_template(pool: &PgPool, template: &UserTemplate) -> Result<UserTemplate, sqlx::Error> {
    sqlx::query_as::<_, UserTemplate>(
        r#"
        INSERT INTO user_templates (id, user_id, file_name, file_path, upload_date)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, user_id, file_name, file_path, upload_date
        "#,
    )
    .bind(template.id)
    .bind(template.user_id)
    .bind(&template.file_name)
    .bind(&template.file_path)
    .bind(template.upload_date)
    .fetch_one(pool)
    .await
}

// ================= 上传历史 =================

const UPLOAD_COLUMNS: &str = "id, user_id, sales_file_name, template_file_name, output_file_name, \
                              output_file_path, upload_date, status, error_message";

pub async fn create_upload(pool: &PgPool, record: &UploadRecord) -> Result<UploadRow, sqlx::Error> {
    sqlx::query_as::<_, UploadRow>(&format!(
        r#"
        INSERT INTO upload_history ({UPLOAD_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {UPLOAD_COLUMNS}
        "#
    ))
    .bind(record.id)
    .bind(record.user_id)
    .bind(&record.sales_file_name)
    .bind(&record.template_file_name)
    .bind(&record.output_file_name)
    .bind(&record.output_file_path)
    .bind(record.upload_date)
    .bind(record.status.to_string())
    .bind(&record.error_message)
    .fetch_one(pool)
    .await
}

pub async fn complete_upload(pool: &PgPool, id: Uuid, output_file_path: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE upload_history
        SET status = 'completed', output_file_path = $2, error_message = NULL
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(output_file_path)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fail_upload(pool: &PgPool, id: Uuid, message: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE upload_history
        SET status = 'failed', error_message = $2
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(message)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_upload(pool: &PgPool, id: Uuid) -> Result<Option<UploadRow>, sqlx::Error> {
    sqlx::query_as::<_, UploadRow>(&format!(
        "SELECT {UPLOAD_COLUMNS} FROM upload_history WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_uploads(pool: &PgPool, user_id: Uuid) -> Result<Vec<UploadRow>, sqlx::Error> {
    sqlx::query_as::<_, UploadRow>(&format!(
        "SELECT {UPLOAD_COLUMNS} FROM upload_history WHERE user_id = $1 ORDER BY upload_date DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// 汇总与业务员映射通过外键 ON DELETE CASCADE 一并删除
pub async fn delete_uploads(pool: &PgPool, ids: &[Uuid]) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM upload_history WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn insert_sales_summary(pool: &PgPool, rows: &[SalesSummaryRow]) -> Result<(), sqlx::Error> {
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO sales_summary (upload_id, ds_name, market_sku, total_qty) ");
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(row.upload_id)
                .push_bind(&row.agent_name)
                .push_bind(&row.market_sku)
                .push_bind(row.total_qty.clone());
        });
        builder.build().execute(pool).await?;
    }
    tracing::debug!("Inserted {} sales summary rows", rows.len());
    Ok(())
}

pub async fn list_sales_summary(pool: &PgPool, upload_id: Uuid) -> Result<Vec<SalesSummaryRow>, sqlx::Error> {
    sqlx::query_as::<_, SalesSummaryRow>(
        r#"
        SELECT upload_id, ds_name AS agent_name, market_sku, total_qty
        FROM sales_summary
        WHERE upload_id = $1
        ORDER BY ds_name, market_sku
        "#,
    )
    .bind(upload_id)
    .fetch_all(pool)
    .await
}

pub async fn insert_agent_mappings(pool: &PgPool, rows: &[AgentMappingRecord]) -> Result<(), sqlx::Error> {
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO salesman_mapping (upload_id, ds_name, surveyor_name, created_at) ",
        );
        builder.push_values(chunk, |mut b, row| {
            b.push_bind(row.upload_id)
                .push_bind(&row.agent_name)
                .push_bind(&row.surveyor_name)
                .push_bind(row.created_at);
        });
        builder.build().execute(pool).await?;
    }
    Ok(())
}

pub async fn list_agent_mappings(pool: &PgPool, upload_id: Uuid) -> Result<Vec<AgentMappingRecord>, sqlx::Error> {
    sqlx::query_as::<_, AgentMappingRecord>(
        r#"
        SELECT upload_id, ds_name AS agent_name, surveyor_name, created_at
        FROM salesman_mapping
        WHERE upload_id = $1
        ORDER BY ds_name
        "#,
    )
    .bind(upload_id)
    .fetch_all(pool)
    .await
}

/// 每个业务员最近一次的 SURVEYOR
pub async fn agent_history(pool: &PgPool, agent_names: &[String]) -> Result<Vec<(String, String)>, sqlx::Error> {
    sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT DISTINCT ON (ds_name) ds_name, surveyor_name
        FROM salesman_mapping
        WHERE ds_name = ANY($1)
        ORDER BY ds_name, created_at DESC
        "#,
    )
    .bind(agent_names)
    .fetch_all(pool)
    .await
}
