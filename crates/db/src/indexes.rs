use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Sessions: one row per user, listings sorted by freshness
    create_indexes(
        db,
        "sessions",
        vec![
            index_unique(bson::doc! { "user_id": 1 }),
            index(bson::doc! { "state": 1, "is_online": 1, "updated_at": -1 }),
        ],
    )
    .await?;

    // Users
    create_indexes(db, "users", vec![index_unique(bson::doc! { "uid": 1 })]).await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
