use livecast_config::Settings;
use mongodb::{Client, Database, options::ClientOptions};
use tracing::info;

pub async fn connect(settings: &Settings) -> Result<Database, mongodb::error::Error> {
    let client_options = ClientOptions::parse(settings.db.connection_url()).await?;
    let client = Client::with_options(client_options)?;

    // Verify connection
    client
        .database("admin")
        .run_command(bson::doc! { "ping": 1 })
        .await?;

    info!(db = %settings.db.name, "Connected to MongoDB");

    Ok(client.database(&settings.db.name))
}
