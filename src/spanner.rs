use anyhow::{Context, Result};
use async_trait::async_trait;
use gcloud_gax::grpc::Code;
use gcloud_googleapis::spanner::admin::database::v1::{
    CreateDatabaseRequest, GetDatabaseDdlRequest, GetDatabaseRequest, UpdateDatabaseDdlRequest,
};
use gcloud_googleapis::spanner::admin::instance::v1::{
    CreateInstanceRequest, GetInstanceRequest, Instance,
};
use gcloud_spanner::admin::client::Client as AdminClient;
use gcloud_spanner::admin::AdminClientConfig;
use gcloud_spanner::client::{Client, ClientConfig};
use gcloud_spanner::key::Key;
use gcloud_spanner::mutation::{delete, insert_or_update};
use gcloud_spanner::statement::Statement;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::config::Config;
use crate::expression::UpdateExpression;
use crate::models::{Record, KEY_FIELD};
use crate::store::{cursor_for, cursor_key, ItemStore, ScanPage};

/// `ItemStore` backed by a Cloud Spanner table.
///
/// Each item is one row: the key column plus the full record as a JSON
/// document. Partial updates are read-modify-write with last-writer-wins
/// semantics; there is no conditional write and no transaction spanning
/// records.
#[derive(Clone)]
pub struct SpannerStore {
    inner: Arc<Client>,
    table: String,
}

impl SpannerStore {
    /// Create a new store from configuration.
    ///
    /// The gcloud-spanner library automatically detects the
    /// SPANNER_EMULATOR_HOST environment variable and connects to the
    /// emulator when set, or production Spanner otherwise.
    ///
    /// This function also performs auto-provisioning: it will automatically
    /// create the instance, database, and item table if they don't exist.
    pub async fn from_config(config: &Config) -> Result<Self> {
        auto_provision(config).await?;

        let database_path = format!(
            "projects/{}/instances/{}/databases/{}",
            config.spanner_project, config.spanner_instance, config.spanner_database
        );

        if let Some(emulator_host) = &config.spanner_emulator_host {
            tracing::info!("Connecting to Spanner emulator at: {}", emulator_host);
        } else {
            tracing::info!("Connecting to production Spanner");
        }

        // ClientConfig::default() automatically uses SPANNER_EMULATOR_HOST if set
        let client = Client::new(&database_path, ClientConfig::default())
            .await
            .context("Failed to create Spanner client")?;

        tracing::info!(
            "Successfully connected to Spanner database: {}",
            database_path
        );

        Ok(Self {
            inner: Arc::new(client),
            table: config.table_name.clone(),
        })
    }

    fn record_from_json(item_str: &str) -> Result<Record> {
        let parsed: JsonValue =
            serde_json::from_str(item_str).context("Failed to deserialize stored item")?;
        match parsed {
            JsonValue::Object(record) => Ok(record),
            _ => Err(anyhow::anyhow!("stored item is not a JSON object")),
        }
    }
}

#[async_trait]
impl ItemStore for SpannerStore {
    async fn put(&self, item: Record) -> Result<()> {
        let beaconid = item
            .get(KEY_FIELD)
            .and_then(JsonValue::as_str)
            .context("item is missing its beaconid")?
            .to_string();
        let item_str = serde_json::to_string(&JsonValue::Object(item))
            .context("Failed to serialize item")?;

        let mutation = insert_or_update(&self.table, &[KEY_FIELD, "item"], &[&beaconid, &item_str]);

        self.inner
            .apply(vec![mutation])
            .await
            .context("Failed to write item to Spanner")?;

        tracing::debug!("Wrote item with beaconid: {}", beaconid);
        Ok(())
    }

    async fn get(&self, beaconid: &str) -> Result<Option<Record>> {
        let key = beaconid.to_string();

        let mut statement = Statement::new(format!(
            "SELECT item FROM {} WHERE beaconid = @beaconid",
            self.table
        ));
        statement.add_param("beaconid", &key);

        let mut tx = self
            .inner
            .single()
            .await
            .context("Failed to create read transaction")?;

        let mut result_set = tx
            .query(statement)
            .await
            .context("Failed to query item from Spanner")?;

        if let Some(row) = result_set.next().await? {
            let item_str: String = row.column_by_name("item")?;
            let record = Self::record_from_json(&item_str)?;
            tracing::debug!("Read item with beaconid: {}", beaconid);
            Ok(Some(record))
        } else {
            tracing::debug!("Item not found with beaconid: {}", beaconid);
            Ok(None)
        }
    }

    async fn update(&self, beaconid: &str, expr: &UpdateExpression) -> Result<Option<Record>> {
        // Read-modify-write, last-writer-wins. A concurrent writer between
        // the read and the write loses its changes to ours.
        let Some(mut record) = self.get(beaconid).await? else {
            return Ok(None);
        };

        expr.apply_to(&mut record);
        self.put(record.clone()).await?;

        tracing::debug!("Updated item with beaconid: {}", beaconid);
        Ok(Some(record))
    }

    async fn delete(&self, beaconid: &str) -> Result<()> {
        let key = beaconid.to_string();
        let mutation = delete(&self.table, Key::new(&key));

        self.inner
            .apply(vec![mutation])
            .await
            .context("Failed to delete item from Spanner")?;

        tracing::debug!("Deleted item with beaconid: {}", beaconid);
        Ok(())
    }

    async fn scan(&self, limit: Option<i64>, start_key: Option<&JsonValue>) -> Result<ScanPage> {
        let start_after = start_key.map(cursor_key).transpose()?.map(str::to_owned);

        let mut query = format!("SELECT item FROM {}", self.table);
        if start_after.is_some() {
            query.push_str(" WHERE beaconid > @after");
        }
        query.push_str(" ORDER BY beaconid");
        // Fetch one row beyond the page to learn whether the enumeration
        // is exhausted.
        if let Some(limit) = limit {
            query.push_str(&format!(" LIMIT {}", limit + 1));
        }

        let mut statement = Statement::new(&query);
        if let Some(after) = &start_after {
            statement.add_param("after", after);
        }

        let mut tx = self
            .inner
            .single()
            .await
            .context("Failed to create read transaction for scan")?;

        let mut result_set = tx
            .query(statement)
            .await
            .context("Failed to scan items from Spanner")?;

        let mut items = Vec::new();
        while let Some(row) = result_set.next().await? {
            let item_str: String = row.column_by_name("item")?;
            items.push(Self::record_from_json(&item_str)?);
        }

        let mut last_evaluated_key = None;
        if let Some(limit) = limit {
            if items.len() as i64 > limit {
                items.truncate(limit as usize);
                last_evaluated_key = items
                    .last()
                    .and_then(|record| record.get(KEY_FIELD))
                    .and_then(JsonValue::as_str)
                    .map(cursor_for);
            }
        }

        let count = items.len() as i64;
        tracing::debug!(
            "Scanned {} items (limit: {:?}, resumed: {})",
            count,
            limit,
            start_after.is_some()
        );

        Ok(ScanPage {
            items,
            count,
            scanned_count: count,
            last_evaluated_key,
        })
    }

    async fn health_check(&self) -> Result<()> {
        let statement = Statement::new("SELECT 1");

        let mut tx = self
            .inner
            .single()
            .await
            .context("Failed to create health check transaction")?;

        let mut result_set = tx
            .query(statement)
            .await
            .context("Failed to execute health check query")?;

        if result_set.next().await?.is_some() {
            tracing::debug!("Health check query succeeded");
            Ok(())
        } else {
            Err(anyhow::anyhow!("Health check query returned no results"))
        }
    }
}

/// Automatically provision the Spanner instance, database, and item table.
///
/// This function checks if the configured resources exist and creates them if
/// needed. It's designed to enable zero-setup local development with the
/// emulator.
async fn auto_provision(config: &Config) -> Result<()> {
    tracing::info!("Starting auto-provisioning checks...");

    let admin_client = AdminClient::new(AdminClientConfig::default())
        .await
        .context("Failed to create Spanner admin client")?;

    let project_path = format!("projects/{}", config.spanner_project);
    let instance_path = format!("{}/instances/{}", project_path, config.spanner_instance);
    let database_path = format!("{}/databases/{}", instance_path, config.spanner_database);

    ensure_instance_exists(&admin_client, config, &project_path, &instance_path).await?;
    ensure_database_exists(&admin_client, &instance_path, &database_path).await?;
    ensure_table_exists(&admin_client, &database_path, &config.table_name).await?;

    tracing::info!("Auto-provisioning complete");
    Ok(())
}

/// Ensure the Spanner instance exists, creating it if necessary
async fn ensure_instance_exists(
    admin_client: &AdminClient,
    config: &Config,
    project_path: &str,
    instance_path: &str,
) -> Result<()> {
    let get_request = GetInstanceRequest {
        name: instance_path.to_string(),
        field_mask: None,
    };

    match admin_client.instance().get_instance(get_request, None).await {
        Ok(_) => {
            tracing::info!("Instance already exists: {}", instance_path);
            Ok(())
        }
        Err(status) if status.code() == Code::NotFound => {
            tracing::info!("Instance not found, creating: {}", instance_path);

            // For emulator, use a simple config
            let instance_config = if config.spanner_emulator_host.is_some() {
                format!("{}/instanceConfigs/emulator-config", project_path)
            } else {
                // For production, use a default config (regional-us-central1)
                format!("{}/instanceConfigs/regional-us-central1", project_path)
            };

            let create_request = CreateInstanceRequest {
                parent: project_path.to_string(),
                instance_id: config.spanner_instance.clone(),
                instance: Some(Instance {
                    name: instance_path.to_string(),
                    config: instance_config,
                    display_name: format!("{} instance", config.spanner_instance),
                    node_count: 1,
                    ..Default::default()
                }),
            };

            let mut operation = admin_client
                .instance()
                .create_instance(create_request, None)
                .await
                .context("Failed to start instance creation")?;

            operation
                .wait(None)
                .await
                .context("Failed to create instance")?;

            tracing::info!("Instance created successfully: {}", instance_path);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(
            "Failed to check instance existence: {}",
            e.message()
        )),
    }
}

/// Ensure the Spanner database exists, creating it if necessary
async fn ensure_database_exists(
    admin_client: &AdminClient,
    instance_path: &str,
    database_path: &str,
) -> Result<()> {
    let get_request = GetDatabaseRequest {
        name: database_path.to_string(),
    };

    match admin_client.database().get_database(get_request, None).await {
        Ok(_) => {
            tracing::info!("Database already exists: {}", database_path);
            Ok(())
        }
        Err(status) if status.code() == Code::NotFound => {
            tracing::info!("Database not found, creating: {}", database_path);

            let database_id = database_path
                .split('/')
                .next_back()
                .context("Invalid database path")?;

            let create_request = CreateDatabaseRequest {
                parent: instance_path.to_string(),
                create_statement: format!("CREATE DATABASE `{}`", database_id),
                extra_statements: vec![],
                encryption_config: None,
                database_dialect: 1, // Google Standard SQL
                proto_descriptors: vec![],
            };

            let mut operation = admin_client
                .database()
                .create_database(create_request, None)
                .await
                .context("Failed to start database creation")?;

            operation
                .wait(None)
                .await
                .context("Failed to create database")?;

            tracing::info!("Database created successfully: {}", database_path);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!(
            "Failed to check database existence: {}",
            e.message()
        )),
    }
}

/// Ensure the item table exists, creating it if necessary
async fn ensure_table_exists(
    admin_client: &AdminClient,
    database_path: &str,
    table_name: &str,
) -> Result<()> {
    let get_ddl_request = GetDatabaseDdlRequest {
        database: database_path.to_string(),
    };

    let ddl_response = admin_client
        .database()
        .get_database_ddl(get_ddl_request, None)
        .await
        .context("Failed to get database DDL")?;

    let table_exists = ddl_response.into_inner().statements.iter().any(|stmt| {
        stmt.contains(&format!("CREATE TABLE {}", table_name))
            || stmt.contains(&format!("CREATE TABLE `{}`", table_name))
    });

    if table_exists {
        tracing::info!("Table '{}' already exists", table_name);
        Ok(())
    } else {
        tracing::info!("Table '{}' not found, creating...", table_name);

        let create_table_ddl = format!(
            "CREATE TABLE {} (\n    beaconid STRING(MAX) NOT NULL,\n    item JSON NOT NULL,\n) PRIMARY KEY (beaconid)",
            table_name
        );

        let update_request = UpdateDatabaseDdlRequest {
            database: database_path.to_string(),
            statements: vec![create_table_ddl],
            operation_id: String::new(),
            proto_descriptors: vec![],
            throughput_mode: false,
        };

        let mut operation = admin_client
            .database()
            .update_database_ddl(update_request, None)
            .await
            .context("Failed to start table creation")?;

        operation
            .wait(None)
            .await
            .context("Failed to create table")?;

        tracing::info!("Table '{}' created successfully", table_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression;
    use serde_json::json;

    fn emulator_config(instance: &str, database: &str) -> Config {
        unsafe {
            std::env::set_var("SPANNER_EMULATOR_HOST", "localhost:9010");
        }
        Config {
            spanner_emulator_host: Some("localhost:9010".to_string()),
            spanner_project: "test-project".to_string(),
            spanner_instance: instance.to_string(),
            spanner_database: database.to_string(),
            table_name: "tagalong".to_string(),
            service_port: 3000,
            service_host: "0.0.0.0".to_string(),
        }
    }

    #[tokio::test]
    async fn test_store_creation_with_emulator() {
        let config = emulator_config("store-create-instance", "store-create-db");

        // This will fail if emulator is not running, but that's expected
        // The test verifies that the store creation API works correctly
        let result = SpannerStore::from_config(&config).await;

        unsafe {
            std::env::remove_var("SPANNER_EMULATOR_HOST");
        }

        match result {
            Ok(_) => {
                // Store created successfully - emulator is running
            }
            Err(e) => {
                let error_msg = e.to_string();
                assert!(
                    error_msg.contains("Failed to create Spanner")
                        || error_msg.contains("Failed to start")
                        || error_msg.contains("Failed to check")
                        || error_msg.contains("Failed to get database DDL"),
                    "Error should have context: {}",
                    error_msg
                );
            }
        }
    }

    #[test]
    fn test_store_is_clonable_send_sync() {
        // Required for sharing across Axum handlers
        fn assert_clone<T: Clone>() {}
        fn assert_send_sync<T: Send + Sync>() {}
        assert_clone::<SpannerStore>();
        assert_send_sync::<SpannerStore>();
    }

    #[tokio::test]
    async fn test_auto_provisioning_idempotent() {
        let config = emulator_config("idempotent-test-instance", "idempotent-test-db");

        let result1 = SpannerStore::from_config(&config).await;

        // If the first call succeeded, a second run must succeed too
        if result1.is_ok() {
            let result2 = SpannerStore::from_config(&config).await;
            assert!(
                result2.is_ok(),
                "Second auto-provisioning call should succeed"
            );
        }

        unsafe {
            std::env::remove_var("SPANNER_EMULATOR_HOST");
        }
    }

    #[tokio::test]
    async fn test_crud_round_trip() {
        let config = emulator_config("crud-test-instance", "crud-test-db");

        let store = match SpannerStore::from_config(&config).await {
            Ok(store) => store,
            Err(_) => {
                // Emulator not running
                println!("CRUD test skipped (emulator may not be running)");
                unsafe {
                    std::env::remove_var("SPANNER_EMULATOR_HOST");
                }
                return;
            }
        };

        let item = json!({
            "beaconid": "beacon-1722945600000-abc123xyz",
            "name": "Test Beacon",
            "description": "",
            "createdAt": "2026-08-06T00:00:00.000Z",
            "updatedAt": "2026-08-06T00:00:00.000Z",
            "lat": "40.7128"
        })
        .as_object()
        .cloned()
        .unwrap();

        store.put(item.clone()).await.unwrap();

        let fetched = store
            .get("beacon-1722945600000-abc123xyz")
            .await
            .unwrap()
            .expect("item should exist");
        assert_eq!(fetched, item);

        // Partial update leaves untouched fields intact
        let update_fields = json!({"name": "Renamed"}).as_object().cloned().unwrap();
        let expr =
            expression::compile(&update_fields, KEY_FIELD, "2026-08-07T00:00:00.000Z").unwrap();
        let image = store
            .update("beacon-1722945600000-abc123xyz", &expr)
            .await
            .unwrap()
            .expect("item should exist");
        assert_eq!(image["name"], json!("Renamed"));
        assert_eq!(image["lat"], json!("40.7128"));
        assert_eq!(image["updatedAt"], json!("2026-08-07T00:00:00.000Z"));

        // Update of a missing key reports the absence
        let missing = store.update("nonexistent-id", &expr).await.unwrap();
        assert!(missing.is_none());

        store.delete("beacon-1722945600000-abc123xyz").await.unwrap();
        let gone = store.get("beacon-1722945600000-abc123xyz").await.unwrap();
        assert!(gone.is_none());

        unsafe {
            std::env::remove_var("SPANNER_EMULATOR_HOST");
        }
    }
}
