//! Live MongoDB target

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{Error as DriverError, ErrorKind};
use mongodb::options::{ClientOptions, IndexOptions as DriverIndexOptions};
use mongodb::{Client, Database, IndexModel};

use super::errors::{TargetError, TargetResult};
use super::SchemaTarget;
use crate::manifest::{default_index_name, Direction, IndexDefinition, IndexField, IndexOptions, IndexSpec};

/// Server error codes the target interprets
mod codes {
    pub const UNAUTHORIZED: i32 = 13;
    pub const AUTHENTICATION_FAILED: i32 = 18;
    pub const NAMESPACE_NOT_FOUND: i32 = 26;
    pub const NAMESPACE_EXISTS: i32 = 48;
    pub const INDEX_ALREADY_EXISTS: i32 = 68;
    pub const INDEX_OPTIONS_CONFLICT: i32 = 85;
    pub const INDEX_KEY_SPECS_CONFLICT: i32 = 86;
}

/// A database on a MongoDB deployment
pub struct MongoTarget {
    client: Client,
    database: Database,
}

impl MongoTarget {
    /// Builds a client from options. No connection is made until the first
    /// operation.
    pub fn new(options: ClientOptions, database: &str) -> TargetResult<Self> {
        let client = Client::with_options(options).map_err(map_driver_error)?;
        Ok(Self::from_client(client, database))
    }

    /// Selects a database on an existing client
    pub fn from_client(client: Client, database: &str) -> Self {
        let database = client.database(database);
        Self { client, database }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl SchemaTarget for MongoTarget {
    fn database_name(&self) -> &str {
        self.database.name()
    }

    async fn ping(&self) -> TargetResult<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(map_driver_error)
    }

    async fn list_collections(&self) -> TargetResult<Vec<String>> {
        self.database
            .list_collection_names()
            .await
            .map_err(map_driver_error)
    }

    async fn create_collection(&self, name: &str) -> TargetResult<()> {
        match self.database.create_collection(name).await {
            Ok(()) => Ok(()),
            Err(e) if command_code(&e) == Some(codes::NAMESPACE_EXISTS) => Ok(()),
            Err(e) => Err(map_driver_error(e)),
        }
    }

    async fn list_indexes(&self, collection: &str) -> TargetResult<Vec<IndexDefinition>> {
        let cursor = match self
            .database
            .collection::<Document>(collection)
            .list_indexes()
            .await
        {
            Ok(cursor) => cursor,
            Err(e) if command_code(&e) == Some(codes::NAMESPACE_NOT_FOUND) => {
                return Ok(Vec::new())
            }
            Err(e) => return Err(map_driver_error(e)),
        };

        let models: Vec<IndexModel> = cursor.try_collect().await.map_err(map_driver_error)?;
        models.iter().map(definition_from_model).collect()
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> TargetResult<()> {
        let result = self
            .database
            .collection::<Document>(collection)
            .create_index(model_from_spec(index))
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match e.kind.as_ref() {
                ErrorKind::Command(cmd)
                    if matches!(
                        cmd.code,
                        codes::INDEX_ALREADY_EXISTS
                            | codes::INDEX_OPTIONS_CONFLICT
                            | codes::INDEX_KEY_SPECS_CONFLICT
                    ) =>
                {
                    Err(TargetError::IndexConflict {
                        collection: collection.to_string(),
                        index: index.name(),
                        message: cmd.message.clone(),
                    })
                }
                _ => Err(map_driver_error(e)),
            },
        }
    }
}

/// Builds the driver model for a declared index. Options left at their
/// defaults are omitted so the stored spec matches what a shell would create.
fn model_from_spec(spec: &IndexSpec) -> IndexModel {
    let mut keys = Document::new();
    for key in &spec.keys {
        match key.direction.as_i32() {
            Some(direction) => keys.insert(key.field.clone(), direction),
            None => keys.insert(key.field.clone(), key.direction.to_string()),
        };
    }

    let options = DriverIndexOptions::builder()
        .name(spec.name())
        .unique(spec.options.unique.then_some(true))
        .sparse(spec.options.sparse.then_some(true))
        .build();

    IndexModel::builder().keys(keys).options(options).build()
}

/// Listed options already carried by the definition, or that never change
/// which documents an index admits
const UNCOMPARED_OPTIONS: &[&str] = &["name", "unique", "sparse", "v", "key", "ns", "background"];

fn definition_from_model(model: &IndexModel) -> TargetResult<IndexDefinition> {
    let keys: Vec<IndexField> = model
        .keys
        .iter()
        .map(|(field, value)| IndexField {
            field: field.clone(),
            direction: direction_from_bson(value),
        })
        .collect();

    let options = model.options.as_ref();
    let name = options
        .and_then(|o| o.name.clone())
        .unwrap_or_else(|| default_index_name(&keys));
    let extra = match options {
        Some(o) => extra_options(o)?,
        None => BTreeMap::new(),
    };

    Ok(IndexDefinition {
        name,
        keys,
        options: IndexOptions {
            unique: options.and_then(|o| o.unique).unwrap_or(false),
            sparse: options.and_then(|o| o.sparse).unwrap_or(false),
        },
        extra,
    })
}

/// Every listed option outside [`UNCOMPARED_OPTIONS`]. A `false` flag is the
/// server default and is dropped.
fn extra_options(options: &DriverIndexOptions) -> TargetResult<BTreeMap<String, serde_json::Value>> {
    let raw = mongodb::bson::to_document(options).map_err(|e| TargetError::Server {
        code: 0,
        code_name: "IndexOptionsUnreadable".to_string(),
        message: e.to_string(),
    })?;

    Ok(raw
        .into_iter()
        .filter(|(option, value)| {
            !UNCOMPARED_OPTIONS.contains(&option.as_str()) && *value != Bson::Boolean(false)
        })
        .map(|(option, value)| (option, value.into_relaxed_extjson()))
        .collect())
}

fn direction_from_bson(value: &Bson) -> Direction {
    let number = match value {
        Bson::Int32(i) => Some(*i as f64),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    };

    match (number.and_then(Direction::from_number), value) {
        (Some(direction), _) => direction,
        (None, Bson::String(kind)) => Direction::Special(kind.clone()),
        (None, other) => Direction::Special(other.to_string()),
    }
}

fn command_code(err: &DriverError) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(cmd) => Some(cmd.code),
        _ => None,
    }
}

/// Maps a driver error into the target taxonomy
fn map_driver_error(err: DriverError) -> TargetError {
    match err.kind.as_ref() {
        ErrorKind::ServerSelection { message, .. }
        | ErrorKind::DnsResolve { message, .. }
        | ErrorKind::ConnectionPoolCleared { message, .. } => {
            TargetError::Unreachable(message.clone())
        }
        ErrorKind::Io(io) => TargetError::Unreachable(io.to_string()),
        ErrorKind::Authentication { message, .. } => TargetError::PermissionDenied(message.clone()),
        ErrorKind::InvalidArgument { message, .. } => TargetError::InvalidRequest(message.clone()),
        ErrorKind::Command(cmd)
            if cmd.code == codes::UNAUTHORIZED || cmd.code == codes::AUTHENTICATION_FAILED =>
        {
            TargetError::PermissionDenied(cmd.message.clone())
        }
        ErrorKind::Command(cmd) => TargetError::Server {
            code: cmd.code,
            code_name: cmd.code_name.clone(),
            message: cmd.message.clone(),
        },
        _ => TargetError::Server {
            code: 0,
            code_name: "DriverError".to_string(),
            message: err.to_string(),
        },
    }
}
