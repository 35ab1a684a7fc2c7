//! Relational repository over a single shared connection
//!
//! All statements go through one connection guarded by an async mutex.
//! Failures are logged at WARN and reads then return empty results, so
//! callers cannot tell a missing item from a database problem.

use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Connection, Row, SqliteConnection};
use tconf_dsl::ConfigMap;
use tconf_migrate::properties::{decode_value_type, type_id, value_to_string};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::item::{ConfigItem, Flag};
use crate::repository::{preferred, ConfigRepository};

pub const TABLE_NAME: &str = "tigase_configuration";

/// Environment variable checked first for the connection string.
pub const CONFIG_REPO_URI_ENV: &str = "TIGASE_CONFIG_REPO_URI";
pub const CONFIG_REPO_URI_INIT_KEY: &str = "--tigase-config-repo-uri";
pub const USER_DB_URI_KEY: &str = "--user-db-uri";

const CREATE_TABLE_QUERY: &str = r#"
    CREATE TABLE tigase_configuration (
        component_name varchar(127) NOT NULL,
        key_name varchar(127) NOT NULL,
        value varchar(8191) NOT NULL,
        cluster_node varchar(255) NOT NULL DEFAULT '',
        key_node varchar(127) NOT NULL DEFAULT '',
        flag varchar(32) NOT NULL DEFAULT 'DEFAULT',
        value_type varchar(8) NOT NULL DEFAULT 'S',
        last_update timestamp,
        PRIMARY KEY (cluster_node, component_name, key_node, key_name, flag)
    )
"#;

const CHECK_TABLE_QUERY: &str = "SELECT count(*) FROM tigase_configuration";

const CLUSTER_NODE_WHERE: &str = "(cluster_node = '' OR cluster_node = ?)";

const ADD_ITEM_QUERY: &str = r#"
    INSERT INTO tigase_configuration
        (cluster_node, component_name, key_node, key_name, value, value_type, flag, last_update)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

const UPDATE_ITEM_QUERY: &str = r#"
    UPDATE tigase_configuration
    SET value = ?, value_type = ?, flag = ?, last_update = ?
    WHERE cluster_node = ? AND component_name = ? AND key_node = ? AND key_name = ?
"#;

const DELETE_ITEM_QUERY: &str = r#"
    DELETE FROM tigase_configuration
    WHERE cluster_node = ? AND component_name = ? AND key_node = ? AND key_name = ?
"#;

pub struct SqlRepository {
    conn: Mutex<SqliteConnection>,
    hostname: Option<String>,
    filter_initial: bool,
}

impl SqlRepository {
    /// Open the database at `uri` and create the table when it is missing.
    pub async fn connect(uri: &str) -> Result<Self> {
        let mut conn = SqliteConnection::connect(uri).await.map_err(|e| {
            error!(uri = %uri, error = %e, "problem connecting to configuration database");
            e
        })?;
        check_db(&mut conn).await?;
        Ok(Self {
            conn: Mutex::new(conn),
            hostname: None,
            filter_initial: true,
        })
    }

    /// Connect using the first connection string found in the environment
    /// variable, `--tigase-config-repo-uri` or `--user-db-uri`.
    pub async fn from_properties(props: &ConfigMap) -> Result<Self> {
        let uri = env::var(CONFIG_REPO_URI_ENV).ok().or_else(|| {
            [CONFIG_REPO_URI_INIT_KEY, USER_DB_URI_KEY]
                .iter()
                .find_map(|key| props.get(*key).and_then(|v| v.as_string()))
        });
        match uri {
            Some(uri) => Self::connect(&uri).await,
            None => {
                error!(
                    "missing configuration database connection string, set {} or provide {} or {}",
                    CONFIG_REPO_URI_ENV, CONFIG_REPO_URI_INIT_KEY, USER_DB_URI_KEY
                );
                Err(Error::MissingUri)
            }
        }
    }

    pub fn with_filter_initial(mut self, filter_initial: bool) -> Self {
        self.filter_initial = filter_initial;
        self
    }

    /// Items changed after `since`, INITIAL ones excluded.
    pub async fn updated_since(&self, since: DateTime<Utc>) -> Vec<ConfigItem> {
        or_warn(
            self.fetch_updated(since).await,
            "Problem getting updated elements from DB",
        )
    }

    async fn fetch_updated(&self, since: DateTime<Utc>) -> Result<Vec<ConfigItem>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} AND flag <> 'INITIAL' AND last_update > ?",
            TABLE_NAME, CLUSTER_NODE_WHERE
        );
        let mut conn = self.conn.lock().await;
        let rows = sqlx::query(&sql)
            .bind(self.host())
            .bind(since)
            .fetch_all(&mut *conn)
            .await?;
        rows.iter().map(item_from_row).collect()
    }

    fn host(&self) -> &str {
        self.hostname.as_deref().unwrap_or("")
    }

    /// Extra condition hiding seeds when the policy asks for it.
    fn visibility_clause(&self) -> &'static str {
        if self.filter_initial {
            " AND flag <> 'INITIAL'"
        } else {
            ""
        }
    }

    async fn fetch_items(&self, sql: &str, binds: &[&str]) -> Result<Vec<ConfigItem>> {
        let mut conn = self.conn.lock().await;
        let mut query = sqlx::query(sql).bind(self.host());
        for value in binds {
            query = query.bind(*value);
        }
        let rows = query.fetch_all(&mut *conn).await?;
        rows.iter().map(item_from_row).collect()
    }

    async fn insert(&self, item: &ConfigItem) -> Result<()> {
        let mut conn = self.conn.lock().await;
        sqlx::query(ADD_ITEM_QUERY)
            .bind(item.cluster_node.as_deref().unwrap_or(""))
            .bind(item.comp_name.as_str())
            .bind(item.node_name.as_deref().unwrap_or(""))
            .bind(item.key_name.as_str())
            .bind(value_to_string(&item.value))
            .bind(type_id(&item.value).to_string())
            .bind(item.flag.as_str())
            .bind(item.last_modified)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Update the row holding `item`: seeds only for seeds, live rows otherwise.
    async fn update(&self, item: &ConfigItem) -> Result<u64> {
        let sql = format!("{}{}", UPDATE_ITEM_QUERY, slot_clause(item.flag));
        let mut conn = self.conn.lock().await;
        let done = sqlx::query(&sql)
            .bind(value_to_string(&item.value))
            .bind(type_id(&item.value).to_string())
            .bind(item.flag.as_str())
            .bind(item.last_modified)
            .bind(item.cluster_node.as_deref().unwrap_or(""))
            .bind(item.comp_name.as_str())
            .bind(item.node_name.as_deref().unwrap_or(""))
            .bind(item.key_name.as_str())
            .execute(&mut *conn)
            .await?;
        Ok(done.rows_affected())
    }

    async fn delete(&self, item: &ConfigItem) -> Result<()> {
        let sql = format!("{}{}", DELETE_ITEM_QUERY, slot_clause(item.flag));
        let mut conn = self.conn.lock().await;
        sqlx::query(&sql)
            .bind(item.cluster_node.as_deref().unwrap_or(""))
            .bind(item.comp_name.as_str())
            .bind(item.node_name.as_deref().unwrap_or(""))
            .bind(item.key_name.as_str())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn fetch_strings(&self, sql: &str, column: &str, binds: &[&str]) -> Result<Vec<String>> {
        let mut conn = self.conn.lock().await;
        let mut query = sqlx::query(sql).bind(self.host());
        for value in binds {
            query = query.bind(*value);
        }
        let rows = query.fetch_all(&mut *conn).await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>(column).map_err(Error::from))
            .collect()
    }

    async fn count(&self) -> Result<i64> {
        let sql = format!(
            "SELECT count(*) AS count FROM {} WHERE {}{}",
            TABLE_NAME,
            CLUSTER_NODE_WHERE,
            self.visibility_clause()
        );
        let mut conn = self.conn.lock().await;
        let row = sqlx::query(&sql).bind(self.host()).fetch_one(&mut *conn).await?;
        Ok(row.try_get("count")?)
    }
}

/// Seeds and live rows of one tuple are separate rows.
fn slot_clause(flag: Flag) -> &'static str {
    if flag == Flag::Initial {
        " AND flag = 'INITIAL'"
    } else {
        " AND flag <> 'INITIAL'"
    }
}

fn or_warn<T: Default>(result: Result<T>, message: &str) -> T {
    result.unwrap_or_else(|e| {
        warn!(error = %e, "{}", message);
        T::default()
    })
}

async fn check_db(conn: &mut SqliteConnection) -> Result<()> {
    match sqlx::query(CHECK_TABLE_QUERY).fetch_one(&mut *conn).await {
        Ok(row) => {
            let count: i64 = row.try_get(0)?;
            info!(items = count, "configuration database OK");
        }
        Err(e) => {
            debug!(error = %e, "configuration table check failed");
            info!("configuration database is not OK, creating missing tables");
            sqlx::query(CREATE_TABLE_QUERY).execute(&mut *conn).await?;
            info!("configuration database created OK");
        }
    }
    Ok(())
}

fn item_from_row(row: &SqliteRow) -> Result<ConfigItem> {
    let cluster_node: String = row.try_get("cluster_node")?;
    let comp: String = row.try_get("component_name")?;
    let node: String = row.try_get("key_node")?;
    let key: String = row.try_get("key_name")?;
    let value: String = row.try_get("value")?;
    let value_type: String = row.try_get("value_type")?;
    let flag: String = row.try_get("flag")?;

    let letter = value_type.chars().next().unwrap_or('S');
    let value = decode_value_type(letter, &value)?;
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

    let mut item = ConfigItem::new(comp, non_empty(&node).as_deref(), key, value)
        .with_flag(Flag::parse_lenient(&flag));
    item.cluster_node = non_empty(&cluster_node);
    if let Ok(Some(updated)) = row.try_get::<Option<DateTime<Utc>>, _>("last_update") {
        item.last_modified = updated;
    }
    Ok(item)
}

#[async_trait]
impl ConfigRepository for SqlRepository {
    fn filter_initial(&self) -> bool {
        self.filter_initial
    }

    fn def_hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    fn set_def_hostname(&mut self, hostname: Option<String>) {
        self.hostname = hostname;
    }

    async fn items_for_component(&self, comp: &str) -> Vec<ConfigItem> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} AND component_name = ?{}",
            TABLE_NAME,
            CLUSTER_NODE_WHERE,
            self.visibility_clause()
        );
        let result = self.fetch_items(&sql, &[comp]).await;
        or_warn(result, "Problem getting elements from DB")
    }

    async fn get_item(&self, comp: &str, node: Option<&str>, key: &str) -> Option<ConfigItem> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} AND component_name = ? AND key_node = ? AND key_name = ?{}",
            TABLE_NAME,
            CLUSTER_NODE_WHERE,
            self.visibility_clause()
        );
        let result = self.fetch_items(&sql, &[comp, node.unwrap_or(""), key]).await;
        let items = or_warn(result, "Problem getting elements from DB");
        preferred(&items).cloned()
    }

    async fn add_item(&self, item: ConfigItem) {
        if let Err(insert_error) = self.insert(&item).await {
            debug!(error = %insert_error, item = %item, "insert failed, updating");
            if let Err(e) = self.update(&item).await {
                warn!(
                    error = %e,
                    item = %item.to_property_string(),
                    "Problem adding/updating an item to DB"
                );
            }
        }
    }

    async fn update_item(&self, item: &ConfigItem) {
        match self.update(item).await {
            Ok(0) => self.add_item(item.clone()).await,
            Ok(_) => {}
            Err(e) => warn!(
                error = %e,
                item = %item.to_property_string(),
                "Problem updating an item in DB"
            ),
        }
    }

    async fn remove_item(&self, item: &ConfigItem) {
        if let Err(e) = self.delete(item).await {
            warn!(error = %e, item = %item, "Problem removing an item from DB");
        }
    }

    async fn comp_names(&self) -> Vec<String> {
        let sql = format!(
            "SELECT DISTINCT component_name FROM {} WHERE {}{} ORDER BY component_name",
            TABLE_NAME,
            CLUSTER_NODE_WHERE,
            self.visibility_clause()
        );
        let result = self.fetch_strings(&sql, "component_name", &[]).await;
        or_warn(result, "Problem getting component names from DB")
    }

    async fn keys(&self, comp: &str, node: Option<&str>) -> Vec<String> {
        let sql = format!(
            "SELECT DISTINCT key_name FROM {} WHERE {} AND component_name = ? AND key_node = ?{}",
            TABLE_NAME,
            CLUSTER_NODE_WHERE,
            self.visibility_clause()
        );
        let result = self
            .fetch_strings(&sql, "key_name", &[comp, node.unwrap_or("")])
            .await;
        or_warn(result, "Problem getting keys from DB")
    }

    async fn size(&self) -> usize {
        let count = self.count().await;
        let count = or_warn(count, "Problem getting elements count from DB");
        usize::try_from(count).unwrap_or_default()
    }

    async fn all_items(&self) -> Vec<ConfigItem> {
        let sql = format!(
            "SELECT * FROM {} WHERE {}{}",
            TABLE_NAME,
            CLUSTER_NODE_WHERE,
            self.visibility_clause()
        );
        let result = self.fetch_items(&sql, &[]).await;
        or_warn(result, "Problem getting elements from DB")
    }
}
