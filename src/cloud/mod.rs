pub mod models;
pub mod repositories;
pub mod schema;

use diesel_async::pooled_connection::bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

use crate::error::{DaemonError, DaemonResult};

const MIN_POOL_SIZE: u32 = 5;
const MAX_POOL_SIZE: u32 = 20;

/// Pooled client to the central Postgres database (§4.5). All operations
/// are typed repository calls, never a generic `execute(sql) -> rows|ok`
/// dispatch surface.
pub struct CloudStore {
    pool: Pool<AsyncPgConnection>,
}

impl CloudStore {
    pub async fn connect(database_url: &str) -> DaemonResult<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder()
            .min_idle(Some(MIN_POOL_SIZE))
            .max_size(MAX_POOL_SIZE)
            .build(manager)
            .await
            .map_err(|e| DaemonError::CloudUnavailable(e.to_string()))?;
        Ok(CloudStore { pool })
    }

    pub async fn conn(
        &self,
    ) -> DaemonResult<diesel_async::pooled_connection::bb8::PooledConnection<'_, AsyncPgConnection>>
    {
        self.pool
            .get()
            .await
            .map_err(|e| DaemonError::CloudUnavailable(e.to_string()))
    }
}
