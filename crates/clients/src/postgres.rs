use std::env;

use sadam_common::define_module_client;
use sqlx::PgPool;

define_module_client! {
    (struct PostgresClient, "postgres")
    client_type: PgPool,
    env: ["DATABASE_URL"],
    setup: async {
        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL is not set");
        PgPool::connect(&database_url).await
            .expect("failed to connect to postgres")
    }
}
