use lambda_http::{run, service_fn, tracing, Error};
use shared::{Config, DynamoTable};
mod http_handler;
use http_handler::function_handler;

fn main() -> Result<(), Error> {
    // REST API proxy paths carry the stage name unless told otherwise.
    // Set before the runtime starts so no other thread reads the environment.
    if std::env::var_os("AWS_LAMBDA_HTTP_IGNORE_STAGE_IN_PATH").is_none() {
        std::env::set_var("AWS_LAMBDA_HTTP_IGNORE_STAGE_IN_PATH", "true");
    }
    serve()
}

#[tokio::main]
async fn serve() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = Config::from_env()?;
    let table = DynamoTable::connect(&config).await;
    tracing::info!(
        table = table.table_name(),
        index = table.index_name(),
        "starting echo handler"
    );

    run(service_fn(|event| function_handler(&table, event))).await
}
