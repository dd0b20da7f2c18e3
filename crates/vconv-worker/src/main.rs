//! Lambda entry point for the conversion worker.

use lambda_runtime::{service_fn, Error, LambdaEvent};
use tracing::info;

use vconv_models::{InvocationReport, StorageEvent};
use vconv_worker::batch::into_lambda_result;
use vconv_worker::{logging, BatchProcessor, WorkerConfig};

/// Run one batch.
async fn handle_request(
    processor: &BatchProcessor,
    event: LambdaEvent<StorageEvent>,
) -> Result<InvocationReport, Error> {
    info!(
        request_id = %event.context.request_id,
        records = event.payload.records.len(),
        "Received notification batch"
    );

    into_lambda_result(processor.handle(&event.payload).await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    logging::init_tracing(true);

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let processor = BatchProcessor::from_config(config).await?;
    let processor = &processor;

    lambda_runtime::run(service_fn(move |event: LambdaEvent<StorageEvent>| async move {
        handle_request(processor, event).await
    }))
    .await
}
