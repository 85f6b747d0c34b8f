use blobtable::{Config, DynamoStore, IngestError, Ingestor, NotificationEvent, set_up_logger};
use lambda_runtime::{LambdaEvent, service_fn};
use log::{error, info};
use serde_json::{Value, json};
use std::error::Error;
use tokio::sync::OnceCell;

type LambdaError = Box<dyn Error + Send + Sync + 'static>;

static INGESTOR: OnceCell<Ingestor<DynamoStore>> = OnceCell::const_new();

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    set_up_logger(module_path!(), false)?;

    let func = service_fn(function);
    lambda_runtime::run(func).await?;
    Ok(())
}

async fn function(event: LambdaEvent<Value>) -> Result<Value, LambdaError> {
    Ok(handle(&INGESTOR, event.payload, Config::from_env()).await)
}

/// Stores the event and maps the outcome onto an HTTP style response.
async fn handle(
    ingestor: &OnceCell<Ingestor<DynamoStore>>,
    payload: Value,
    config: Config,
) -> Value {
    match store_event(ingestor, payload, config).await {
        Ok(body) => json!({ "statusCode": 200, "body": body }),
        Err(e) => {
            error!("Request failed ({}): {e}", e.kind());
            json!({ "statusCode": 500, "body": e.to_string() })
        }
    }
}

async fn store_event(
    ingestor: &OnceCell<Ingestor<DynamoStore>>,
    payload: Value,
    config: Config,
) -> Result<String, IngestError> {
    let event = NotificationEvent::from_value(payload)?;
    let event_time = event
        .event_time
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();

    info!("Event {} was received at {event_time}", event.topic);

    // Left empty on failure so the next invocation reads the configuration again.
    let ingestor = ingestor
        .get_or_try_init(|| Ingestor::connect(&config))
        .await?;

    ingestor.ingest(&event).await?;

    info!("Event {} was stored at {}", event.topic, chrono::Utc::now().to_rfc3339());

    Ok(format!("Request was processed {event_time}"))
}
