// Reading ingest front door entry point
//
// Thin writer ahead of the readings table; the stream fed from that table
// drives the hourly aggregation. Validates one reading per request and
// writes it conditionally so duplicate deliveries stay idempotent.

#[path = "ingest/config.rs"]
mod config;

#[path = "ingest/repo.rs"]
mod repo;

use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use tracing::{error, info};

use config::Config;
use sensor_rollup::error::{error_codes, ErrorResponse};
use sensor_rollup::{hour_bucket, Reading};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Configuration is loaded once here and injected; no lazily-fetched
    // process-global state.
    let config = Config::from_env().await.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        Error::from(format!("Configuration error: {}", e))
    })?;

    run(service_fn(|event: Request| {
        function_handler(event, &config)
    }))
    .await
}

async fn function_handler(event: Request, config: &Config) -> Result<Response<Body>, Error> {
    let request_id = event.lambda_context().request_id.clone();

    info!(
        request_id = %request_id,
        method = %event.method(),
        path = %event.uri().path(),
        "Ingest Lambda invoked"
    );

    if event.method() == lambda_http::http::Method::GET && event.uri().path() == "/health" {
        return json_response(200, r#"{"status":"ok"}"#.to_string());
    }

    if event.method() != lambda_http::http::Method::POST || event.uri().path() != "/readings" {
        return error_response(404, error_codes::NOT_FOUND, "Unknown route", &request_id);
    }

    let reading: Reading = match serde_json::from_slice(event.body().as_ref()) {
        Ok(reading) => reading,
        Err(e) => {
            return error_response(
                400,
                error_codes::INVALID_FORMAT,
                &format!("Invalid request body: {}", e),
                &request_id,
            );
        }
    };

    if let Err((code, message)) = validate_reading(&reading) {
        return error_response(400, code, message, &request_id);
    }

    match repo::put_reading_if_new(&config.dynamodb_client, &config.readings_table, &reading).await
    {
        Ok(created) => {
            info!(
                request_id = %request_id,
                sensor_id = %reading.sensor_id,
                created,
                "Reading accepted"
            );
            let status = if created { 201 } else { 200 };
            json_response(status, format!(r#"{{"created":{}}}"#, created))
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Failed to write reading");
            error_response(
                500,
                error_codes::DATABASE_ERROR,
                "Internal database error occurred",
                &request_id,
            )
        }
    }
}

/// Shape checks for an inbound reading. Returns the stable error code and a
/// human-readable message for the first violation.
fn validate_reading(reading: &Reading) -> Result<(), (&'static str, &'static str)> {
    if reading.sensor_id.is_empty() {
        return Err((error_codes::MISSING_FIELD, "sensor_id must be non-empty"));
    }
    if reading.sensor_type.is_empty() {
        return Err((error_codes::MISSING_FIELD, "type must be non-empty"));
    }
    if reading.location.is_empty() {
        return Err((error_codes::MISSING_FIELD, "location must be non-empty"));
    }
    if !reading.value.is_finite() {
        return Err((error_codes::INVALID_VALUE, "value must be a finite number"));
    }
    if hour_bucket(&reading.timestamp).is_err() {
        return Err((
            error_codes::INVALID_TIMESTAMP,
            "timestamp must be a valid ISO-8601 timestamp",
        ));
    }
    Ok(())
}

fn json_response(status: u16, body: String) -> Result<Response<Body>, Error> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .map_err(Box::new)
        .map_err(Error::from)
}

fn error_response(
    status: u16,
    code: &str,
    message: &str,
    request_id: &str,
) -> Result<Response<Body>, Error> {
    let payload = ErrorResponse::new(code, message, request_id);
    let body = payload.to_json().unwrap_or_else(|_| {
        r#"{"error":"INTERNAL_ERROR","message":"Failed to serialize error response","request_id":""}"#
            .to_string()
    });
    json_response(status, body)
}
