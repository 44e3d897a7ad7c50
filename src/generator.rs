//! Batch generation loop
//!
//! Mints the requested number of promotion codes one at a time, reporting
//! progress after each code and flushing a partial spreadsheet every
//! [`CHUNK_SIZE`] codes. Cancellation is a flag polled once per iteration,
//! so a cancel takes effect before the next API call, never during one.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info};

use crate::error::AppError;
use crate::export::{encode_file, final_file_name, partial_file_name};
use crate::model::{CodeBatch, GenerationRequest, ServerMessage};
use crate::stripe::{build_params, PromotionCodes};

/// Number of codes per partial export
pub const CHUNK_SIZE: u64 = 4000;

/// How a generation job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Cancelled,
    Failed,
    /// The receiving side of the channel went away
    Disconnected,
}

/// Why a job stopped before reaching the end of the loop
enum Stop {
    Failed(AppError),
    /// Outbound channel closed; the connection is gone
    Disconnected,
}

impl From<AppError> for Stop {
    fn from(e: AppError) -> Self {
        Stop::Failed(e)
    }
}

fn send(tx: &UnboundedSender<ServerMessage>, msg: ServerMessage) -> Result<(), Stop> {
    tx.send(msg).map_err(|_| Stop::Disconnected)
}

/// Runs one generation job to completion, cancellation or first error.
///
/// Every outcome except [`JobOutcome::Disconnected`] ends with exactly one
/// terminal message on `tx`: `GENERATION_COMPLETE`, `GENERATION_CANCELLED`
/// or `ERROR`.
pub async fn generate_codes(
    api: &dyn PromotionCodes,
    request: &GenerationRequest,
    cancel: &AtomicBool,
    tx: &UnboundedSender<ServerMessage>,
) -> JobOutcome {
    info!(
        coupon = %request.coupon,
        count = request.count,
        user = %request.user,
        "starting generation"
    );

    match run(api, request, cancel, tx).await {
        Ok(outcome) => outcome,
        Err(Stop::Failed(e)) => {
            error!("Generation failed: {e}");
            match send(tx, ServerMessage::error(e.to_string())) {
                Ok(()) => JobOutcome::Failed,
                Err(_) => JobOutcome::Disconnected,
            }
        }
        Err(Stop::Disconnected) => {
            info!("Client gone, abandoning generation");
            JobOutcome::Disconnected
        }
    }
}

async fn run(
    api: &dyn PromotionCodes,
    request: &GenerationRequest,
    cancel: &AtomicBool,
    tx: &UnboundedSender<ServerMessage>,
) -> Result<JobOutcome, Stop> {
    let total = request.count;
    let mut batch = CodeBatch::new(Utc::now(), request.user.clone());

    for i in 0..total {
        if cancel.load(Ordering::SeqCst) {
            info!(generated = i, total, "Generation cancelled by client");
            send(tx, ServerMessage::GenerationCancelled)?;
            return Ok(JobOutcome::Cancelled);
        }

        let params = build_params(request)?;
        let promo = api.create(&params).await?;
        batch.codes.push(promo.code);

        let generated = i + 1;
        send(tx, ServerMessage::ProgressUpdate { generated, total })?;

        if generated % CHUNK_SIZE == 0 && generated < total {
            let file_contents = encode_file(&batch)?;
            let file_name = partial_file_name(generated.div_ceil(CHUNK_SIZE), &batch.generated_at);
            info!("Sending partial file: {file_name}");
            send(
                tx,
                ServerMessage::PartialFileGenerated {
                    file_contents,
                    file_name,
                },
            )?;
            batch.codes.clear();
        }
    }

    if !batch.is_empty() {
        let file_contents = encode_file(&batch)?;
        let file_name = final_file_name(&batch.generated_at);
        info!(codes = batch.len(), "Generation complete, sending {file_name}");
        send(
            tx,
            ServerMessage::GenerationComplete {
                file_contents: Some(file_contents),
                file_name: Some(file_name),
            },
        )?;
    } else {
        info!("Generation finished with no new codes to send");
        send(
            tx,
            ServerMessage::GenerationComplete {
                file_contents: None,
                file_name: None,
            },
        )?;
    }

    Ok(JobOutcome::Completed)
}
