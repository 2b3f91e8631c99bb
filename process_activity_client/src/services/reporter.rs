use crate::app_config::Settings;
use crate::collection::collector::ActivityCollector;
use crate::collection::process_source::ProcessSource;
use crate::errors::AppError;
use crate::event_types::ActivityRecord;
use crate::network::api_client::ApiClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

/// Periodic collection loop: snapshot the process table, build records,
/// partition them and submit every batch. One cycle runs at a time; batches
/// within a cycle are submitted sequentially and fail independently.
pub async fn run_reporter(
    settings: Arc<Settings>,
    mut source: Box<dyn ProcessSource + Send>,
    collector: ActivityCollector,
    mut api_client: ApiClient,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> Result<(), AppError> {
    tracing::info!(
        "Reporter: Started. Collection interval: {}s, batch size: {}",
        settings.collection_interval_secs,
        settings.max_batch_size
    );

    let mut interval_timer = interval(Duration::from_secs(settings.collection_interval_secs));
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased; // Prioritize shutdown signal

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow_and_update() {
                    tracing::info!("Reporter: Shutdown signal received.");
                    break;
                }
            }
            _ = interval_timer.tick() => {
                run_collection_cycle(&settings, source.as_mut(), &collector, &mut api_client).await;
            }
        }
    }

    tracing::info!("Reporter shut down.");
    Ok(())
}

async fn run_collection_cycle(
    settings: &Settings,
    source: &mut (dyn ProcessSource + Send),
    collector: &ActivityCollector,
    api_client: &mut ApiClient,
) {
    let snapshot = match source.snapshot() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::error!("Reporter: Failed to snapshot processes: {}", e);
            return;
        }
    };
    if snapshot.is_empty() {
        tracing::info!("Reporter: No active processes found");
        return;
    }

    let records = match collector.build_records(&snapshot) {
        Ok(records) => records,
        Err(e) => {
            tracing::error!("Reporter: Failed to build activity records: {}", e);
            return;
        }
    };

    let batches = split_batches(records, settings.max_batch_size);
    tracing::info!(
        "Reporter: Collected {} processes in {} batches",
        snapshot.len(),
        batches.len()
    );

    let mut sent_count = 0usize;
    for (index, batch) in batches.iter().enumerate() {
        if api_client.send_batch(batch).await {
            sent_count += batch.len();
        } else {
            tracing::error!("Reporter: Failed to send batch {} of {}", index + 1, batches.len());
        }
    }

    if sent_count > 0 {
        tracing::info!("Reporter: Successfully sent {} activity records", sent_count);
    }
}

/// Partitions records into batches of at most `max_batch_size`, preserving
/// snapshot order.
pub fn split_batches(
    records: Vec<ActivityRecord>,
    max_batch_size: usize,
) -> Vec<Vec<ActivityRecord>> {
    // Settings validation rejects a zero batch size; guard anyway so a bad
    // caller cannot panic `chunks`.
    if max_batch_size == 0 {
        return if records.is_empty() {
            Vec::new()
        } else {
            vec![records]
        };
    }
    records
        .chunks(max_batch_size)
        .map(|chunk| chunk.to_vec())
        .collect()
}
