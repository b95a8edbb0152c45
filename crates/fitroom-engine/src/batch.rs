use std::time::Instant;

use tracing::{info, warn};

use fitroom_contracts::progress::ProgressObserver;
use fitroom_contracts::request::EditRequest;
use fitroom_contracts::result::EditResult;

use crate::{elapsed_ms, TryOnService};

impl TryOnService {
    /// Runs the requests strictly in order, one result slot per input.
    /// Failures (fatal classes included) land in their slot and never abort
    /// the rest. Successful edits are written to history before the next
    /// item starts; a fixed pause separates items to stay inside the model
    /// endpoint's rate limits.
    pub async fn batch_edit(
        &self,
        requests: &[EditRequest],
        observer: &dyn ProgressObserver,
    ) -> Vec<EditResult> {
        let total = requests.len();
        let mut results = Vec::with_capacity(total);
        for (index, request) in requests.iter().enumerate() {
            let started = Instant::now();
            let result = match self.edit(request).await {
                Ok(result) => result,
                Err(err) => EditResult::failed(err.to_string(), elapsed_ms(started)),
            };

            if result.is_success() {
                if let Err(err) = self.save_history(request, &result).await {
                    warn!(item = index + 1, error = %err, "history write failed for batch item");
                }
            }

            observer.on_progress(index + 1, total, Some(&result));
            info!(
                item = index + 1,
                total,
                success = result.is_success(),
                "batch item finished"
            );
            results.push(result);

            if index + 1 < total {
                self.sleeper.sleep(self.options.batch_pause).await;
            }
        }
        results
    }
}
