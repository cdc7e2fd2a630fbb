use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use pulse_core::config::JobConfig;
use pulse_scheduler::{from_fn, Scheduler, TaskError};
use tracing::{info, warn};

/// Register every configured job. Returns how many were accepted.
///
/// Each job logs a tick per firing. A job with `fail_after = N` reports
/// failure on its (N+1)-th firing, which evicts it.
pub fn register_jobs(scheduler: &Scheduler<String>, jobs: &[JobConfig]) -> usize {
    let mut registered = 0;
    for job in jobs {
        if job.every_secs == 0 {
            warn!(job = %job.name, "job has a zero interval, skipping");
            continue;
        }
        if scheduler.contains(job.name.as_str()) {
            warn!(job = %job.name, "duplicate job name, later entry replaces earlier one");
        } else {
            registered += 1;
        }

        let name = job.name.clone();
        let fail_after = job.fail_after;
        let runs = Arc::new(AtomicU32::new(0));
        scheduler.add(
            job.name.clone(),
            job.interval(),
            from_fn(move || {
                let run = runs.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(max) = fail_after.filter(|&max| run > max) {
                    return Err(TaskError::failed(format!(
                        "job {name} reached its limit of {max} runs"
                    )));
                }
                info!(job = %name, run, "job tick");
                Ok(())
            }),
        );
    }
    registered
}
