//! Job result rendering
//!
//! Prints orchestration results either as colored text or as JSON on
//! stdout. Failures are summarized in the command's exit status.

use anyhow::Result;
use autorun_core::{JobResult, JobState, OutputRecord, StreamKind};
use autorun_runner::OrchestrationError;
use colored::*;

/// Prints every result and fails unless all jobs completed
pub fn report(results: Vec<Result<JobResult, OrchestrationError>>, json: bool) -> Result<()> {
    let total = results.len();
    let mut unsuccessful = 0;
    let mut finished = Vec::new();

    for result in results {
        match result {
            Ok(job) => {
                if !job.succeeded() {
                    unsuccessful += 1;
                }
                finished.push(job);
            }
            Err(e) => {
                unsuccessful += 1;
                eprintln!("{} {}", "✗".red(), e);
            }
        }
    }

    if json {
        if let Some(rendered) = render_json(&finished, total)? {
            println!("{}", rendered);
        }
    } else {
        for job in &finished {
            print_job_result(job);
            println!();
        }
    }

    if unsuccessful > 0 {
        anyhow::bail!("{} of {} job(s) did not complete", unsuccessful, total);
    }
    Ok(())
}

/// JSON document for the finished jobs, if any finished
///
/// A lone request renders as an object, several as an array in request
/// order. Requests that failed before submission are left out.
fn render_json(finished: &[JobResult], total: usize) -> Result<Option<String>> {
    let rendered = match finished {
        [] => return Ok(None),
        [single] if total == 1 => serde_json::to_string_pretty(single)?,
        all => serde_json::to_string_pretty(all)?,
    };
    Ok(Some(rendered))
}

/// Print detailed job information
fn print_job_result(job: &JobResult) {
    println!("{}", "Job Details:".bold());
    println!("  ID:          {}", job.job_id.cyan());
    println!("  Runbook:     {}", job.runbook_name);
    println!("  Account:     {}", job.account_scope.to_string().dimmed());
    println!("  Status:      {}", colorize_state(&job.final_state));

    if let Some(created) = job.creation_time {
        println!("  Created:     {}", created.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(started) = job.start_time {
        println!("  Started:     {}", started.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(ended) = job.end_time {
        println!("  Ended:       {}", ended.format("%Y-%m-%d %H:%M:%S"));

        if let Some(started) = job.start_time {
            let seconds = ended.signed_duration_since(started).num_seconds();
            println!("  Duration:    {}s", seconds);
        }
    }

    if !job.parameters_used.is_empty() {
        println!("\n{}", "Parameters:".bold());
        for (key, value) in &job.parameters_used {
            println!("  {} = {}", key.cyan(), value);
        }
    }

    println!("\n{}", "Output:".bold());
    println!("{}", "─".repeat(80).dimmed());
    for record in &job.output {
        print_output_record(record);
    }
    println!("{}", "─".repeat(80).dimmed());

    if let Some(error) = &job.error_summary {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

fn print_output_record(record: &OutputRecord) {
    let kind = format!("{:?}", record.stream_kind).to_uppercase();
    let kind_colored = match record.stream_kind {
        StreamKind::Output => kind.normal(),
        StreamKind::Debug => kind.dimmed(),
        StreamKind::Info => kind.cyan(),
        StreamKind::Warning => kind.yellow(),
        StreamKind::Error => kind.red(),
    };

    let time = record
        .timestamp
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());

    let text = match (&record.summary, &record.payload) {
        (Some(summary), _) => summary.clone(),
        (None, Some(payload)) => payload.to_string(),
        (None, None) => String::new(),
    };

    println!("{} [{}] {}", time.dimmed(), kind_colored, text);
}

/// Colorize job state for display
fn colorize_state(state: &JobState) -> ColoredString {
    let label = state.to_string();
    match state {
        JobState::Queued => label.yellow(),
        JobState::Running => label.cyan(),
        JobState::Completed => label.green(),
        JobState::Failed | JobState::TimedOut => label.red(),
        JobState::Suspended | JobState::Stopped => label.magenta(),
        JobState::Unknown(_) => label.dimmed(),
    }
}
