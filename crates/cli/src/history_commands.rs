use {
    chrono::{DateTime, SecondsFormat, Utc},
    cronkeeper_cron::{JobRecord, RecordStore, RunRecord},
};

/// Print every active job record.
pub async fn list_jobs(store: &dyn RecordStore) -> anyhow::Result<()> {
    let jobs = store.list_jobs().await?;
    if jobs.is_empty() {
        println!("No scheduled jobs.");
        return Ok(());
    }
    for job in &jobs {
        println!("{}", format_job(job));
    }
    Ok(())
}

/// Print the most recent runs of `job_type`, oldest first.
pub async fn show_runs(store: &dyn RecordStore, job_type: &str, limit: usize) -> anyhow::Result<()> {
    let Some(job) = store.find_active_job(job_type).await? else {
        println!("No active job of type '{job_type}'.");
        return Ok(());
    };
    let runs = store.recent_runs(job.id, limit).await?;
    if runs.is_empty() {
        println!("'{job_type}' has not run yet.");
        return Ok(());
    }
    for run in &runs {
        println!("{}", format_run(run));
    }
    Ok(())
}

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "never".into())
}

fn format_job(job: &JobRecord) -> String {
    format!(
        "{:<24} id={:<6} next_run={}",
        job.job_type,
        job.id,
        timestamp(job.next_run_at)
    )
}

fn format_run(run: &RunRecord) -> String {
    let status = match run.succeeded {
        None => "running",
        Some(true) => "ok",
        Some(false) => "failed",
    };
    let mut line = format!(
        "#{:<6} {} {:<7}",
        run.id,
        timestamp(Some(run.started_at)),
        status
    );
    if let Some(duration) = run.duration() {
        line.push_str(&format!(" {}ms", duration.num_milliseconds()));
    }
    if let Some(error) = &run.error {
        line.push_str(&format!(" error={error}"));
    } else if let Some(result) = &run.result {
        line.push_str(&format!(" result={result}"));
    }
    line
}
