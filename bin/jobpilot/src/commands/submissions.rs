use jobpilot_core::Paths;
use jobpilot_storage::SubmissionLog;

pub fn run(limit: usize) -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;
    let log = SubmissionLog::open(&paths.db_file())?;

    let records = log.recent(limit)?;
    if records.is_empty() {
        println!("No submissions recorded.");
        return Ok(());
    }
    println!("{:<26} {:<24} {:<12} {:<8} URL", "WHEN", "USERNAME", "PLATFORM", "STATUS");
    for r in records {
        println!(
            "{:<26} {:<24} {:<12} {:<8} {}",
            r.created_at, r.username, r.platform, r.status, r.job_url
        );
    }
    Ok(())
}
