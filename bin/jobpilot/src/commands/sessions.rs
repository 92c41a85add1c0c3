use jobpilot_core::Paths;
use jobpilot_storage::PlatformSessionStore;

fn open() -> anyhow::Result<PlatformSessionStore> {
    let paths = Paths::new();
    paths.ensure_dirs()?;
    Ok(PlatformSessionStore::open(&paths.db_file())?)
}

pub fn list() -> anyhow::Result<()> {
    let store = open()?;
    let rows = store.list()?;
    if rows.is_empty() {
        println!("No stored sessions.");
        return Ok(());
    }
    println!("{:<32} {:<12} {}", "USERNAME", "PLATFORM", "UPDATED");
    for (username, platform, updated_at) in rows {
        println!("{:<32} {:<12} {}", username, platform, updated_at);
    }
    Ok(())
}

pub fn delete(username: &str, platform: &str) -> anyhow::Result<()> {
    let store = open()?;
    if store.delete(username, platform)? {
        println!("Deleted session for {} on {}.", username, platform);
    } else {
        println!("No session found for {} on {}.", username, platform);
    }
    Ok(())
}

pub fn clear() -> anyhow::Result<()> {
    let store = open()?;
    let n = store.clear()?;
    println!("Deleted {} session(s).", n);
    Ok(())
}
