use anyhow::Result;
use skillforge_core::session::Identity;

pub async fn run(user: &str) -> Result<()> {
    let service = super::session_service()?;
    let identity = Identity::new(user);

    let report = service.migrate_local_to_identity(&identity).await?;
    println!(
        "Migrated {} session(s) to '{}' ({} skipped, {} failed).",
        report.migrated, user, report.skipped, report.failed
    );
    Ok(())
}
