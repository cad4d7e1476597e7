use anyhow::Result;
use skillforge_core::session::Identity;

pub async fn list(user: Option<&str>) -> Result<()> {
    let service = super::session_service()?;
    let identity = user.map(Identity::new);
    let sessions = service.list(identity.as_ref()).await?;

    if sessions.is_empty() {
        println!("No sessions.");
        return Ok(());
    }

    for session in sessions {
        println!("{}  {}  {}", session.id, session.updated_at, session.title);
    }
    Ok(())
}

pub async fn show(id: &str, user: Option<&str>) -> Result<()> {
    let service = super::session_service()?;
    let identity = user.map(Identity::new);
    let session = service
        .get(identity.as_ref(), id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Session not found: {}", id))?;

    println!("# {}", session.title);
    println!("created: {}   updated: {}", session.created_at, session.updated_at);
    println!("\n{}\n", session.description);

    if let Some(messages) = &session.messages {
        for message in messages {
            let role = match message.role {
                skillforge_core::artifact::TurnRole::User => "user",
                skillforge_core::artifact::TurnRole::Assistant => "assistant",
            };
            println!("[{}] {}", role, message.content);
        }
    }

    if let Some(spec) = &session.spec {
        let parsed = skillforge_core::wire::parse_completion(spec);
        for file in &parsed.files {
            println!("\n--- {} ---", file.path);
            println!("{}", file.content);
        }
    }
    Ok(())
}

pub async fn delete(id: &str, user: Option<&str>) -> Result<()> {
    let service = super::session_service()?;
    let identity = user.map(Identity::new);
    service.delete(identity.as_ref(), id).await?;
    println!("Deleted {}", id);
    Ok(())
}
