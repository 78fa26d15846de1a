use anyhow::{Context, Result};
use chrono::Local;
use std::path::PathBuf;

use super::output;
use super::App;
use crate::analysis::{AnalysisPoller, AnalysisTracker};
use crate::chat::ChatSessionStore;
use crate::core::analysis::{AnalysisStatus, ImageUpload};
use crate::profile::{NicknameStatus, ProfileEditor};
use crate::view::{available_personas, group_by_day};

pub async fn login(app: &App, token: String) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        anyhow::bail!("Token must not be empty.");
    }
    app.tokens
        .set_token(token)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("Signed in.");
    Ok(())
}

pub async fn logout(app: &App) -> Result<()> {
    app.tokens
        .clear_token()
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    app.persistence
        .clear_last_session()
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("Signed out.");
    Ok(())
}

pub async fn auth_status(app: &App) -> Result<()> {
    let token = app.tokens.token().await.map_err(|e| anyhow::anyhow!("{e}"))?;
    let state = if token.is_some() { "signed in" } else { "signed out" };
    println!("Backend: {}{}", app.config.base_url, app.config.api_prefix);
    println!("Status:  {state}");
    println!(
        "User:    {}",
        app.config.user_id.as_deref().unwrap_or("(not set)")
    );
    Ok(())
}

pub async fn analyze(app: &App, image: PathBuf, note: Option<String>) -> Result<()> {
    let bytes = tokio::fs::read(&image)
        .await
        .with_context(|| format!("Failed to read {}", image.display()))?;
    let file_name = image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("Image path has no file name")?;

    let poller = AnalysisPoller::new(app.api.clone(), app.config.poll_interval());
    let tracker = AnalysisTracker::new(app.api.clone(), poller);
    let upload = ImageUpload {
        file_name,
        bytes,
        note,
    };

    let report = tokio::select! {
        report = tracker.start(upload, output::print_progress) => report,
        _ = tokio::signal::ctrl_c() => {
            tracker.cancel();
            eprintln!("Stopped watching; the analysis keeps running on the server.");
            return Ok(());
        }
    };

    let report = match report {
        Ok(report) => report,
        Err(e) => {
            output::print_error(&e);
            anyhow::bail!("analysis failed");
        }
    };

    match (report.status, &report.result) {
        (AnalysisStatus::Completed, Some(result)) => output::print_result(result),
        (AnalysisStatus::Completed, None) => println!("Analysis finished without a result."),
        (status, _) => {
            let detail = report.message.as_deref().unwrap_or("no details");
            println!("Analysis {status}: {detail}");
        }
    }
    Ok(())
}

pub async fn sessions(app: &App) -> Result<()> {
    let owner = app.owner()?;
    let store = ChatSessionStore::new(app.api.clone(), app.persistence.clone());
    let sessions = match store.list_sessions(owner).await {
        Ok(sessions) => sessions,
        Err(e) => {
            output::print_error(&e);
            anyhow::bail!("could not list sessions");
        }
    };

    let free: Vec<_> = available_personas(&sessions)
        .iter()
        .map(|p| p.display_name)
        .collect();
    // Same clock the listing prints times in.
    let groups = group_by_day(sessions, |s| {
        Some(s.updated_at.with_timezone(&Local).naive_local())
    });
    output::print_session_groups(&groups);
    if !free.is_empty() {
        println!("\nNot chatting with yet: {}", free.join(", "));
    }
    Ok(())
}

pub async fn profile_show(app: &App) -> Result<()> {
    let owner = app.owner()?;
    let editor = ProfileEditor::new(app.api.clone(), app.config.nickname_debounce());
    match editor.load(owner).await {
        Ok(profile) => {
            output::print_profile(&profile);
            Ok(())
        }
        Err(e) => {
            output::print_error(&e);
            anyhow::bail!("could not load profile");
        }
    }
}

pub async fn profile_rename(app: &App, name: &str) -> Result<()> {
    let owner = app.owner()?;
    let editor = ProfileEditor::new(app.api.clone(), app.config.nickname_debounce());
    if let Err(e) = editor.load(owner).await {
        output::print_error(&e);
        anyhow::bail!("could not load profile");
    }

    let name = name.trim();
    if editor.is_current_name(name) {
        println!("Nickname is already \"{name}\"; nothing to change.");
        return Ok(());
    }
    let status = editor.nickname().check_now(name).await;
    println!("Nickname \"{name}\": {}", output::describe_nickname(&status));
    if status != NicknameStatus::Available {
        anyhow::bail!("nickname not saved");
    }

    match editor.save(name).await {
        Ok(_) => {
            if let Some(profile) = editor.profile() {
                output::print_profile(&profile);
            }
            editor.clear_success();
            Ok(())
        }
        Err(e) => {
            output::print_error(&e);
            anyhow::bail!("profile update failed");
        }
    }
}
