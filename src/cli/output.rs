use chrono::{DateTime, Local, Utc};

use crate::chat::Warning;
use crate::core::analysis::{AnalysisResult, AnalysisStatusReport};
use crate::core::error::ApiError;
use crate::core::message::Message;
use crate::core::profile::UserProfile;
use crate::core::session::Session;
use crate::profile::NicknameStatus;
use crate::view::{normalize_percentages, resolve_persona, split_primary, DayGroup};

pub fn print_error(err: &ApiError) {
    eprintln!("\x1b[31;1m[{}]\x1b[0m {}", err.kind, err.message);
}

pub fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        let text = match warning {
            Warning::GreetingUnavailable(m) => format!("greeting unavailable: {m}"),
            Warning::HistoryUnavailable(m) => format!("history unavailable: {m}"),
            Warning::MetadataRefreshFailed(m) => format!("session refresh failed: {m}"),
            Warning::PersistenceFailed(m) => format!("could not save last session: {m}"),
        };
        eprintln!("\x1b[33m(warning) {text}\x1b[0m");
    }
}

pub fn print_progress(report: &AnalysisStatusReport) {
    let step = report
        .current_step
        .map(|s| format!(" step {s}"))
        .unwrap_or_default();
    let message = report.message.as_deref().unwrap_or("");
    eprintln!("\x1b[90m[{}]{step} {message}\x1b[0m", report.status);
}

pub fn print_result(result: &AnalysisResult) {
    let persona = resolve_persona(result.predicted_category.as_deref());
    println!(
        "\x1b[1mPersona:\x1b[0m {} \x1b[90m({})\x1b[0m",
        persona.display_name, persona.tagline
    );

    let split = split_primary(&normalize_percentages(&result.probabilities));
    if let Some(primary) = &split.primary {
        println!("  \x1b[36;1m{:<14}\x1b[0m {:>5.1}%", primary.category, primary.probability);
    }
    for other in &split.others {
        println!("  {:<14} {:>5.1}%", other.category, other.probability);
    }
    if let Some(summary) = &result.summary {
        println!("\n{summary}");
    }
}

pub fn print_message(message: &Message) {
    if message.is_user() {
        println!("\x1b[32myou>\x1b[0m {}", message.content);
    } else {
        println!("\x1b[36mbot>\x1b[0m {}", message.content);
    }
}

pub fn print_session_groups(groups: &[DayGroup<Session>]) {
    if groups.is_empty() {
        println!("No sessions.");
        return;
    }
    for group in groups {
        println!("\x1b[1m{}\x1b[0m", group.day);
        for session in &group.records {
            let marker = if session.is_active { "" } else { " (closed)" };
            println!(
                "  \x1b[90m{}\x1b[0m  {}  {}{}",
                local_time(&session.updated_at),
                session.id,
                session.display_name(),
                marker
            );
        }
    }
}

pub fn print_profile(profile: &UserProfile) {
    println!("\x1b[1m{}\x1b[0m \x1b[90m({})\x1b[0m", profile.name, profile.id);
    if let Some(email) = &profile.email {
        println!("  email:  {email}");
    }
    if let Some(joined) = &profile.joined_at {
        println!("  joined: {}", joined.format("%Y-%m-%d"));
    }
    println!("  tests:  {}", profile.test_count);
    println!("  chats:  {}", profile.chat_count);
}

pub fn describe_nickname(status: &NicknameStatus) -> String {
    match status {
        NicknameStatus::Unknown => "not checked".into(),
        NicknameStatus::Checking => "checking...".into(),
        NicknameStatus::Available => "available".into(),
        NicknameStatus::Taken => "already taken".into(),
        NicknameStatus::Invalid(m) => format!("invalid: {m}"),
        NicknameStatus::Failed(m) => format!("check failed: {m}"),
    }
}

fn local_time(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M").to_string()
}
