//! Output formatting - plain ASCII terminal output

use owo_colors::OwoColorize;
use stride_common::levels::xp_to_next_level;
use stride_common::{ActorIdentity, ActorProfile, SyncIssue, SyncOutcome, SyncStatus};

pub fn print_profile(identity: &ActorIdentity, profile: &ActorProfile, level_xp_unit: u64) {
    let kind = if identity.is_guest() { "guest" } else { "host" };
    println!("{} ({}) [{}]", identity.display_name.bold(), identity.id, kind);
    println!(
        "  level {}  xp {} (+{} to next)  coins {}",
        profile.level.to_string().bright_cyan(),
        profile.xp,
        xp_to_next_level(profile.xp, level_xp_unit),
        profile.coins.to_string().yellow()
    );
    if profile.streak > 0 {
        println!("  streak {} day(s)", profile.streak);
    }
    println!("  completed events: {}", profile.completed_event_ids.len());
}

pub fn print_award(event_id: &str, before: &ActorProfile, after: &ActorProfile) {
    if before == after {
        println!("[SKIP] {} already completed", event_id.dimmed());
        return;
    }
    println!(
        "[OK] {}  xp {} -> {}  coins {} -> {}",
        event_id.bright_green(),
        before.xp,
        after.xp,
        before.coins,
        after.coins
    );
    if after.level > before.level {
        println!("  level up: {}", after.level.to_string().bright_cyan());
    }
}

pub fn print_outcome(label: &str, outcome: SyncOutcome) {
    match outcome {
        SyncOutcome::Success => println!("[OK] {} synced", label),
        SyncOutcome::Failure => println!("[FAIL] {} {}", label, "sync failed".bright_red()),
    }
}

pub fn print_status(
    remote_degraded: bool,
    cache_degraded: bool,
    pending: usize,
    ledger: SyncStatus,
    issues: &[SyncIssue],
) {
    let remote = if remote_degraded {
        "degraded".bright_red().to_string()
    } else {
        "online".bright_green().to_string()
    };
    let cache = if cache_degraded {
        "memory-only".yellow().to_string()
    } else {
        "durable".bright_green().to_string()
    };
    println!("remote:  {}", remote);
    println!("cache:   {}", cache);
    println!("ledger:  {} ({} pending)", ledger, pending);
    for issue in issues {
        println!("  [NOTE] {}", issue.yellow());
    }
}
