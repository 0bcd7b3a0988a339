//! Command implementations cho bwsync CLI.
//!
//! Các commands chính:
//! - plan: tính sync plan giữa hai vaults (dry run)
//! - apply: thực thi plan lên destination vault
//! - status: trạng thái bw binary và hai profiles
//! - bw: passthrough cho vendor binary với environment của một profile
//! - logout: đăng xuất cả hai profiles

use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;

use crate::bw::{BwClient, Profile};
use crate::config::Config;
use crate::sync::{apply_plan, SyncPlan, SyncPlanner};

/// Đọc env var bắt buộc; thiếu hoặc rỗng là lỗi fatal nêu rõ tên biến
fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => bail!("Missing required environment variable: {}", name),
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Master password từ env; prompt (ẩn input) nếu thiếu và đang chạy trên terminal
fn master_password(profile: Profile) -> Result<String> {
    let var = format!("{}_BW_PASSWORD", profile.env_prefix());
    if let Some(password) = optional_env(&var) {
        return Ok(password);
    }

    if !io::stdin().is_terminal() {
        bail!("Missing required environment variable: {}", var);
    }

    let password =
        rpassword::prompt_password(format!("Master password for {} vault: ", profile.name()))
            .context("Cannot read password")?;
    if password.is_empty() {
        bail!("Password cannot be empty");
    }
    Ok(password)
}

/// Kết nối một profile: config server -> login API key -> unlock
fn connect(config: &Config, profile: Profile) -> Result<BwClient> {
    let prefix = profile.env_prefix();
    let client_id = require_env(&format!("{}_BW_CLIENT_ID", prefix))?;
    let client_secret = require_env(&format!("{}_BW_CLIENT_SECRET", prefix))?;
    let password = master_password(profile)?;

    let appdata_dir = config.appdata_dir(profile);
    std::fs::create_dir_all(&appdata_dir)
        .with_context(|| format!("Cannot create appdata dir: {}", appdata_dir.display()))?;

    let mut client = BwClient::new(config.bw_path(), appdata_dir);

    // Env var thắng config cho server URL
    let server = optional_env(&format!("{}_BW_SERVER", prefix))
        .or_else(|| config.profile(profile).server.clone());
    if let Some(server) = server {
        client.configure_server(&server).with_context(|| {
            format!("Cannot configure {} server to {}", profile.name(), server)
        })?;
    }

    client
        .login_api_key(&client_id, &client_secret)
        .with_context(|| format!("Login failed for {} vault", profile.name()))?;
    client
        .unlock(&password)
        .with_context(|| format!("Unlock failed for {} vault", profile.name()))?;

    Ok(client)
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner());
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Kết nối cả hai vaults, fetch items và tính plan.
/// Trả về destination client để apply dùng lại session.
fn compute_plan(config: &Config) -> Result<(BwClient, SyncPlan)> {
    println!("{}", "Connecting to source vault...".cyan());
    let source = connect(config, Profile::Source)?;
    println!("  {} Source unlocked", "✓".green());

    println!("{}", "Connecting to destination vault...".cyan());
    let destination = connect(config, Profile::Destination)?;
    println!("  {} Destination unlocked", "✓".green());

    let pb = spinner("Fetching items from both vaults...");
    source.sync().context("Cannot sync source vault")?;
    destination.sync().context("Cannot sync destination vault")?;
    let src_items = source.list_items().context("Cannot list source items")?;
    let dst_items = destination
        .list_items()
        .context("Cannot list destination items")?;
    pb.finish_and_clear();
    println!(
        "  {} {} source / {} destination items",
        "✓".green(),
        src_items.len().to_string().cyan(),
        dst_items.len().to_string().cyan()
    );

    let pb = spinner("Comparing items...");
    let planner = SyncPlanner::new(config.sync.sync_field.clone(), config.sync.workers);
    let plan = planner.plan(src_items, dst_items)?;
    pb.finish_and_clear();

    Ok((destination, plan))
}

fn print_plan(plan: &SyncPlan) {
    println!("\n{}", "Sync plan".cyan().bold());
    println!("  Create: {}", plan.to_create.len().to_string().green());
    println!("  Update: {}", plan.to_update.len().to_string().yellow());
    println!("  Delete: {}", plan.to_delete.len().to_string().red());

    for item in &plan.to_create {
        println!("  {} {}", "[CREATE]".green(), item.display_name());
    }
    for (src, _) in &plan.to_update {
        println!("  {} {}", "[UPDATE]".yellow(), src.display_name());
    }
    for item in &plan.to_delete {
        println!("  {} {}", "[DELETE]".red(), item.display_name());
    }
}

/// Dry run: tính và in plan, không thay đổi gì
pub fn plan(config: &Config) -> Result<()> {
    let (_destination, plan) = compute_plan(config)?;
    print_plan(&plan);
    println!(
        "\n{}",
        "Dry run complete - no changes applied.".green().bold()
    );
    Ok(())
}

/// Tính plan rồi thực thi lên destination vault
pub fn apply(config: &Config, dry_run: bool, yes: bool) -> Result<()> {
    let (destination, plan) = compute_plan(config)?;
    print_plan(&plan);

    if dry_run {
        println!(
            "\n{}",
            "Dry run complete - no changes applied.".green().bold()
        );
        return Ok(());
    }

    if plan.is_empty() {
        println!("\n{}", "Vaults already in sync.".green().bold());
        return Ok(());
    }

    if !yes {
        print!("\nApply these changes to the destination vault? [y/N] ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !matches!(input.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("{}", "Aborted.".yellow());
            return Ok(());
        }
    }

    println!("\n{}", "Applying plan...".cyan().bold());
    let stats = apply_plan(&destination, &plan);

    println!(
        "\n{} Created: {}, Updated: {}, Deleted: {}",
        "✓".green(),
        stats.created.to_string().green(),
        stats.updated.to_string().yellow(),
        stats.deleted.to_string().red()
    );

    if stats.failed > 0 {
        bail!("{} operations failed", stats.failed);
    }

    println!("{}", "Sync complete!".green().bold());
    Ok(())
}

/// Trạng thái bw binary và từng profile (không cần credentials)
pub fn status(config: &Config) -> Result<()> {
    println!("{}", "bwsync status".cyan().bold());

    let bw_path = config.bw_path();
    let probe = BwClient::new(&bw_path, config.appdata_dir(Profile::Source));
    match probe.version() {
        Ok(version) => println!("  {} bw {} ({})", "✓".green(), version, bw_path.display()),
        Err(err) => {
            println!("  {} bw binary not usable: {}", "✗".red(), err);
            return Ok(());
        }
    }

    for profile in [Profile::Source, Profile::Destination] {
        let appdata_dir = config.appdata_dir(profile);
        let client = BwClient::new(&bw_path, &appdata_dir);

        println!("\n{}", profile.name().white().bold());
        println!(
            "  Appdata: {}",
            appdata_dir.display().to_string().dimmed()
        );
        match client.status() {
            Ok(status) => {
                let field = |key: &str| {
                    status
                        .get(key)
                        .and_then(Value::as_str)
                        .unwrap_or("-")
                        .to_string()
                };
                println!("  Server:  {}", field("serverUrl"));
                println!("  User:    {}", field("userEmail"));
                println!("  Status:  {}", field("status"));
            }
            Err(err) => println!("  {} {}", "✗".red(), err),
        }
    }

    Ok(())
}

/// Passthrough: forward argv nguyên vẹn cho bw với environment của profile.
/// Trả về exit code của child để main mirror lại.
pub fn bw_passthrough(config: &Config, profile: Profile, args: &[String]) -> Result<i32> {
    let appdata_dir = config.appdata_dir(profile);
    std::fs::create_dir_all(&appdata_dir)
        .with_context(|| format!("Cannot create appdata dir: {}", appdata_dir.display()))?;

    let client = BwClient::new(config.bw_path(), appdata_dir);
    Ok(client.passthrough(args)?)
}

/// Logout cả hai profiles
pub fn logout(config: &Config) -> Result<()> {
    for profile in [Profile::Source, Profile::Destination] {
        let mut client = BwClient::new(config.bw_path(), config.appdata_dir(profile));
        match client.logout() {
            Ok(()) => println!("  {} Logged out {}", "✓".green(), profile.name()),
            // bw trả lỗi khi profile chưa login - không coi là fatal
            Err(err) => println!("  {} {}: {}", "→".yellow(), profile.name(), err),
        }
    }
    Ok(())
}
