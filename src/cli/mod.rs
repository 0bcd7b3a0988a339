//! CLI definitions và command implementations cho bwsync.

pub mod commands;

use clap::{Parser, Subcommand};

use crate::bw::Profile;

/// bwsync - Sync items giữa hai Bitwarden vaults qua bw CLI
#[derive(Parser)]
#[command(name = "bwsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Tính sync plan giữa hai vaults (dry run, không thay đổi gì)
    Plan,

    /// Tính plan rồi thực thi lên destination vault
    Apply {
        /// Chỉ in plan, không thực thi (tương đương `plan`)
        #[arg(long)]
        dry_run: bool,

        /// Bỏ qua confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Hiện trạng thái bw binary và cả hai profiles (không cần credentials)
    Status,

    /// Forward arguments nguyên vẹn cho bw binary của một profile
    Bw {
        /// Profile chọn appdata directory
        #[arg(value_enum)]
        profile: Profile,

        /// Arguments forward cho bw (sau `--`)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Logout cả hai profiles và xoá sessions
    Logout,
}
