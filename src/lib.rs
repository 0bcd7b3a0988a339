//! bwsync - Sync items giữa hai Bitwarden vaults qua official bw CLI.
//!
//! Điều khiển vendor `bw` binary với hai profiles tách biệt (source và
//! destination, mỗi profile một appdata directory riêng chọn qua
//! `BITWARDENCLI_APPDATA_DIR`), tính sync plan (create/update/delete) và
//! apply lên destination vault.
//!
//! Nguyên tắc quan trọng: không reimplement Bitwarden internals (encryption,
//! vault format, sync protocol) - mọi truy cập vault đều đi qua `bw`.

pub mod bw;
pub mod cli;
pub mod config;
pub mod sync;

// Re-export main types
pub use bw::{BwClient, BwError, Profile};
pub use config::Config;
pub use sync::{ApplyStats, SyncPlan, SyncPlanner};
