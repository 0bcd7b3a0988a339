//! Thực thi sync plan lên destination vault.
//!
//! Mỗi operation đi qua bw CLI của destination profile. Lỗi per-item không
//! dừng cả batch - được đếm lại trong [`ApplyStats`] để caller quyết định.

use colored::Colorize;
use tracing::warn;

use super::planner::SyncPlan;
use crate::bw::BwClient;

/// Kết quả apply: số operations thành công theo loại + số thất bại
#[derive(Debug, Default)]
pub struct ApplyStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Chạy toàn bộ plan lên destination vault theo thứ tự create -> update -> delete
pub fn apply_plan(dest: &BwClient, plan: &SyncPlan) -> ApplyStats {
    let mut stats = ApplyStats::default();

    for item in &plan.to_create {
        // Payload không được mang id của source vault
        let mut payload = item.clone();
        payload.remove_id();

        match dest.create_item(&payload) {
            Ok(created) => {
                stats.created += 1;
                println!("  {} Created: {}", "✓".green(), created.display_name());
            }
            Err(err) => {
                stats.failed += 1;
                warn!("create failed for {}: {}", item.display_name(), err);
                println!(
                    "  {} Create failed: {}: {}",
                    "✗".red(),
                    item.display_name(),
                    err
                );
            }
        }
    }

    for (src, dst) in &plan.to_update {
        let Some(dst_id) = dst.id() else {
            stats.failed += 1;
            println!(
                "  {} Update failed: {}: destination item has no id",
                "✗".red(),
                dst.display_name()
            );
            continue;
        };

        // Giữ id của destination, nội dung từ source (planner đã gán sync id)
        let mut payload = src.clone();
        payload.set_id(dst_id);

        match dest.edit_item(dst_id, &payload) {
            Ok(updated) => {
                stats.updated += 1;
                println!("  {} Updated: {}", "✓".green(), updated.display_name());
            }
            Err(err) => {
                stats.failed += 1;
                warn!("edit failed for {}: {}", src.display_name(), err);
                println!(
                    "  {} Update failed: {}: {}",
                    "✗".red(),
                    src.display_name(),
                    err
                );
            }
        }
    }

    for item in &plan.to_delete {
        let Some(id) = item.id() else {
            stats.failed += 1;
            println!(
                "  {} Delete failed: {}: item has no id",
                "✗".red(),
                item.display_name()
            );
            continue;
        };

        match dest.delete_item(id) {
            Ok(()) => {
                stats.deleted += 1;
                println!("  {} Deleted: {}", "✓".green(), item.display_name());
            }
            Err(err) => {
                stats.failed += 1;
                warn!("delete failed for {}: {}", item.display_name(), err);
                println!(
                    "  {} Delete failed: {}: {}",
                    "✗".red(),
                    item.display_name(),
                    err
                );
            }
        }
    }

    stats
}
