//! SyncPlanner - tính sync plan giữa source và destination vault.
//!
//! Identity của item được theo dõi qua một custom field (mặc định `sync_id`):
//! SHA-256 của `name|username|domain`. Items không có sync id rơi về fuzzy
//! matching theo key `name|uri`. So sánh nội dung bỏ qua UUIDs và metadata
//! volatile (revisionDate, creationDate, ...) nên plan ổn định giữa hai vaults
//! khác account.

use std::collections::HashMap;

use anyhow::Result;
use rayon::prelude::*;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::bw::item::VaultItem;

/// Tên custom field mặc định giữ sync identity
pub const SYNC_FIELD: &str = "sync_id";

/// Top-level fields bị bỏ qua khi so sánh (identity/volatile metadata)
const IGNORED_FIELDS: [&str; 5] = [
    "id",
    "revisionDate",
    "creationDate",
    "deletedDate",
    "organizationId",
];

/// Kết quả planning: ba tập thay đổi cần đưa destination về khớp source
#[derive(Debug, Default)]
pub struct SyncPlan {
    /// Source items chưa có ở destination
    pub to_create: Vec<VaultItem>,
    /// Cặp (source, destination) có nội dung khác nhau
    pub to_update: Vec<(VaultItem, VaultItem)>,
    /// Destination items không còn ở source
    pub to_delete: Vec<VaultItem>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    pub fn total(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }
}

pub struct SyncPlanner {
    sync_field: String,
    max_workers: usize,
}

impl SyncPlanner {
    pub fn new(sync_field: impl Into<String>, max_workers: usize) -> Self {
        Self {
            sync_field: sync_field.into(),
            max_workers,
        }
    }

    /// SHA-256 hex của `name|username|domain`.
    ///
    /// name và username được trim + lowercase; domain là phần host của URI
    /// đầu tiên (sau `//`, trước `/` kế tiếp). Thành phần thiếu thành rỗng.
    pub fn compute_sync_id(item: &VaultItem) -> String {
        let name = item.name().unwrap_or("").trim().to_lowercase();
        let username = item.username().unwrap_or("").trim().to_lowercase();
        let uri = item.first_uri().unwrap_or("").trim().to_lowercase();
        let domain = uri
            .split("//")
            .last()
            .unwrap_or("")
            .split('/')
            .next()
            .unwrap_or("");

        let digest = Sha256::digest(format!("{}|{}|{}", name, username, domain).as_bytes());
        format!("{:x}", digest)
    }

    /// Key `name|uri` cho fuzzy matching khi thiếu sync id
    pub fn fallback_key(item: &VaultItem) -> String {
        let name = item.name().unwrap_or("").trim().to_lowercase();
        let uri = item.first_uri().unwrap_or("").trim().to_lowercase();
        format!("{}|{}", name, uri)
    }

    /// Sync id đã lưu trên item, None nếu field thiếu hoặc rỗng
    fn existing_sync_id(&self, item: &VaultItem) -> Option<String> {
        item.custom_field(&self.sync_field)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    }

    /// Dạng normalized để so sánh: bỏ volatile fields và sync id field,
    /// sort uris theo uri và custom fields theo name
    pub fn normalize(&self, item: &VaultItem) -> Value {
        let mut value = item.as_value().clone();
        if let Value::Object(map) = &mut value {
            for key in IGNORED_FIELDS {
                map.remove(key);
            }

            // bw serialize "fields": null khi item không có custom fields;
            // null, rỗng và thiếu phải so sánh như nhau sau khi bỏ sync field
            let remove_fields = match map.get_mut("fields") {
                Some(Value::Array(fields)) => {
                    fields.retain(|f| {
                        f.get("name").and_then(Value::as_str) != Some(self.sync_field.as_str())
                    });
                    fields.sort_by(|a, b| json_str(a, "name").cmp(json_str(b, "name")));
                    fields.is_empty()
                }
                Some(Value::Null) => true,
                _ => false,
            };
            if remove_fields {
                map.remove("fields");
            }

            if let Some(Value::Object(login)) = map.get_mut("login") {
                if let Some(Value::Array(uris)) = login.get_mut("uris") {
                    uris.sort_by(|a, b| json_str(a, "uri").cmp(json_str(b, "uri")));
                }
            }
        }
        value
    }

    /// True nếu hai items khác nhau sau khi normalize
    pub fn items_differ(&self, src: &VaultItem, dst: &VaultItem) -> bool {
        self.normalize(src) != self.normalize(dst)
    }

    /// Fuzzy match cho items thiếu sync id. Trả về (update candidates,
    /// creates); dst matched bị rút khỏi `dst_unmatched`.
    fn match_unmatched(
        &self,
        src_unmatched: Vec<VaultItem>,
        dst_unmatched: &mut Vec<VaultItem>,
    ) -> (Vec<(VaultItem, VaultItem)>, Vec<VaultItem>) {
        let mut pairs = Vec::new();
        let mut creates = Vec::new();

        for src in src_unmatched {
            let key = Self::fallback_key(&src);
            match dst_unmatched
                .iter()
                .position(|dst| Self::fallback_key(dst) == key)
            {
                Some(idx) => pairs.push((src, dst_unmatched.remove(idx))),
                None => creates.push(src),
            }
        }

        (pairs, creates)
    }

    /// Tính sync plan từ items của hai vaults.
    ///
    /// Source items được gán sync id (giá trị có sẵn, nếu không thì computed)
    /// trước khi match, nên items được create sẽ mang field này sang
    /// destination.
    pub fn plan(&self, src_items: Vec<VaultItem>, dst_items: Vec<VaultItem>) -> Result<SyncPlan> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .build()?;

        // Gán sync id cho source items
        let mut src_tagged: Vec<(String, VaultItem)> = Vec::new();
        let mut src_unmatched: Vec<VaultItem> = Vec::new();
        for mut item in src_items {
            let sid = self
                .existing_sync_id(&item)
                .unwrap_or_else(|| Self::compute_sync_id(&item));
            if sid.is_empty() {
                src_unmatched.push(item);
            } else {
                item.set_custom_field(&self.sync_field, &sid);
                src_tagged.push((sid, item));
            }
        }

        // Destination: chỉ index theo sync id, không ghi field
        let mut dst_by_sid: HashMap<String, VaultItem> = HashMap::new();
        let mut dst_order: Vec<String> = Vec::new();
        let mut dst_unmatched: Vec<VaultItem> = Vec::new();
        for item in dst_items {
            let sid = self
                .existing_sync_id(&item)
                .unwrap_or_else(|| Self::compute_sync_id(&item));
            if sid.is_empty() {
                dst_unmatched.push(item);
            } else if dst_by_sid.insert(sid.clone(), item).is_none() {
                dst_order.push(sid);
            }
        }

        // Match theo sync id
        let mut to_create: Vec<VaultItem> = Vec::new();
        let mut matched: Vec<(VaultItem, VaultItem)> = Vec::new();
        for (sid, src) in src_tagged {
            match dst_by_sid.remove(&sid) {
                Some(dst) => matched.push((src, dst)),
                None => to_create.push(src),
            }
        }

        // Destination items không match sync id nào -> delete (giữ thứ tự gốc)
        let mut to_delete: Vec<VaultItem> = dst_order
            .into_iter()
            .filter_map(|sid| dst_by_sid.remove(&sid))
            .collect();

        // Fuzzy match phần còn lại
        let (fuzzy_pairs, fuzzy_creates) = self.match_unmatched(src_unmatched, &mut dst_unmatched);
        matched.extend(fuzzy_pairs);
        to_create.extend(fuzzy_creates);
        to_delete.extend(dst_unmatched);

        // So sánh pairwise song song - phần tốn nhất với vaults lớn
        let to_update: Vec<(VaultItem, VaultItem)> = pool.install(|| {
            matched
                .into_par_iter()
                .filter(|(src, dst)| self.items_differ(src, dst))
                .collect()
        });

        Ok(SyncPlan {
            to_create,
            to_update,
            to_delete,
        })
    }
}

fn json_str<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn login_item(name: &str, username: &str, uri: &str) -> VaultItem {
        VaultItem::from_value(json!({
            "id": format!("id-{}", name),
            "type": 1,
            "name": name,
            "login": {
                "username": username,
                "password": "hunter2",
                "uris": [{"match": null, "uri": uri}]
            }
        }))
    }

    fn planner() -> SyncPlanner {
        SyncPlanner::new(SYNC_FIELD, 2)
    }

    #[test]
    fn test_sync_id_deterministic() {
        let a = login_item("GitHub", "octocat", "https://github.com/login");
        let b = login_item("GitHub", "octocat", "https://github.com/login");
        assert_eq!(
            SyncPlanner::compute_sync_id(&a),
            SyncPlanner::compute_sync_id(&b)
        );
    }

    #[test]
    fn test_sync_id_uses_domain_not_full_uri() {
        // Cùng host, khác path -> cùng identity
        let a = login_item("GitHub", "octocat", "https://github.com/login");
        let b = login_item("GitHub", "octocat", "https://github.com/session/new");
        assert_eq!(
            SyncPlanner::compute_sync_id(&a),
            SyncPlanner::compute_sync_id(&b)
        );

        let c = login_item("GitHub", "octocat", "https://gitlab.com/login");
        assert_ne!(
            SyncPlanner::compute_sync_id(&a),
            SyncPlanner::compute_sync_id(&c)
        );
    }

    #[test]
    fn test_sync_id_ignores_case_and_whitespace() {
        let a = login_item(" GitHub ", "OctoCat", "HTTPS://GitHub.com/login");
        let b = login_item("github", "octocat", "https://github.com/login");
        assert_eq!(
            SyncPlanner::compute_sync_id(&a),
            SyncPlanner::compute_sync_id(&b)
        );
    }

    #[test]
    fn test_sync_id_handles_missing_parts() {
        let item = VaultItem::from_value(json!({"type": 2, "name": "Note"}));
        let expected = {
            use sha2::{Digest, Sha256};
            format!("{:x}", Sha256::digest("note||".as_bytes()))
        };
        assert_eq!(SyncPlanner::compute_sync_id(&item), expected);
    }

    #[test]
    fn test_fallback_key() {
        let item = login_item(" GitHub ", "octocat", "HTTPS://github.com/Login");
        assert_eq!(
            SyncPlanner::fallback_key(&item),
            "github|https://github.com/login"
        );
    }

    #[test]
    fn test_normalize_strips_volatile_fields() {
        let p = planner();
        let item = VaultItem::from_value(json!({
            "id": "abc",
            "revisionDate": "2024-01-01T00:00:00Z",
            "creationDate": "2023-01-01T00:00:00Z",
            "deletedDate": null,
            "organizationId": "org-1",
            "name": "x",
            "fields": [
                {"name": "sync_id", "value": "deadbeef", "type": 0},
                {"name": "pin", "value": "1234", "type": 0}
            ]
        }));

        let norm = p.normalize(&item);
        assert!(norm.get("id").is_none());
        assert!(norm.get("revisionDate").is_none());
        assert!(norm.get("organizationId").is_none());

        let fields = norm.get("fields").unwrap().as_array().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].get("name").unwrap(), "pin");
    }

    #[test]
    fn test_normalize_treats_null_and_stripped_fields_alike() {
        let p = planner();
        let with_null = VaultItem::from_value(json!({"name": "x", "fields": null}));
        let without_key = VaultItem::from_value(json!({"name": "x"}));
        let mut with_sync_only = VaultItem::from_value(json!({"name": "x"}));
        with_sync_only.set_custom_field(SYNC_FIELD, "deadbeef");

        assert_eq!(p.normalize(&with_null), p.normalize(&without_key));
        assert_eq!(p.normalize(&with_sync_only), p.normalize(&without_key));
    }

    #[test]
    fn test_normalize_sorts_uris_and_fields() {
        let p = planner();
        let item = VaultItem::from_value(json!({
            "name": "x",
            "fields": [
                {"name": "zeta", "value": "1", "type": 0},
                {"name": "alpha", "value": "2", "type": 0}
            ],
            "login": {
                "uris": [
                    {"uri": "https://b.example.com"},
                    {"uri": "https://a.example.com"}
                ]
            }
        }));

        let norm = p.normalize(&item);
        let fields = norm.get("fields").unwrap().as_array().unwrap();
        assert_eq!(fields[0].get("name").unwrap(), "alpha");
        let uris = norm
            .get("login")
            .unwrap()
            .get("uris")
            .unwrap()
            .as_array()
            .unwrap();
        assert_eq!(uris[0].get("uri").unwrap(), "https://a.example.com");
    }

    #[test]
    fn test_items_differ_ignores_ids_and_order() {
        let p = planner();
        let a = VaultItem::from_value(json!({
            "id": "id-a",
            "name": "x",
            "login": {"uris": [{"uri": "https://a"}, {"uri": "https://b"}]}
        }));
        let b = VaultItem::from_value(json!({
            "id": "id-b",
            "name": "x",
            "login": {"uris": [{"uri": "https://b"}, {"uri": "https://a"}]}
        }));
        assert!(!p.items_differ(&a, &b));
    }

    #[test]
    fn test_items_differ_on_content_change() {
        let p = planner();
        let a = login_item("GitHub", "octocat", "https://github.com");
        let mut value = a.as_value().clone();
        value["login"]["password"] = json!("changed");
        let b = VaultItem::from_value(value);
        assert!(p.items_differ(&a, &b));
    }

    #[test]
    fn test_plan_create_update_delete() {
        let p = planner();

        // A: chỉ có ở source; B: khác password; C: giống hệt; D: chỉ có ở dest
        let src = vec![
            login_item("Alpha", "a", "https://alpha.example"),
            login_item("Beta", "b", "https://beta.example"),
            login_item("Gamma", "c", "https://gamma.example"),
        ];
        let mut value = login_item("Beta", "b", "https://beta.example").into_value();
        value["login"]["password"] = json!("different");
        let dst_beta = VaultItem::from_value(value);

        let dst = vec![
            dst_beta,
            login_item("Gamma", "c", "https://gamma.example"),
            login_item("Delta", "d", "https://delta.example"),
        ];

        let plan = p.plan(src, dst).unwrap();
        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(plan.to_create[0].name(), Some("Alpha"));
        assert_eq!(plan.to_update.len(), 1);
        assert_eq!(plan.to_update[0].0.name(), Some("Beta"));
        assert_eq!(plan.to_delete.len(), 1);
        assert_eq!(plan.to_delete[0].name(), Some("Delta"));
        assert_eq!(plan.total(), 3);
    }

    #[test]
    fn test_plan_assigns_sync_field_to_created_items() {
        let p = planner();
        let src = vec![login_item("Alpha", "a", "https://alpha.example")];
        let plan = p.plan(src, Vec::new()).unwrap();

        let created = &plan.to_create[0];
        let sid = created.custom_field(SYNC_FIELD).unwrap();
        assert_eq!(sid, SyncPlanner::compute_sync_id(created));
    }

    #[test]
    fn test_plan_respects_stored_sync_id() {
        let p = planner();

        // Source item đã đổi tên nhưng mang sync id cũ; dest item còn tên cũ
        // với cùng sync id -> phải match thành update, không phải create+delete
        let mut src_item = login_item("New Name", "u", "https://site.example");
        src_item.set_custom_field(SYNC_FIELD, "0123456789abcdef");
        let mut dst_item = login_item("Old Name", "u", "https://site.example");
        dst_item.set_custom_field(SYNC_FIELD, "0123456789abcdef");

        let plan = p.plan(vec![src_item], vec![dst_item]).unwrap();
        assert!(plan.to_create.is_empty());
        assert!(plan.to_delete.is_empty());
        assert_eq!(plan.to_update.len(), 1);
    }

    #[test]
    fn test_plan_identical_vaults_is_empty() {
        let p = planner();
        let src = vec![login_item("Alpha", "a", "https://alpha.example")];
        let dst = vec![login_item("Alpha", "a", "https://alpha.example")];
        let plan = p.plan(src, dst).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_plan_empty_vaults() {
        let plan = planner().plan(Vec::new(), Vec::new()).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.total(), 0);
    }

    #[test]
    fn test_fuzzy_match_pairs_by_name_and_uri() {
        let p = planner();
        let src = vec![
            login_item("Alpha", "a", "https://alpha.example"),
            login_item("Solo", "s", "https://solo.example"),
        ];
        let mut dst = vec![login_item("Alpha", "other-user", "https://alpha.example")];

        let (pairs, creates) = p.match_unmatched(src, &mut dst);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1.username(), Some("other-user"));
        assert_eq!(creates.len(), 1);
        assert_eq!(creates[0].name(), Some("Solo"));
        assert!(dst.is_empty());
    }
}
