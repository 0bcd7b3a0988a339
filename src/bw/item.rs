//! VaultItem - bw item dưới dạng raw JSON với typed accessors.
//!
//! Nguyên tắc quan trọng: giữ nguyên raw JSON từ bw, không drop/reshape các
//! fields không hiểu. Accessors chỉ đọc những phần sync planning cần đến.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Custom field type 0 = text (theo bw CLI)
const FIELD_TYPE_TEXT: u64 = 0;

/// Một vault item, nguyên dạng JSON như bw trả về
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaultItem(Value);

impl VaultItem {
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Serialize thành JSON string (payload cho bw create/edit)
    pub fn to_json(&self) -> String {
        self.0.to_string()
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// Tên để hiển thị trong logs (items có thể thiếu name)
    pub fn display_name(&self) -> &str {
        self.name().unwrap_or("(unnamed)")
    }

    pub fn username(&self) -> Option<&str> {
        self.0.get("login")?.get("username")?.as_str()
    }

    /// URI đầu tiên trong login.uris
    pub fn first_uri(&self) -> Option<&str> {
        self.0
            .get("login")?
            .get("uris")?
            .as_array()?
            .first()?
            .get("uri")?
            .as_str()
    }

    pub fn set_id(&mut self, id: &str) {
        if let Value::Object(map) = &mut self.0 {
            map.insert("id".to_string(), Value::String(id.to_string()));
        }
    }

    pub fn remove_id(&mut self) {
        if let Value::Object(map) = &mut self.0 {
            map.remove("id");
        }
    }

    /// Giá trị của một custom field theo tên
    pub fn custom_field(&self, name: &str) -> Option<&str> {
        self.0
            .get("fields")?
            .as_array()?
            .iter()
            .find(|f| f.get("name").and_then(Value::as_str) == Some(name))?
            .get("value")?
            .as_str()
    }

    /// Set hoặc thêm một custom text field (type 0)
    pub fn set_custom_field(&mut self, name: &str, value: &str) {
        let Value::Object(map) = &mut self.0 else {
            return;
        };

        // bw trả "fields": null khi item không có custom fields
        let fields = map
            .entry("fields")
            .or_insert_with(|| Value::Array(Vec::new()));
        if !fields.is_array() {
            *fields = Value::Array(Vec::new());
        }

        if let Value::Array(fields) = fields {
            for field in fields.iter_mut() {
                if field.get("name").and_then(Value::as_str) == Some(name) {
                    if let Value::Object(field) = field {
                        field.insert("value".to_string(), Value::String(value.to_string()));
                    }
                    return;
                }
            }
            fields.push(json!({
                "name": name,
                "value": value,
                "type": FIELD_TYPE_TEXT,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let item = VaultItem::from_value(json!({
            "id": "abc-123",
            "name": "GitHub",
            "login": {
                "username": "octocat",
                "uris": [{"uri": "https://github.com/login"}]
            }
        }));

        assert_eq!(item.id(), Some("abc-123"));
        assert_eq!(item.name(), Some("GitHub"));
        assert_eq!(item.username(), Some("octocat"));
        assert_eq!(item.first_uri(), Some("https://github.com/login"));
        assert_eq!(item.display_name(), "GitHub");
    }

    #[test]
    fn test_accessors_on_sparse_item() {
        let item = VaultItem::from_value(json!({"type": 2}));
        assert_eq!(item.id(), None);
        assert_eq!(item.username(), None);
        assert_eq!(item.first_uri(), None);
        assert_eq!(item.display_name(), "(unnamed)");
    }

    #[test]
    fn test_set_custom_field_inserts() {
        let mut item = VaultItem::from_value(json!({"name": "x"}));
        item.set_custom_field("sync_id", "deadbeef");
        assert_eq!(item.custom_field("sync_id"), Some("deadbeef"));

        let fields = item.as_value().get("fields").unwrap().as_array().unwrap();
        assert_eq!(fields[0].get("type").unwrap(), &json!(0));
    }

    #[test]
    fn test_set_custom_field_updates_existing() {
        let mut item = VaultItem::from_value(json!({
            "name": "x",
            "fields": [{"name": "sync_id", "value": "old", "type": 0}]
        }));
        item.set_custom_field("sync_id", "new");
        assert_eq!(item.custom_field("sync_id"), Some("new"));

        let fields = item.as_value().get("fields").unwrap().as_array().unwrap();
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn test_set_custom_field_on_null_fields() {
        // bw serialize items không có custom fields thành "fields": null
        let mut item = VaultItem::from_value(json!({"name": "x", "fields": null}));
        assert_eq!(item.custom_field("sync_id"), None);
        item.set_custom_field("sync_id", "v");
        assert_eq!(item.custom_field("sync_id"), Some("v"));
    }

    #[test]
    fn test_set_and_remove_id() {
        let mut item = VaultItem::from_value(json!({"id": "src-id", "name": "x"}));
        item.set_id("dst-id");
        assert_eq!(item.id(), Some("dst-id"));
        item.remove_id();
        assert_eq!(item.id(), None);
    }
}
