//! Bitwarden CLI wrapper - điều khiển vendor `bw` binary qua subprocess.
//!
//! Mỗi profile (source/destination) có một appdata directory riêng, chọn qua
//! biến môi trường `BITWARDENCLI_APPDATA_DIR`, để bw giữ config/session/cache
//! tách biệt hoàn toàn cho từng account.
//!
//! Nguyên tắc quan trọng: không reimplement encryption/sync protocol của
//! Bitwarden - mọi truy cập vault đều đi qua `bw`.

pub mod item;

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use clap::ValueEnum;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use item::VaultItem;

/// Lỗi từ tầng subprocess bw
#[derive(Debug, Error)]
pub enum BwError {
    #[error("cannot execute bw binary '{path}': {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bw {command} failed: {stderr}")]
    Failed { command: String, stderr: String },

    #[error("bw {command} produced invalid JSON: {source}")]
    InvalidJson {
        command: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Hai vault profiles được đồng bộ
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    /// Vault nguồn (chỉ đọc)
    Source,
    /// Vault đích (được ghi khi apply)
    Destination,
}

impl Profile {
    pub fn name(&self) -> &'static str {
        match self {
            Profile::Source => "source",
            Profile::Destination => "destination",
        }
    }

    /// Prefix của các env vars chứa credentials (SRC_BW_*, DST_BW_*)
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Profile::Source => "SRC",
            Profile::Destination => "DST",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tìm bw binary - ưu tiên bundled cạnh executable, fallback system PATH
pub fn find_bw_binary() -> PathBuf {
    let binary_name = if cfg!(windows) { "bw.exe" } else { "bw" };

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let bundled = exe_dir.join(binary_name);
            if bundled.exists() {
                return bundled;
            }

            // Thư mục binaries (development mode)
            let dev_bundled = exe_dir.join("binaries").join(binary_name);
            if dev_bundled.exists() {
                return dev_bundled;
            }
        }
    }

    PathBuf::from(binary_name)
}

/// Client cho một bw profile.
///
/// Mọi lệnh spawn ra đều set `BITWARDENCLI_APPDATA_DIR` trỏ đến appdata
/// directory của profile, và `BW_SESSION` sau khi unlock.
pub struct BwClient {
    bw_path: PathBuf,
    appdata_dir: PathBuf,
    session: Option<String>,
}

impl BwClient {
    pub fn new(bw_path: impl Into<PathBuf>, appdata_dir: impl Into<PathBuf>) -> Self {
        Self {
            bw_path: bw_path.into(),
            appdata_dir: appdata_dir.into(),
            session: None,
        }
    }

    pub fn appdata_dir(&self) -> &Path {
        &self.appdata_dir
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Command với environment của profile này
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bw_path);
        cmd.env("BITWARDENCLI_APPDATA_DIR", &self.appdata_dir);
        if let Some(session) = &self.session {
            cmd.env("BW_SESSION", session);
        }
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> BwError {
        BwError::Spawn {
            path: self.bw_path.clone(),
            source,
        }
    }

    /// Chạy một lệnh bw, capture stdout. Exit code khác 0 -> lỗi với stderr.
    fn run(&self, args: &[&str]) -> Result<String, BwError> {
        debug!("running bw {}", args.join(" "));
        let output = self
            .command()
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| self.spawn_error(source))?;

        if !output.status.success() {
            return Err(BwError::Failed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Chạy một lệnh bw và parse stdout thành JSON
    fn run_json(&self, args: &[&str]) -> Result<Value, BwError> {
        let stdout = self.run(args)?;
        serde_json::from_str(&stdout).map_err(|source| BwError::InvalidJson {
            command: args.join(" "),
            source,
        })
    }

    /// Chạy một lệnh bw với payload trên stdin (create/edit item)
    fn run_with_stdin(&self, args: &[&str], input: &str) -> Result<String, BwError> {
        debug!("running bw {} (with stdin payload)", args.join(" "));
        let mut child = self
            .command()
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| self.spawn_error(source))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .map_err(|source| self.spawn_error(source))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|source| self.spawn_error(source))?;

        if !output.status.success() {
            return Err(BwError::Failed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Dòng version của bw (dùng để kiểm tra binary có chạy được không)
    pub fn version(&self) -> Result<String, BwError> {
        self.run(&["--version"])
    }

    /// `bw config server <url>` - trỏ profile này đến server khác
    /// (Vaultwarden compatible)
    pub fn configure_server(&self, url: &str) -> Result<(), BwError> {
        self.run(&["config", "server", url])?;
        Ok(())
    }

    /// Login non-interactive bằng API key.
    ///
    /// `BW_CLIENTID`/`BW_CLIENTSECRET` được set trong child environment để
    /// `bw login --apikey` không hỏi gì trên stdin.
    pub fn login_api_key(&mut self, client_id: &str, client_secret: &str) -> Result<(), BwError> {
        let output = self
            .command()
            .args(["login", "--apikey"])
            .env("BW_CLIENTID", client_id)
            .env("BW_CLIENTSECRET", client_secret)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| self.spawn_error(source))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            // Session cũ trong appdata dir vẫn dùng được, unlock sẽ xác nhận
            if stderr.contains("already logged in") {
                debug!("profile already logged in, reusing existing state");
                return Ok(());
            }
            // Dọn state để lần chạy sau không kẹt nửa chừng
            let _ = self.logout();
            return Err(BwError::Failed {
                command: "login --apikey".to_string(),
                stderr,
            });
        }

        Ok(())
    }

    /// `bw unlock --raw` - stdout là session token, export qua `BW_SESSION`
    /// cho mọi lệnh sau của profile này
    pub fn unlock(&mut self, password: &str) -> Result<(), BwError> {
        match self.run(&["unlock", password, "--raw"]) {
            Ok(session) => {
                self.session = Some(session);
                Ok(())
            }
            Err(err) => {
                let _ = self.logout();
                Err(err)
            }
        }
    }

    /// `bw status` - trạng thái hiện tại (serverUrl, userEmail, status)
    pub fn status(&self) -> Result<Value, BwError> {
        self.run_json(&["status"])
    }

    /// `bw sync` - kéo state mới nhất từ server về cache local
    pub fn sync(&self) -> Result<(), BwError> {
        self.run(&["sync"])?;
        Ok(())
    }

    /// Tất cả items trong vault (decrypted JSON)
    pub fn list_items(&self) -> Result<Vec<VaultItem>, BwError> {
        let value = self.run_json(&["list", "items"])?;
        match value {
            Value::Array(items) => Ok(items.into_iter().map(VaultItem::from_value).collect()),
            _ => Err(BwError::Failed {
                command: "list items".to_string(),
                stderr: "expected a JSON array".to_string(),
            }),
        }
    }

    /// Một item theo id
    pub fn get_item(&self, id: &str) -> Result<VaultItem, BwError> {
        Ok(VaultItem::from_value(self.run_json(&["get", "item", id])?))
    }

    /// Tạo item mới từ JSON payload qua stdin
    pub fn create_item(&self, item: &VaultItem) -> Result<VaultItem, BwError> {
        let stdout = self.run_with_stdin(&["create", "item", "--raw"], &item.to_json())?;
        serde_json::from_str(&stdout)
            .map(VaultItem::from_value)
            .map_err(|source| BwError::InvalidJson {
                command: "create item".to_string(),
                source,
            })
    }

    /// Sửa item theo id với JSON payload qua stdin
    pub fn edit_item(&self, id: &str, item: &VaultItem) -> Result<VaultItem, BwError> {
        let stdout = self.run_with_stdin(&["edit", "item", id, "--raw"], &item.to_json())?;
        serde_json::from_str(&stdout)
            .map(VaultItem::from_value)
            .map_err(|source| BwError::InvalidJson {
                command: "edit item".to_string(),
                source,
            })
    }

    /// Xoá item theo id
    pub fn delete_item(&self, id: &str) -> Result<(), BwError> {
        self.run(&["delete", "item", id])?;
        Ok(())
    }

    /// Logout và xoá session
    pub fn logout(&mut self) -> Result<(), BwError> {
        self.run(&["logout"])?;
        self.session = None;
        Ok(())
    }

    /// Forward argv nguyên vẹn cho vendor binary với environment của profile.
    /// Trả về exit code của child.
    pub fn passthrough(&self, args: &[String]) -> Result<i32, BwError> {
        let status = self
            .command()
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| self.spawn_error(source))?;

        Ok(status.code().unwrap_or(1))
    }
}
