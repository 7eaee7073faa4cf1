//! Configuration file support (`.waybill.toml`).
//!
//! Every section is optional and falls back to defaults, so a fresh
//! checkout only needs `[store] url` to talk to a live store. Secrets
//! are never read from the file: the admin token and the portal
//! password resolve from the environment.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use waybill_portal::{FieldMapping, PortalCredentials, SenderProfile};
use waybill_retry::RetryPlan;

/// Config file name, looked up in the working root.
pub const CONFIG_FILE: &str = ".waybill.toml";

/// Environment variable carrying the admin token for store mutations.
pub const ADMIN_TOKEN_ENV: &str = "WAYBILL_ADMIN_TOKEN";

/// Environment variable carrying the portal password.
pub const PORTAL_PASSWORD_ENV: &str = "WAYBILL_PORTAL_PASSWORD";

/// Order store endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// The store's action endpoint URL.
    pub url: String,
    /// Request timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Courier portal settings. The password comes from the environment,
/// never from this file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalSection {
    pub base_url: String,
    pub username: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Override for the shipped field mapping, for when the portal
    /// changes its form ahead of a release.
    pub field_mapping: Option<FieldMapping>,
}

impl Default for PortalSection {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            timeout: Duration::from_secs(60),
            field_mapping: None,
        }
    }
}

/// Dispatch run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSection {
    /// Directory for the event log and run summaries.
    pub state_dir: PathBuf,
    /// Retry plan for store writes after a confirmed booking.
    pub store_update_retry: RetryPlan,
    /// Post the batch callback after a run.
    pub callback: bool,
    /// Sign the batch callback with the admin token.
    pub sign_callback: bool,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".waybill"),
            store_update_retry: RetryPlan::default(),
            callback: true,
            sign_callback: true,
        }
    }
}

/// Payment initiator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentSection {
    /// Maya checkout public key.
    pub maya_public_key: String,
    /// Maya checkout base URL.
    pub maya_checkout_base: String,
    /// Static payment reference rendered for gcash orders.
    pub gcash_reference: String,
}

impl Default for PaymentSection {
    fn default() -> Self {
        Self {
            maya_public_key: String::new(),
            maya_checkout_base: "https://payment-app-sandbox.mayadigital.io/v1/checkout"
                .to_string(),
            gcash_reference: "/qrph.png".to_string(),
        }
    }
}

/// Storefront settings (used for product order links).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorefrontSection {
    pub base_url: String,
}

/// Configuration loaded from `.waybill.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WaybillConfig {
    pub store: StoreSection,
    pub portal: PortalSection,
    pub sender: SenderProfile,
    pub dispatch: DispatchSection,
    pub payment: PaymentSection,
    pub storefront: StorefrontSection,
}

impl WaybillConfig {
    /// Load configuration from `root/.waybill.toml`, or defaults when
    /// the file does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        Self::load_file(&root.join(CONFIG_FILE))
    }

    /// Load configuration from an explicit path, or defaults when the
    /// file does not exist.
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// The store endpoint URL, or a setup error naming the fix.
    pub fn require_store_url(&self) -> Result<&str> {
        if self.store.url.is_empty() {
            bail!("no order store configured; set [store] url in {CONFIG_FILE}");
        }
        Ok(&self.store.url)
    }

    /// Portal credentials: username from the config, password from
    /// `WAYBILL_PORTAL_PASSWORD`.
    pub fn portal_credentials(&self) -> Result<PortalCredentials> {
        if self.portal.base_url.is_empty() {
            bail!("no courier portal configured; set [portal] base_url in {CONFIG_FILE}");
        }
        if self.portal.username.is_empty() {
            bail!("no portal username configured; set [portal] username in {CONFIG_FILE}");
        }
        let password = resolve_portal_password().with_context(|| {
            format!("portal password not set; export {PORTAL_PASSWORD_ENV}")
        })?;
        Ok(PortalCredentials {
            username: self.portal.username.clone(),
            password,
        })
    }

    /// The field mapping to use: the configured override, validated,
    /// or the shipped default.
    pub fn field_mapping(&self) -> Result<FieldMapping> {
        match &self.portal.field_mapping {
            Some(mapping) => {
                mapping
                    .validate()
                    .with_context(|| format!("field mapping {:?} in {CONFIG_FILE}", mapping.version))?;
                Ok(mapping.clone())
            }
            None => Ok(FieldMapping::v1()),
        }
    }
}

/// Admin token for store mutations, from `WAYBILL_ADMIN_TOKEN`.
pub fn resolve_admin_token() -> Option<String> {
    non_empty_env(ADMIN_TOKEN_ENV)
}

fn resolve_portal_password() -> Result<String> {
    non_empty_env(PORTAL_PASSWORD_ENV)
        .with_context(|| format!("{PORTAL_PASSWORD_ENV} is unset or empty"))
}

fn non_empty_env(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let value = value.trim().to_string();
            if value.is_empty() { None } else { Some(value) }
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = WaybillConfig::load(dir.path()).expect("load");
        assert!(config.store.url.is_empty());
        assert_eq!(config.dispatch.state_dir, PathBuf::from(".waybill"));
        assert!(config.dispatch.callback);
        assert_eq!(config.payment.gcash_reference, "/qrph.png");
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
[store]
url = "https://script.example.com/exec"
timeout = "10s"

[sender]
name = "Bayanihan Goods"
contact = "+639123456789"
address = "Unit 4, Maginhawa St"
province = "Metro Manila"
city = "Quezon City"
barangay = "Teachers Village"

[dispatch]
callback = false

[dispatch.store_update_retry]
backoff = "constant"
max_attempts = 2
base_delay = "100ms"
"#,
        )
        .expect("write");

        let config = WaybillConfig::load(dir.path()).expect("load");
        assert_eq!(config.store.url, "https://script.example.com/exec");
        assert_eq!(config.store.timeout, Duration::from_secs(10));
        assert_eq!(config.sender.city, "Quezon City");
        assert!(!config.dispatch.callback);
        assert!(config.dispatch.sign_callback);
        assert_eq!(config.dispatch.store_update_retry.max_attempts, 2);
        // Portal section untouched by the file.
        assert_eq!(config.portal.timeout, Duration::from_secs(60));
    }

    #[test]
    fn require_store_url_names_the_fix() {
        let config = WaybillConfig::default();
        let err = config.require_store_url().expect_err("missing url");
        assert!(err.to_string().contains("[store] url"));
    }

    #[test]
    fn configured_field_mapping_is_validated() {
        let mut config = WaybillConfig::default();
        let mut mapping = FieldMapping::v1();
        mapping.version = "v2-draft".to_string();
        mapping.fields.remove("receiver_city");
        config.portal.field_mapping = Some(mapping);

        let err = config.field_mapping().expect_err("incomplete mapping");
        assert!(format!("{err:#}").contains("receiver_city"));
    }

    #[test]
    fn default_field_mapping_is_v1() {
        let config = WaybillConfig::default();
        assert_eq!(config.field_mapping().expect("mapping").version, "v1");
    }
}
