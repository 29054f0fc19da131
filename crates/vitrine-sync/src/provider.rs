//! Provider selection as a tagged sum type.
//!
//! Each backend kind carries exactly the configuration it needs; dispatch to
//! a concrete adapter happens in one place ([`crate::adapter::build_adapter`])
//! instead of through string-keyed lookup.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::StorageError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Exclusive read/write access to a directory the operator already
    /// granted. Acquisition and permission prompting happen upstream.
    Local { root: PathBuf },
    /// A plain shared HTTP endpoint speaking the dataset wire contract.
    SharedUrl { endpoint: String },
    /// Same wire contract plus an `x-api-key` header.
    CustomApi {
        endpoint: String,
        #[serde(default)]
        auth_key: Option<String>,
    },
    /// An HTTP bridge process fronting an FTP volume; identical wire contract.
    FtpBridge {
        endpoint: String,
        #[serde(default)]
        auth_key: Option<String>,
    },
    /// Hosted backend-as-a-service: dataset row in a table, assets in a
    /// storage bucket.
    Hosted {
        endpoint: String,
        auth_key: String,
        dataset_table: String,
        asset_bucket: String,
    },
}

impl ProviderConfig {
    pub fn label(&self) -> &'static str {
        match self {
            ProviderConfig::Local { .. } => "local",
            ProviderConfig::SharedUrl { .. } => "shared_url",
            ProviderConfig::CustomApi { .. } => "custom_api",
            ProviderConfig::FtpBridge { .. } => "ftp_bridge",
            ProviderConfig::Hosted { .. } => "hosted",
        }
    }

    /// Validate and canonicalize operator input.
    ///
    /// Endpoints get a scheme prefixed when missing and must parse as URLs;
    /// a local root must be non-empty. Returns `Validation` on bad input.
    pub fn normalized(self) -> Result<Self, StorageError> {
        match self {
            ProviderConfig::Local { root } => {
                if root.as_os_str().is_empty() {
                    return Err(StorageError::Validation(
                        "local provider requires a directory".into(),
                    ));
                }
                Ok(ProviderConfig::Local { root })
            }
            ProviderConfig::SharedUrl { endpoint } => Ok(ProviderConfig::SharedUrl {
                endpoint: normalize_endpoint(&endpoint)?,
            }),
            ProviderConfig::CustomApi { endpoint, auth_key } => Ok(ProviderConfig::CustomApi {
                endpoint: normalize_endpoint(&endpoint)?,
                auth_key,
            }),
            ProviderConfig::FtpBridge { endpoint, auth_key } => Ok(ProviderConfig::FtpBridge {
                endpoint: normalize_endpoint(&endpoint)?,
                auth_key,
            }),
            ProviderConfig::Hosted {
                endpoint,
                auth_key,
                dataset_table,
                asset_bucket,
            } => {
                if auth_key.trim().is_empty() {
                    return Err(StorageError::Validation(
                        "hosted provider requires an auth key".into(),
                    ));
                }
                Ok(ProviderConfig::Hosted {
                    endpoint: normalize_endpoint(&endpoint)?,
                    auth_key,
                    dataset_table,
                    asset_bucket,
                })
            }
        }
    }
}

pub(crate) fn normalize_endpoint(raw: &str) -> Result<String, StorageError> {
    let mut endpoint = raw.trim().trim_end_matches('/').to_string();
    if endpoint.is_empty() {
        return Err(StorageError::Validation("endpoint cannot be empty".into()));
    }
    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        endpoint = format!("https://{endpoint}");
    }
    let parsed = Url::parse(&endpoint)
        .map_err(|err| StorageError::Validation(format!("invalid endpoint url: {err}")))?;
    if parsed.host_str().is_none() {
        return Err(StorageError::Validation(format!(
            "endpoint has no host: {endpoint}"
        )));
    }
    Ok(endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_hostnames_gain_a_scheme() {
        let config = ProviderConfig::SharedUrl {
            endpoint: " kiosk.example.com/api/ ".into(),
        }
        .normalized()
        .unwrap();
        assert_eq!(
            config,
            ProviderConfig::SharedUrl {
                endpoint: "https://kiosk.example.com/api".into()
            }
        );
    }

    #[test]
    fn empty_endpoint_is_rejected() {
        let err = ProviderConfig::SharedUrl {
            endpoint: "   ".into(),
        }
        .normalized()
        .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[test]
    fn hosted_without_key_is_rejected() {
        let err = ProviderConfig::Hosted {
            endpoint: "https://backend.example.com".into(),
            auth_key: "".into(),
            dataset_table: "kiosk_dataset".into(),
            asset_bucket: "kiosk-assets".into(),
        }
        .normalized()
        .unwrap_err();
        assert!(matches!(err, StorageError::Validation(_)));
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = ProviderConfig::CustomApi {
            endpoint: "https://kiosk.example.com".into(),
            auth_key: Some("k-123".into()),
        };
        let raw = toml::to_string(&config).unwrap();
        let back: ProviderConfig = toml::from_str(&raw).unwrap();
        assert_eq!(back, config);
    }
}
