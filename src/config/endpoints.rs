use serde::{Deserialize, Serialize};
use url::Url;

/// Base URLs of the Google APIs the tool talks to. Every base must end with
/// `/`, paths are joined onto it. Tests point these at local mock servers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_sqladmin")]
    pub sqladmin: Url,

    #[serde(default = "default_resource_manager")]
    pub resource_manager: Url,

    #[serde(default = "default_dataconnect")]
    pub dataconnect: Url,

    #[serde(default = "default_token_uri")]
    pub token_uri: Url,

    #[serde(default = "default_tokeninfo")]
    pub tokeninfo: Url,

    /// Domain of the data service agent: `service-<project number>@<domain>`.
    #[serde(default = "default_service_agent_domain")]
    pub service_agent_domain: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            sqladmin: default_sqladmin(),
            resource_manager: default_resource_manager(),
            dataconnect: default_dataconnect(),
            token_uri: default_token_uri(),
            tokeninfo: default_tokeninfo(),
            service_agent_domain: default_service_agent_domain(),
        }
    }
}

fn default_sqladmin() -> Url {
    Url::parse("https://sqladmin.googleapis.com/v1/").expect("valid default sqladmin url")
}

fn default_resource_manager() -> Url {
    Url::parse("https://cloudresourcemanager.googleapis.com/v1/")
        .expect("valid default resource manager url")
}

fn default_dataconnect() -> Url {
    Url::parse("https://firebasedataconnect.googleapis.com/v1/")
        .expect("valid default dataconnect url")
}

fn default_token_uri() -> Url {
    Url::parse("https://oauth2.googleapis.com/token").expect("valid default token url")
}

fn default_tokeninfo() -> Url {
    Url::parse("https://oauth2.googleapis.com/tokeninfo").expect("valid default tokeninfo url")
}

fn default_service_agent_domain() -> String {
    "gcp-sa-firebasedataconnect.iam.gserviceaccount.com".to_string()
}
