//! Roku ECP session. Implements the External Control Protocol on port 8060
//! for key presses, app launch, app listing, and device info retrieval.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use super::types::{AppCatalog, AppEntry, CommandOutcome, DeviceAddress, DeviceInfo};
use crate::error::{RemoteError, Result};

/// Connection settings for the ECP endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcpOptions {
    pub port: u16,
    pub timeout: Duration,
}

impl EcpOptions {
    pub const PORT: u16 = 8060;
    pub const TIMEOUT: Duration = Duration::from_secs(3);
}

impl Default for EcpOptions {
    fn default() -> Self {
        Self {
            port: Self::PORT,
            timeout: Self::TIMEOUT,
        }
    }
}

/// One connection to one device.
///
/// The app catalog and device info are cached snapshots. A refresh swaps in a
/// complete new snapshot only when the query and parse both succeed, so readers
/// never see a half-built catalog and a failed refresh keeps the previous one.
pub struct DeviceSession {
    address: DeviceAddress,
    base_url: Url,
    client: reqwest::Client,
    catalog: RwLock<Arc<AppCatalog>>,
    info: RwLock<Arc<DeviceInfo>>,
}

impl DeviceSession {
    pub fn new(address: DeviceAddress) -> Result<Self> {
        Self::with_options(address, EcpOptions::default())
    }

    pub fn with_options(address: DeviceAddress, options: EcpOptions) -> Result<Self> {
        let base_url = Url::parse(&format!("http://{}:{}/", address, options.port))
            .map_err(|_| RemoteError::InvalidAddress(address.to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            address,
            base_url,
            client,
            catalog: RwLock::new(Arc::new(AppCatalog::default())),
            info: RwLock::new(Arc::new(DeviceInfo::default())),
        })
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Current app catalog snapshot
    pub async fn app_catalog(&self) -> Arc<AppCatalog> {
        self.catalog.read().await.clone()
    }

    /// Current device info snapshot
    pub async fn device_info(&self) -> Arc<DeviceInfo> {
        self.info.read().await.clone()
    }

    /// Send a keypress command
    pub async fn send_key(&self, key: &str) -> CommandOutcome {
        let result = self.post(&["keypress", key]).await;
        if let Err(e) = &result {
            warn!("Error sending '{}' command to {}: {}", key, self.address, e);
        }
        result.into()
    }

    /// Launch an app by id
    pub async fn launch_app(&self, app_id: &str) -> CommandOutcome {
        let result = self.post(&["launch", app_id]).await;
        if let Err(e) = &result {
            warn!("Error launching app {} on {}: {}", app_id, self.address, e);
        }
        result.into()
    }

    /// Query installed apps and replace the cached catalog on success
    pub async fn refresh_app_catalog(&self) -> CommandOutcome {
        let result = match self.get(&["query", "apps"]).await {
            Ok(body) => parse_app_list(&body),
            Err(e) => Err(e),
        };

        match result {
            Ok(catalog) => {
                debug!("Loaded {} apps from {}", catalog.len(), self.address);
                *self.catalog.write().await = Arc::new(catalog);
                CommandOutcome::Success
            }
            Err(e) => {
                warn!("Error getting app list from {}: {}", self.address, e);
                Err::<(), _>(e).into()
            }
        }
    }

    /// Query device metadata and replace the cached info on success
    pub async fn refresh_device_info(&self) -> CommandOutcome {
        let result = match self.get(&["query", "device-info"]).await {
            Ok(body) => parse_device_info(&body),
            Err(e) => Err(e),
        };

        match result {
            Ok(info) => {
                debug!("Loaded {} device-info fields from {}", info.len(), self.address);
                *self.info.write().await = Arc::new(info);
                CommandOutcome::Success
            }
            Err(e) => {
                warn!("Error getting device info from {}: {}", self.address, e);
                Err::<(), _>(e).into()
            }
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidAddress(self.address.to_string()))?
            .clear()
            .extend(segments);
        Ok(url)
    }

    async fn post(&self, segments: &[&str]) -> Result<()> {
        let url = self.endpoint(segments)?;
        debug!("POST {}", url);

        let response = self.client.post(url).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(RemoteError::Rejected(status.as_u16()))
        }
    }

    async fn get(&self, segments: &[&str]) -> Result<String> {
        let url = self.endpoint(segments)?;
        debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Rejected(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

/// Parse `<apps><app id="12" ...>Netflix</app>...</apps>` into a catalog.
///
/// Apps without an id or with an empty name are skipped.
pub fn parse_app_list(xml: &str) -> Result<AppCatalog> {
    let body = root_body(xml, "apps")?;
    let mut entries = Vec::new();
    let mut rest = body;

    while let Some(start) = find_open_tag(rest, "app") {
        let after = &rest[start + "<app".len()..];
        let tag_end = after
            .find('>')
            .ok_or_else(|| RemoteError::Protocol("unterminated <app> tag".into()))?;
        let attrs = &after[..tag_end];
        let content = &after[tag_end + 1..];

        if attrs.trim_end().ends_with('/') {
            rest = content;
            continue;
        }

        let close = content
            .find("</app>")
            .ok_or_else(|| RemoteError::Protocol("<app> element is not closed".into()))?;
        let name = decode_entities(content[..close].trim());

        match attribute(attrs, "id") {
            Some(id) if !name.is_empty() => entries.push(AppEntry::new(id, name)),
            _ => debug!("Skipping app element without id or name: {:?}", attrs),
        }

        rest = &content[close + "</app>".len()..];
    }

    Ok(AppCatalog::new(entries))
}

/// Parse a flat `<device-info>` document; each child element becomes one field
pub fn parse_device_info(xml: &str) -> Result<DeviceInfo> {
    let body = root_body(xml, "device-info")?;
    let mut fields = BTreeMap::new();
    let mut rest = body;

    while let Some(start) = rest.find('<') {
        let after = &rest[start + 1..];

        if let Some(comment) = after.strip_prefix("!--") {
            let end = comment
                .find("-->")
                .ok_or_else(|| RemoteError::Protocol("unterminated comment".into()))?;
            rest = &comment[end + 3..];
            continue;
        }

        let tag_end = after
            .find('>')
            .ok_or_else(|| RemoteError::Protocol("unterminated tag in <device-info>".into()))?;
        let tag = &after[..tag_end];
        let name = tag
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or_default();
        if name.is_empty() || name.starts_with('/') {
            return Err(RemoteError::Protocol(format!(
                "unexpected tag <{}> in <device-info>",
                tag
            )));
        }

        let content = &after[tag_end + 1..];
        if tag.trim_end().ends_with('/') {
            fields.insert(name.to_string(), String::new());
            rest = content;
            continue;
        }

        let close_tag = format!("</{}>", name);
        let close = content.find(&close_tag).ok_or_else(|| {
            RemoteError::Protocol(format!("<{}> element is not closed", name))
        })?;
        fields.insert(name.to_string(), decode_entities(content[..close].trim()));
        rest = &content[close + close_tag.len()..];
    }

    Ok(DeviceInfo::new(fields))
}

/// Inner text of the root element, or empty for a self-closing root
fn root_body<'a>(xml: &'a str, root: &str) -> Result<&'a str> {
    let start = find_open_tag(xml, root)
        .ok_or_else(|| RemoteError::Protocol(format!("missing <{}> root element", root)))?;
    let after = &xml[start + 1 + root.len()..];
    let tag_end = after
        .find('>')
        .ok_or_else(|| RemoteError::Protocol(format!("unterminated <{}> tag", root)))?;

    if after[..tag_end].trim_end().ends_with('/') {
        return Ok("");
    }

    let content = &after[tag_end + 1..];
    let close_tag = format!("</{}>", root);
    let end = content
        .find(&close_tag)
        .ok_or_else(|| RemoteError::Protocol(format!("<{}> element is not closed", root)))?;
    Ok(&content[..end])
}

/// Byte offset of `<name` where the tag name ends right after `name`
fn find_open_tag(xml: &str, name: &str) -> Option<usize> {
    let needle = format!("<{}", name);
    let mut offset = 0;
    while let Some(pos) = xml[offset..].find(&needle) {
        let start = offset + pos;
        match xml[start + needle.len()..].chars().next() {
            Some(c) if c.is_whitespace() || c == '>' || c == '/' => return Some(start),
            _ => offset = start + needle.len(),
        }
    }
    None
}

fn attribute(attrs: &str, name: &str) -> Option<String> {
    let mut offset = 0;
    while let Some(pos) = attrs[offset..].find(name) {
        let start = offset + pos;
        offset = start + name.len();

        let preceded_by_space = attrs[..start]
            .chars()
            .next_back()
            .is_some_and(char::is_whitespace);
        if !preceded_by_space {
            continue;
        }

        let value = attrs[offset..].trim_start().strip_prefix('=')?.trim_start();
        let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let value = &value[1..];
        let end = value.find(quote)?;
        return Some(decode_entities(&value[..end]));
    }
    None
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after
            .find(';')
            .and_then(|end| decode_entity(&after[..end]).map(|c| (c, end)));

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Named or numeric (`#39`, `#xE9`) reference, without the `&` and `;`
fn decode_entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => {
            let number = name.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeDevice, unused_port};

    const APPS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<apps>
	<app id="31012" type="menu" version="2.1.11">FandangoNOW Movies &amp; TV</app>
	<app id="12" subtype="ndka" type="appl" version="5.2.81179046">Netflix</app>
	<app id="837" type="appl" version="2.21.105005072">YouTube</app>
	<app id="99999" type="appl" version="1.0"></app>
</apps>
"#;

    const DEVICE_INFO_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<device-info>
	<udn>29600009-5406-1005-8080-d83134a82a9d</udn>
	<serial-number>YN00NJ468680</serial-number>
	<model-name>Roku Ultra</model-name>
	<software-version>11.5.0</software-version>
	<network-type>wifi</network-type>
	<screen-size/>
	<uptime>93784</uptime>
</device-info>
"#;

    #[test]
    fn test_parse_app_list() {
        let catalog = parse_app_list(APPS_XML).unwrap();
        let names: Vec<&str> = catalog.iter().map(|app| app.name.as_str()).collect();

        // Device order is preserved and nameless apps are dropped
        assert_eq!(names, vec!["FandangoNOW Movies & TV", "Netflix", "YouTube"]);
        assert_eq!(catalog.find_by_id("12").unwrap().name, "Netflix");
    }

    #[test]
    fn test_parse_app_list_edge_cases() {
        assert!(parse_app_list("<apps/>").unwrap().is_empty());
        assert!(parse_app_list("<apps>\n</apps>").unwrap().is_empty());

        // Attribute names that merely end in "id" are not the id
        let catalog = parse_app_list(r#"<apps><app uuid="x" id='7'>Demo</app></apps>"#).unwrap();
        assert_eq!(catalog.entries(), &[AppEntry::new("7", "Demo")]);
    }

    #[test]
    fn test_parse_app_list_decodes_character_references() {
        let catalog = parse_app_list(
            r#"<apps><app id="1">Kid&#39;s TV</app><app id="2">Caf&#xE9;</app><app id="3">A &amp;lt; B &amp; C &bogus; &#xZZ;</app></apps>"#,
        )
        .unwrap();
        let names: Vec<&str> = catalog.iter().map(|app| app.name.as_str()).collect();
        assert_eq!(names, vec!["Kid's TV", "Café", "A &lt; B & C &bogus; &#xZZ;"]);
    }

    #[test]
    fn test_parse_app_list_rejects_malformed() {
        assert!(matches!(parse_app_list(""), Err(RemoteError::Protocol(_))));
        assert!(matches!(
            parse_app_list("<html>not found</html>"),
            Err(RemoteError::Protocol(_))
        ));
        assert!(matches!(
            parse_app_list(r#"<apps><app id="12">Netflix</apps>"#),
            Err(RemoteError::Protocol(_))
        ));
        assert!(matches!(
            parse_app_list(r#"<apps><app id="12">Netflix</app>"#),
            Err(RemoteError::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_device_info() {
        let info = parse_device_info(DEVICE_INFO_XML).unwrap();
        assert_eq!(info.model_name(), Some("Roku Ultra"));
        assert_eq!(info.serial_number(), Some("YN00NJ468680"));
        assert_eq!(info.software_version(), Some("11.5.0"));
        assert_eq!(info.network_type(), Some("wifi"));
        assert_eq!(info.screen_size(), Some(""));
        assert_eq!(info.uptime_display().as_deref(), Some("26h 3m 4s"));
        assert_eq!(info.len(), 7);
    }

    #[test]
    fn test_parse_device_info_rejects_malformed() {
        assert!(parse_device_info("<device-info><model-name>Roku</device-info>").is_err());
        assert!(parse_device_info("<apps></apps>").is_err());
        assert!(parse_device_info("<device-info><model-name>Roku</model-name>").is_err());
    }

    #[tokio::test]
    async fn test_send_key_and_launch() {
        let device = FakeDevice::start().await;
        device.route("POST", "/keypress/Home", 200, "");
        device.route("POST", "/launch/12", 200, "");
        let session = device.session();

        assert_eq!(session.send_key("Home").await, CommandOutcome::Success);
        assert_eq!(session.launch_app("12").await, CommandOutcome::Success);
        assert_eq!(
            device.requests(),
            vec!["POST /keypress/Home".to_string(), "POST /launch/12".to_string()]
        );
    }

    #[tokio::test]
    async fn test_non_success_status_is_failed() {
        let device = FakeDevice::start().await;
        device.route("POST", "/keypress/Up", 503, "");
        let session = device.session();

        assert_eq!(session.send_key("Up").await, CommandOutcome::Failed);
        // Unrouted paths answer 404
        assert_eq!(session.launch_app("0").await, CommandOutcome::Failed);
    }

    #[tokio::test]
    async fn test_transport_failure_is_error() {
        let address = DeviceAddress::new("127.0.0.1").unwrap();
        let options = EcpOptions {
            port: unused_port(),
            timeout: Duration::from_secs(2),
        };
        let session = DeviceSession::with_options(address, options).unwrap();

        assert!(matches!(session.send_key("Up").await, CommandOutcome::Error(_)));
    }

    #[tokio::test]
    async fn test_refresh_replaces_catalog_and_info() {
        let device = FakeDevice::start().await;
        device.route("GET", "/query/apps", 200, APPS_XML);
        device.route("GET", "/query/device-info", 200, DEVICE_INFO_XML);
        let session = device.session();

        assert!(session.app_catalog().await.is_empty());
        assert_eq!(session.refresh_app_catalog().await, CommandOutcome::Success);
        assert_eq!(session.app_catalog().await.len(), 3);

        assert_eq!(session.refresh_device_info().await, CommandOutcome::Success);
        assert_eq!(session.device_info().await.model_name(), Some("Roku Ultra"));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_catalog() {
        let device = FakeDevice::start().await;
        device.route("GET", "/query/apps", 200, APPS_XML);
        let session = device.session();
        assert!(session.refresh_app_catalog().await.is_success());
        let before = session.app_catalog().await;

        // Malformed body
        device.route("GET", "/query/apps", 200, "<apps><app id=\"1\">Broken");
        assert!(matches!(
            session.refresh_app_catalog().await,
            CommandOutcome::Error(_)
        ));
        assert!(Arc::ptr_eq(&before, &session.app_catalog().await));

        // Rejected
        device.route("GET", "/query/apps", 500, "");
        assert_eq!(session.refresh_app_catalog().await, CommandOutcome::Failed);
        assert!(Arc::ptr_eq(&before, &session.app_catalog().await));

        // Device gone
        drop(device);
        assert!(matches!(
            session.refresh_app_catalog().await,
            CommandOutcome::Error(_)
        ));
        let after = session.app_catalog().await;
        assert_eq!(*before, *after);
        assert_eq!(after.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_info_refresh_keeps_previous_info() {
        let device = FakeDevice::start().await;
        device.route("GET", "/query/device-info", 200, DEVICE_INFO_XML);
        let session = device.session();
        assert!(session.refresh_device_info().await.is_success());

        device.route("GET", "/query/device-info", 200, "garbage");
        assert!(!session.refresh_device_info().await.is_success());
        assert_eq!(session.device_info().await.model_name(), Some("Roku Ultra"));
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let session = DeviceSession::new(DeviceAddress::new("10.0.0.5").unwrap()).unwrap();
        assert_eq!(
            session.endpoint(&["keypress", "Lit_a b"]).unwrap().as_str(),
            "http://10.0.0.5:8060/keypress/Lit_a%20b"
        );
        assert_eq!(
            session.endpoint(&["query", "apps"]).unwrap().as_str(),
            "http://10.0.0.5:8060/query/apps"
        );
    }
}
