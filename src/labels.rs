//! Label Mapper
//!
//! Assigns a coarse traffic class to every flow from its nDPI application
//! tag. The tag table is configuration: the bundled default mirrors
//! `config/labels.toml`, and operators can load an edited copy at runtime.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset::{Dataset, Field};
use crate::error::DatasetError;

/// Class assigned to tags without a mapping.
pub const DEFAULT_SENTINEL: &str = "unknown";

/// Built-in application tag to class table.
pub const DEFAULT_MAPPING: &[(&str, &str)] = &[
    ("Amazon", "Big Tech"),
    ("Apple", "Big Tech"),
    ("AppleiCloud", "unknown"),
    ("AppleiTunes", "unknown"),
    ("ApplePush", "M2M Messaging"),
    ("AppleStore", "Big Tech"),
    ("BGP", "Network Operation"),
    ("BitTorrent", "File Transfer"),
    ("COAP", "unknown"),
    ("Cloudflare", "Network Operation"),
    ("CNN", "News/Information"),
    ("DHCPV6", "Network Operation"),
    ("DNS", "Network Operation"),
    ("FTP_CONTROL", "File Transfer"),
    ("FTP_DATA", "File Transfer"),
    ("Facebook", "unknown"),
    ("GMail", "unknown"),
    ("Google", "Big Tech"),
    ("GoogleDocs", "unknown"),
    ("GoogleDrive", "unknown"),
    ("GoogleHangout", "Chat_VoIP"),
    ("GoogleMaps", "unknown"),
    ("GoogleServices", "M2M Messaging"),
    ("ICMP", "Network Operation"),
    ("ICMPV6", "Network Operation"),
    ("IGMP", "Network Operation"),
    ("IRC", "Chat_VoIP"),
    ("Kerberos", "Authentication"),
    ("LinkedIn", "unknown"),
    ("MDNS", "Network Operation"),
    ("MQTT", "M2M Messaging"),
    ("MS_OneDrive", "unknown"),
    ("Microsoft", "Big Tech"),
    ("MSN", "News/Information"),
    ("NFS", "File Transfer"),
    ("NTP", "Network Operation"),
    ("NetBIOS", "unknown"),
    ("Office365", "unknown"),
    ("Oscar", "Chat_VoIP"),
    ("PlayStore", "Big Tech"),
    ("QQ", "Chat_VoIP"),
    ("QUIC", "Chat_VoIP"),
    ("RDP", "Remote login"),
    ("RTMP", "Chat_VoIP"),
    ("Redis", "unknown"),
    ("RX", "unknown"),
    ("SIP", "Chat_VoIP"),
    ("SNMP", "Network Management"),
    ("SSDP", "Network Operation"),
    ("SSH", "Remote login"),
    ("SSL", "HTTPS"),
    ("SSL_No_Cert", "HTTPS"),
    ("STUN", "Chat_VoIP"),
    ("Skype", "Chat_VoIP"),
    ("SkypeCall", "Chat_VoIP"),
    ("Slack", "Chat_VoIP"),
    ("Syslog", "Network Management"),
    ("TeamSpeak", "Chat_VoIP"),
    ("Teredo", "Network Operation"),
    ("Tor", "unknown"),
    ("Twitter", "unknown"),
    ("UPnP", "Network Operation"),
    ("UbuntuONE", "Big Tech"),
    ("Viber", "Chat_VoIP"),
    ("Whois-DAS", "Network Management"),
    ("Wikipedia", "News/Information"),
    ("Yahoo", "Big Tech"),
    ("YouTube", "Video Streaming"),
];

/// Application tag to class lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LabelMap {
    /// Class for tags missing from `mapping`
    pub sentinel: String,
    pub mapping: BTreeMap<String, String>,
}

impl Default for LabelMap {
    fn default() -> Self {
        Self {
            sentinel: DEFAULT_SENTINEL.to_string(),
            mapping: DEFAULT_MAPPING
                .iter()
                .map(|(tag, class)| (tag.to_string(), class.to_string()))
                .collect(),
        }
    }
}

impl LabelMap {
    /// Loads a mapping table from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read label table: {}", path.display()))?;
        let map: LabelMap = toml::from_str(&content)
            .with_context(|| format!("Failed to parse label table: {}", path.display()))?;
        if map.sentinel.is_empty() {
            anyhow::bail!("Label table {} has an empty sentinel class", path.display());
        }
        debug!("Loaded {} tag mappings from {}", map.mapping.len(), path.display());
        Ok(map)
    }

    /// Resolves a tag to its class; unmapped or missing tags get the sentinel.
    pub fn class_for(&self, tag: Option<&str>) -> &str {
        tag.and_then(|t| self.mapping.get(t))
            .map(String::as_str)
            .unwrap_or(&self.sentinel)
    }

    pub fn is_mapped(&self, tag: &str) -> bool {
        self.mapping.contains_key(tag)
    }

    /// Every class this table can produce, sentinel included.
    pub fn classes(&self) -> BTreeSet<&str> {
        self.mapping
            .values()
            .map(String::as_str)
            .chain(std::iter::once(self.sentinel.as_str()))
            .collect()
    }
}

/// Outcome of a labeling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelSummary {
    pub rows_read: usize,
    pub zero_duration_dropped: usize,
    pub labeled: usize,
    /// Rows with an empty application tag
    pub missing_tag: usize,
    pub classes: BTreeMap<String, usize>,
    /// Unmapped tags and how many rows carried each
    pub unmapped: BTreeMap<String, usize>,
}

/// Drops flows with no duration, then writes the `class` column from `app`.
///
/// Re-running on an already-labeled dataset recomputes the same classes: the
/// label is always derived from the raw tag, never from an existing class.
pub fn label_dataset(dataset: &mut Dataset, map: &LabelMap) -> Result<LabelSummary, DatasetError> {
    if !dataset.has_column(Field::App) {
        return Err(DatasetError::MissingColumn(Field::App.name().to_string()));
    }

    let mut summary = LabelSummary {
        rows_read: dataset.len(),
        ..Default::default()
    };

    summary.zero_duration_dropped = dataset.retain(|r| r.duration > 0.0);
    if dataset.is_empty() {
        return Err(DatasetError::Empty(dataset.name().to_string()));
    }

    for record in dataset.records_mut() {
        match record.app.as_deref() {
            None => summary.missing_tag += 1,
            Some(tag) if !map.is_mapped(tag) => {
                *summary.unmapped.entry(tag.to_string()).or_insert(0) += 1;
            }
            Some(_) => {}
        }
        let class = map.class_for(record.app.as_deref()).to_string();
        *summary.classes.entry(class.clone()).or_insert(0) += 1;
        record.class = Some(class);
        summary.labeled += 1;
    }
    dataset.append_column(Field::Class);

    for (tag, count) in &summary.unmapped {
        warn!("Unmapped application tag '{}' ({} flows) -> '{}'", tag, count, map.sentinel);
    }
    info!(
        "Labeled {} flows into {} classes ({} zero-duration flows dropped)",
        summary.labeled,
        summary.classes.len(),
        summary.zero_duration_dropped
    );

    Ok(summary)
}
