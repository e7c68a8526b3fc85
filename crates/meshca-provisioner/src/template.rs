//! Certificate templates
//!
//! Provisioners hand the signing engine a template source together with the
//! data it is rendered with. The default templates are applied here; custom
//! template text is carried through for the engine's renderer.

use crate::config::TemplateConfig;
use crate::ssh::{SshCertType, SshCertificate};
use crate::x509::{create_sans, Certificate, CertificateRequest, SanType, SubjectAlternativeName};
use meshca_core::{MeshcaError, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Subject key in X.509 template data
pub const SUBJECT_KEY: &str = "Subject";
/// SANs key in X.509 template data
pub const SANS_KEY: &str = "SANs";
/// Verified token payload
pub const TOKEN_KEY: &str = "Token";
/// Verified mesh certificate
pub const CERT_KEY: &str = "Cert";
/// SSH certificate type
pub const TYPE_KEY: &str = "Type";
/// SSH key id
pub const KEY_ID_KEY: &str = "KeyID";
/// SSH principals
pub const PRINCIPALS_KEY: &str = "Principals";

const DEFAULT_USER_EXTENSIONS: [&str; 5] = [
    "permit-X11-forwarding",
    "permit-agent-forwarding",
    "permit-port-forwarding",
    "permit-pty",
    "permit-user-rc",
];

/// Data a template is rendered with
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TemplateData(Map<String, Value>);

impl TemplateData {
    /// Empty data
    pub fn new() -> Self {
        Self::default()
    }

    /// Subject and SANs for an X.509 certificate
    pub fn x509(common_name: &str, sans: &[String]) -> Self {
        let mut data = Self::new();
        data.set(SUBJECT_KEY, json!({ "commonName": common_name }));
        data.set(SANS_KEY, json!(create_sans(sans)));
        data
    }

    /// Type, key id and principals for an SSH certificate
    pub fn ssh(cert_type: SshCertType, key_id: &str, principals: &[String]) -> Self {
        let mut data = Self::new();
        data.set(TYPE_KEY, json!(cert_type.as_str()));
        data.set(KEY_ID_KEY, json!(key_id));
        data.set(PRINCIPALS_KEY, json!(principals));
        data
    }

    /// Set a raw value
    pub fn set(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    /// Set a serializable value
    pub fn set_serialized<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| MeshcaError::internal_with(e, format!("error serializing template data {key}")))?;
        self.set(key, value);
        Ok(())
    }

    /// Look up a value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Merge caller data over ours; null is ignored, anything but an object fails
    pub fn merge_user_data(&mut self, data: &Value) -> Result<()> {
        match data {
            Value::Null => Ok(()),
            Value::Object(map) => {
                for (k, v) in map {
                    self.0.insert(k.clone(), v.clone());
                }
                Ok(())
            }
            other => Err(MeshcaError::internal(format!(
                "error unmarshaling template data: expected a JSON object, got {other}"
            ))),
        }
    }

    fn str_at(&self, path: &[&str]) -> Option<&str> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.0.get(*first)?, |v, key| v.get(key))?
            .as_str()
    }

    fn strings(&self, key: &str) -> Vec<String> {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Where the template text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Built-in template
    Default,
    /// Operator supplied template text
    Custom(String),
}

fn resolve(config: Option<&TemplateConfig>, mut data: TemplateData) -> Result<(TemplateSource, TemplateData)> {
    let Some(config) = config else {
        return Ok((TemplateSource::Default, data));
    };
    if let Some(extra) = &config.template_data {
        data.merge_user_data(extra)?;
    }
    let source = match &config.template {
        Some(text) if !text.is_empty() => TemplateSource::Custom(text.clone()),
        _ => TemplateSource::Default,
    };
    Ok((source, data))
}

fn custom_template_error() -> MeshcaError {
    MeshcaError::internal("custom templates are rendered by the signing engine")
}

/// X.509 template and data
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateOptions {
    pub source: TemplateSource,
    pub data: TemplateData,
}

impl TemplateOptions {
    /// Resolve configured options over `data`
    pub fn new(config: Option<&TemplateConfig>, data: TemplateData) -> Result<Self> {
        let (source, data) = resolve(config, data)?;
        Ok(Self { source, data })
    }

    /// Render the default template into `cert`
    pub fn apply(&self, csr: &CertificateRequest, cert: &mut Certificate) -> Result<()> {
        if let TemplateSource::Custom(_) = self.source {
            return Err(custom_template_error());
        }

        cert.common_name = self
            .data
            .str_at(&[SUBJECT_KEY, "commonName"])
            .unwrap_or_default()
            .to_string();

        let sans: Vec<SubjectAlternativeName> = match self.data.get(SANS_KEY) {
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| MeshcaError::internal_with(e, "error reading template SANs"))?,
            None => Vec::new(),
        };
        for san in sans {
            match san.san_type {
                SanType::Dns => cert.dns_names.push(san.value),
                SanType::Email => cert.email_addresses.push(san.value),
                SanType::Uri => cert.uris.push(san.value),
                SanType::Ip => cert.ip_addresses.push(
                    san.value
                        .parse()
                        .map_err(|e| MeshcaError::internal_with(e, format!("invalid IP SAN {}", san.value)))?,
                ),
            }
        }

        cert.key_usage = if csr.public_key.is_rsa() {
            vec!["keyEncipherment".into(), "digitalSignature".into()]
        } else {
            vec!["digitalSignature".into()]
        };
        cert.ext_key_usage = vec!["serverAuth".into(), "clientAuth".into()];
        Ok(())
    }
}

/// SSH template and data
#[derive(Debug, Clone, PartialEq)]
pub struct SshTemplateOptions {
    pub source: TemplateSource,
    pub data: TemplateData,
}

impl SshTemplateOptions {
    /// Resolve configured options over `data`
    pub fn new(config: Option<&TemplateConfig>, data: TemplateData) -> Result<Self> {
        let (source, data) = resolve(config, data)?;
        Ok(Self { source, data })
    }

    /// Render the default template into `cert`
    pub fn apply(&self, cert: &mut SshCertificate) -> Result<()> {
        if let TemplateSource::Custom(_) = self.source {
            return Err(custom_template_error());
        }

        let cert_type = self
            .data
            .str_at(&[TYPE_KEY])
            .and_then(SshCertType::parse)
            .ok_or_else(|| MeshcaError::internal("template data has no valid certificate type"))?;
        cert.cert_type = Some(cert_type);
        cert.key_id = self.data.str_at(&[KEY_ID_KEY]).unwrap_or_default().to_string();
        cert.principals = self.data.strings(PRINCIPALS_KEY);
        if cert_type == SshCertType::User {
            cert.extensions = DEFAULT_USER_EXTENSIONS
                .iter()
                .map(|ext| (ext.to_string(), String::new()))
                .collect();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x509::PublicKey;
    use assert_matches::assert_matches;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_x509_data_shape() {
        let data = TemplateData::x509("node-7", &strings(&["node-7", "10.0.0.7"]));
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            json!({
                "Subject": {"commonName": "node-7"},
                "SANs": [{"type": "dns", "value": "node-7"}, {"type": "ip", "value": "10.0.0.7"}]
            })
        );
    }

    #[test]
    fn test_merge_user_data() {
        let mut data = TemplateData::ssh(SshCertType::Host, "node-7", &strings(&["node-7"]));
        data.merge_user_data(&json!({"team": "edge"})).unwrap();
        data.merge_user_data(&Value::Null).unwrap();
        assert_eq!(data.get("team"), Some(&json!("edge")));
        assert_matches!(data.merge_user_data(&json!([1, 2])), Err(MeshcaError::Internal { .. }));
    }

    #[test]
    fn test_options_pick_custom_template() {
        let config = TemplateConfig {
            template: Some("{\"subject\": {{ toJson .Subject }}}".into()),
            template_data: Some(json!({"team": "edge"})),
        };
        let opts = TemplateOptions::new(Some(&config), TemplateData::x509("node-7", &[])).unwrap();
        assert_matches!(opts.source, TemplateSource::Custom(_));
        assert_eq!(opts.data.get("team"), Some(&json!("edge")));

        let bad = TemplateConfig {
            template: None,
            template_data: Some(json!("nope")),
        };
        assert!(TemplateOptions::new(Some(&bad), TemplateData::new()).is_err());
    }

    #[test]
    fn test_default_x509_template() {
        let sans = strings(&["node-7", "10.0.0.7"]);
        let csr = CertificateRequest::new("node-7", &sans, PublicKey::Rsa { bits: 2048 });
        let mut cert = Certificate::for_request(&csr);
        let opts = TemplateOptions::new(None, TemplateData::x509("node-7", &sans)).unwrap();
        opts.apply(&csr, &mut cert).unwrap();
        assert_eq!(cert.common_name, "node-7");
        assert_eq!(cert.dns_names, strings(&["node-7"]));
        assert_eq!(cert.ip_addresses.len(), 1);
        assert_eq!(cert.key_usage, strings(&["keyEncipherment", "digitalSignature"]));
        assert_eq!(cert.ext_key_usage, strings(&["serverAuth", "clientAuth"]));
    }

    #[test]
    fn test_default_ssh_template() {
        let mut cert = SshCertificate::default();
        let opts = SshTemplateOptions::new(
            None,
            TemplateData::ssh(SshCertType::Host, "node-7", &strings(&["node-7", "10.0.0.7"])),
        )
        .unwrap();
        opts.apply(&mut cert).unwrap();
        assert_eq!(cert.cert_type, Some(SshCertType::Host));
        assert_eq!(cert.key_id, "node-7");
        assert_eq!(cert.principals, strings(&["node-7", "10.0.0.7"]));
        assert!(cert.extensions.is_empty());
    }
}
