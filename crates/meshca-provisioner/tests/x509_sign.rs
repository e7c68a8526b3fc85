//! X.509 sign authorization end to end

use assert_matches::assert_matches;
use chrono::Duration;
use meshca_core::{MeshcaError, TimeDuration};
use meshca_provisioner::pipeline::apply_x509;
use meshca_provisioner::sign_options::CertificateRequestValidator;
use meshca_provisioner::{
    CertificateRequest, Interface, ProvisionerType, PublicKey, SignOption, SignOptionKind,
    SignOptions,
};
use meshca_testkit::{test_now, NebulaFixture, NODE_NAME, PROVISIONER_NAME};
use proptest::prelude::*;

fn request(cn: &str, sans: &[&str]) -> CertificateRequest {
    let sans: Vec<String> = sans.iter().map(|s| s.to_string()).collect();
    CertificateRequest::new(cn, &sans, PublicKey::Ed25519)
}

fn sans_validator(options: &[SignOption]) -> &dyn CertificateRequestValidator {
    options
        .iter()
        .find_map(|o| match o {
            SignOption::NebulaSans(v) => Some(v as &dyn CertificateRequestValidator),
            _ => None,
        })
        .expect("sans validator present")
}

#[test]
fn test_node_token_yields_seven_options() {
    let fx = NebulaFixture::new();
    let token = fx.node_token(&fx.sign_audience()).sign();

    let options = fx.provisioner.authorize_sign(&token).unwrap();
    assert_eq!(options.len(), 7);

    let kinds: Vec<SignOptionKind> = options.iter().map(SignOption::kind).collect();
    assert_eq!(
        kinds,
        vec![
            SignOptionKind::TemplateSource,
            SignOptionKind::Modifier,
            SignOptionKind::Modifier,
            SignOptionKind::Validator,
            SignOptionKind::Validator,
            SignOptionKind::Validator,
            SignOptionKind::Validator,
        ]
    );
    assert_matches!(&options[1], SignOption::ProvisionerExtension(ext)
        if ext.provisioner_type == ProvisionerType::Nebula && ext.name == PROVISIONER_NAME);
}

#[test]
fn test_template_data_carries_token_and_certificate() {
    let fx = NebulaFixture::new();
    let token = fx.node_token(&fx.sign_audience()).sign();
    let options = fx.provisioner.authorize_sign(&token).unwrap();

    let template = options[0].as_template().unwrap();
    assert_eq!(
        template.data.get("Subject"),
        Some(&serde_json::json!({"commonName": NODE_NAME}))
    );
    assert_eq!(
        template.data.get("Token").and_then(|t| t.get("jti")),
        Some(&serde_json::json!("token-1"))
    );
    assert_eq!(
        template
            .data
            .get("Cert")
            .and_then(|c| c.pointer("/details/name")),
        Some(&serde_json::json!(NODE_NAME))
    );
}

#[test]
fn test_pipeline_issues_node_certificate() {
    let fx = NebulaFixture::new();
    let token = fx.node_token(&fx.sign_audience()).sign();
    let options = fx.provisioner.authorize_sign(&token).unwrap();

    let opts = SignOptions {
        backdate: Duration::minutes(1),
        ..SignOptions::default()
    };
    let cert = apply_x509(&options, &request(NODE_NAME, &[NODE_NAME, "10.0.0.7"]), &opts).unwrap();
    assert_eq!(cert.common_name, NODE_NAME);
    assert_eq!(cert.dns_names, vec![NODE_NAME.to_string()]);
    assert_eq!(cert.not_before, Some(test_now() - Duration::minutes(1)));
    assert_eq!(cert.not_after, Some(test_now() + Duration::hours(24)));
    assert_eq!(cert.provisioner.unwrap().name, PROVISIONER_NAME);
}

#[test]
fn test_unlisted_san_is_forbidden() {
    let fx = NebulaFixture::new();
    let token = fx
        .node_token(&fx.sign_audience())
        .sans(&["node-9"])
        .sign();
    let options = fx.provisioner.authorize_sign(&token).unwrap();

    let err = sans_validator(&options)
        .valid(&request(NODE_NAME, &["node-9"]))
        .unwrap_err();
    assert_matches!(&err, MeshcaError::Forbidden { message } if message.contains("node-9"));
}

#[test]
fn test_token_without_sans_issues_no_sans() {
    let fx = NebulaFixture::new();
    let token = fx
        .node_token(&fx.sign_audience())
        .without_claim("sans")
        .sign();
    let options = fx.provisioner.authorize_sign(&token).unwrap();
    assert_eq!(
        options[0].as_template().unwrap().data.get("SANs"),
        Some(&serde_json::json!([]))
    );

    let cert = apply_x509(
        &options,
        &request(NODE_NAME, &[NODE_NAME, "10.0.0.7"]),
        &SignOptions::default(),
    )
    .unwrap();
    assert_eq!(cert.common_name, NODE_NAME);
    assert!(cert.dns_names.is_empty());
    assert!(cert.ip_addresses.is_empty());
}

#[test]
fn test_validity_limited_by_credential_and_claims() {
    let fx = NebulaFixture::new();
    let token = fx.node_token(&fx.sign_audience()).sign();
    let options = fx.provisioner.authorize_sign(&token).unwrap();
    let csr = request(NODE_NAME, &[NODE_NAME]);

    let beyond_credential = SignOptions {
        not_after: TimeDuration::Relative(Duration::days(60)),
        ..SignOptions::default()
    };
    assert_matches!(
        apply_x509(&options, &csr, &beyond_credential),
        Err(MeshcaError::Forbidden { .. })
    );

    let too_long = SignOptions {
        not_after: TimeDuration::Relative(Duration::hours(48)),
        ..SignOptions::default()
    };
    assert_matches!(apply_x509(&options, &csr, &too_long), Err(MeshcaError::Forbidden { .. }));

    let too_short = SignOptions {
        not_after: TimeDuration::Relative(Duration::minutes(1)),
        ..SignOptions::default()
    };
    assert_matches!(apply_x509(&options, &csr, &too_short), Err(MeshcaError::Forbidden { .. }));
}

#[test]
fn test_common_name_must_match_subject() {
    let fx = NebulaFixture::new();
    let token = fx.node_token(&fx.sign_audience()).sign();
    let options = fx.provisioner.authorize_sign(&token).unwrap();
    assert_matches!(
        apply_x509(&options, &request("node-9", &[]), &SignOptions::default()),
        Err(MeshcaError::Forbidden { .. })
    );
}

#[test]
fn test_custom_template_data_is_merged() {
    let fx = NebulaFixture::new();
    let provisioner = fx
        .init(|config| {
            config.options = serde_json::from_value(serde_json::json!({
                "x509": {"templateData": {"team": "edge"}}
            }))
            .ok();
        })
        .unwrap();
    let token = fx.node_token(&fx.sign_audience()).sign();
    let options = provisioner.authorize_sign(&token).unwrap();
    assert_eq!(
        options[0].as_template().unwrap().data.get("team"),
        Some(&serde_json::json!("edge"))
    );
}

#[test]
fn test_sub_ca_token_uses_eddsa() {
    let fx = NebulaFixture::new();
    let now = test_now();
    let sub = fx
        .ca
        .issue_sub_ca("mesh-intermediate", now - Duration::hours(1), now + Duration::days(90));
    let token = sub
        .token()
        .issuer(PROVISIONER_NAME)
        .subject("mesh-intermediate")
        .audience(&fx.sign_audience())
        .valid_at(now)
        .sign();
    let options = fx.provisioner.authorize_sign(&token).unwrap();
    assert_eq!(options.len(), 7);
}

fn san_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9-]{1,10}(\\.[a-z]{2,5})?",
        (0u8..4, any::<u8>()).prop_map(|(c, d)| format!("10.0.{c}.{d}")),
        "[a-z]{1,6}@[a-z]{1,6}\\.com",
        "https://[a-z]{1,8}\\.example/[a-z]{0,6}",
        Just(NODE_NAME.to_string()),
        Just("10.0.0.7".to_string()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_sans_validator_is_deterministic(sans in prop::collection::vec(san_strategy(), 0..6)) {
        let fx = NebulaFixture::new();
        let token = fx.node_token(&fx.sign_audience()).sign();
        let options = fx.provisioner.authorize_sign(&token).unwrap();
        let validator = sans_validator(&options);

        let sans: Vec<&str> = sans.iter().map(String::as_str).collect();
        let req = request(NODE_NAME, &sans);
        let first = validator.valid(&req);
        let second = validator.valid(&req);
        prop_assert_eq!(first, second);
    }
}
