//! Nebula provisioner
//!
//! Authorizes certificate requests from nodes of a Nebula overlay network.
//! A node proves itself with a token signed by the key of its mesh
//! certificate; the certificate travels in the token header and must chain to
//! one of the configured mesh roots. Issued certificates are confined to the
//! identity that certificate asserts.

use crate::audiences::{matches_audience, Audiences};
use crate::claimer::Claimer;
use crate::config::{GlobalConfig, Options, ProvisionerConfig, TemplateConfig};
use crate::provisioner::{Interface, ProvisionerType};
use crate::sign_options::{
    CommonNameValidator, DefaultPublicKeyValidator, ProfileLimitDuration,
    ProvisionerExtensionOption, SignOption, SshCertDefaultValidator, SshCertOptionsValidator,
    SshCertValidAfterModifier, SshCertValidBeforeModifier, SshCertValidityValidator,
    SshCertificateOptionsValidator, SshDefaultPublicKeyValidator, SshLimitDuration,
    ValidityValidator,
};
use crate::ssh::{unix_seconds, SignSshOptions, SshCertType, SshCertificate, SSH_HOST_CERT};
use crate::template::{SshTemplateOptions, TemplateData, TemplateOptions, CERT_KEY, TOKEN_KEY};
use crate::token::{Expected, SignedToken, TokenPayload, DEFAULT_LEEWAY, NEBULA_CERT_HEADER};
use crate::validators::{NebulaPrincipalsValidator, NebulaSansValidator};
use crate::x509::Certificate;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use meshca_core::{ConfigValidator, MeshcaError, PhysicalClock, Result, SystemClock};
use meshca_nebula::{CaPool, NebulaCertificate, VerificationKey};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A verified token and the mesh certificate that signed it
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizedToken {
    /// Certificate from the `nbc` header, verified against the pool
    pub certificate: NebulaCertificate,
    /// Validated claims
    pub payload: TokenPayload,
    /// The payload as plain JSON, for template data
    pub raw_claims: Option<serde_json::Value>,
}

/// Provisioner backed by a pool of Nebula roots
pub struct Nebula {
    id: String,
    name: String,
    options: Option<Options>,
    claimer: Claimer,
    ca_pool: CaPool,
    audiences: Audiences,
    clock: Arc<dyn PhysicalClock>,
}

impl fmt::Debug for Nebula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nebula")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("claimer", &self.claimer)
            .field("roots", &self.ca_pool.len())
            .field("audiences", &self.audiences)
            .finish_non_exhaustive()
    }
}

impl Nebula {
    /// Start a provisioner on the system clock
    pub fn init(config: ProvisionerConfig, global: &GlobalConfig) -> Result<Self> {
        Self::init_with_clock(config, global, Arc::new(SystemClock))
    }

    /// Start a provisioner reading time from `clock`
    ///
    /// Fails with a configuration error when type, name or roots are missing
    /// or the claims are inconsistent, and with an internal error when the
    /// roots cannot be loaded into a pool.
    pub fn init_with_clock(
        config: ProvisionerConfig,
        global: &GlobalConfig,
        clock: Arc<dyn PhysicalClock>,
    ) -> Result<Self> {
        let mut validator = ConfigValidator::new().for_field("provisioner");
        validator
            .non_empty("type", &config.provisioner_type)
            .non_empty("name", &config.name)
            .non_empty_bytes("roots", &config.roots);
        validator.result()?;

        let claimer = Claimer::new(config.claims.as_ref(), &global.claims)?;
        let ca_pool = CaPool::from_pem_bytes(&config.roots, clock.now())
            .map_err(|e| MeshcaError::internal_with(e, "failed to create ca pool"))?;

        let token_id = token_id_for(&config.name);
        let audiences = global.audiences.with_fragment(&token_id);
        let id = if config.id.is_empty() {
            token_id
        } else {
            config.id
        };

        info!(
            provisioner = %config.name,
            roots = ca_pool.len(),
            ssh = claimer.is_ssh_ca_enabled(),
            "initialized nebula provisioner"
        );

        Ok(Self {
            id,
            name: config.name,
            options: config.options,
            claimer,
            ca_pool,
            audiences,
            clock,
        })
    }

    /// Resolved issuance policy
    pub fn claimer(&self) -> &Claimer {
        &self.claimer
    }

    /// Audiences scoped to this provisioner
    pub fn audiences(&self) -> &Audiences {
        &self.audiences
    }

    /// Trusted mesh roots
    pub fn ca_pool(&self) -> &CaPool {
        &self.ca_pool
    }

    /// Verify `token` for an operation accepting `audiences`
    pub fn authorize_token(&self, token: &str, audiences: &[String]) -> Result<AuthorizedToken> {
        let result = self.verify_token(token, audiences);
        match &result {
            Ok(authorized) => debug!(
                provisioner = %self.name,
                subject = %authorized.payload.claims.subject,
                node = %authorized.certificate.details.name,
                "accepted nebula token"
            ),
            Err(err) => warn!(provisioner = %self.name, error = %err, "rejected nebula token"),
        }
        result
    }

    fn verify_token(&self, token: &str, audiences: &[String]) -> Result<AuthorizedToken> {
        let jws = SignedToken::parse(token)
            .map_err(|e| MeshcaError::unauthorized_with(e, "failed to parse token"))?;

        let encoded = match jws.header().extra.get(NEBULA_CERT_HEADER) {
            None => {
                return Err(MeshcaError::unauthorized(format!(
                    "failed to parse token: {NEBULA_CERT_HEADER} header is missing"
                )))
            }
            Some(value) => value.as_str().ok_or_else(|| {
                MeshcaError::unauthorized(format!(
                    "failed to parse token: {NEBULA_CERT_HEADER} header is not a string"
                ))
            })?,
        };
        let pem = URL_SAFE_NO_PAD.decode(encoded).map_err(|e| {
            MeshcaError::unauthorized_with(e, format!("failed to parse token: invalid {NEBULA_CERT_HEADER} header"))
        })?;
        let (certificate, _) = NebulaCertificate::from_pem(&pem)
            .map_err(|e| MeshcaError::unauthorized_with(e, "failed to parse nebula certificate"))?;

        let now = self.clock.now();
        self.ca_pool.verify(&certificate, now).map_err(|e| {
            MeshcaError::unauthorized_with(e, "token is not valid: failed to verify certificate against configured CA")
        })?;

        let key = VerificationKey::for_certificate(&certificate)
            .map_err(|e| MeshcaError::unauthorized_with(e, "failed to read nebula certificate key"))?;
        let payload: TokenPayload = jws
            .verify(&key)
            .map_err(|e| MeshcaError::unauthorized_with(e, "failed to verify token"))?;

        let expected = Expected {
            issuer: self.name.clone(),
            time: now,
        };
        payload
            .claims
            .validate_with_leeway(&expected, DEFAULT_LEEWAY)
            .map_err(|e| MeshcaError::unauthorized_with(e, "failed to validate token"))?;

        if !matches_audience(&payload.claims.audience, audiences) {
            return Err(MeshcaError::unauthorized(format!(
                "invalid token: invalid audience claim (aud) {:?}",
                payload.claims.audience
            )));
        }
        if payload.claims.subject.is_empty() {
            return Err(MeshcaError::unauthorized("token subject cannot be empty"));
        }

        Ok(AuthorizedToken {
            certificate,
            payload,
            raw_claims: jws.unsafe_claims_without_verification().ok(),
        })
    }

    fn template_data(&self, mut data: TemplateData, authorized: &AuthorizedToken) -> Result<TemplateData> {
        if let Some(raw) = &authorized.raw_claims {
            data.set(TOKEN_KEY, raw.clone());
        }
        data.set_serialized(CERT_KEY, &authorized.certificate)?;
        Ok(data)
    }

    fn x509_options(&self) -> Option<&TemplateConfig> {
        self.options.as_ref().and_then(Options::x509_options)
    }

    fn ssh_options(&self) -> Option<&TemplateConfig> {
        self.options.as_ref().and_then(Options::ssh_options)
    }

    fn ssh_disabled(&self) -> MeshcaError {
        MeshcaError::unauthorized(format!(
            "ssh is disabled for nebula provisioner '{}'",
            self.name
        ))
    }
}

/// Name and overlay addresses asserted by a mesh certificate
fn identity(certificate: &NebulaCertificate) -> Vec<String> {
    std::iter::once(certificate.details.name.clone())
        .chain(certificate.details.ips.iter().map(|ip| ip.addr().to_string()))
        .collect()
}

fn token_id_for(name: &str) -> String {
    format!("nebula/{name}")
}

impl Interface for Nebula {
    fn get_id(&self) -> &str {
        &self.id
    }

    fn get_id_for_token(&self) -> String {
        token_id_for(&self.name)
    }

    fn get_token_id(&self, token: &str) -> Result<String> {
        let jws = SignedToken::parse(token)
            .map_err(|e| MeshcaError::unauthorized_with(e, "error parsing token"))?;
        let payload: TokenPayload = jws
            .unsafe_claims_without_verification()
            .map_err(|e| MeshcaError::unauthorized_with(e, "error verifying claims"))?;
        Ok(payload.claims.id)
    }

    fn get_name(&self) -> &str {
        &self.name
    }

    fn get_type(&self) -> ProvisionerType {
        ProvisionerType::Nebula
    }

    fn get_encrypted_key(&self) -> Option<(String, String)> {
        None
    }

    fn authorize_sign(&self, token: &str) -> Result<Vec<SignOption>> {
        let authorized = self.authorize_token(token, &self.audiences.sign)?;
        let crt = &authorized.certificate;
        let claims = &authorized.payload;

        let data = self.template_data(TemplateData::x509(&claims.claims.subject, &claims.sans), &authorized)?;
        let template = TemplateOptions::new(self.x509_options(), data)?;
        let now = self.clock.now();

        Ok(vec![
            SignOption::Template(template),
            SignOption::ProvisionerExtension(ProvisionerExtensionOption::new(
                ProvisionerType::Nebula,
                self.name.clone(),
            )),
            SignOption::ProfileLimitDuration(ProfileLimitDuration {
                default: self.claimer.default_tls_cert_duration(),
                not_before: crt.details.not_before,
                not_after: crt.details.not_after,
                now,
            }),
            SignOption::CommonName(CommonNameValidator::new(claims.claims.subject.clone())),
            SignOption::NebulaSans(NebulaSansValidator::new(
                crt.details.name.clone(),
                crt.details.ips.clone(),
            )),
            SignOption::DefaultPublicKey(DefaultPublicKeyValidator),
            SignOption::Validity(ValidityValidator {
                min: self.claimer.min_tls_cert_duration(),
                max: self.claimer.max_tls_cert_duration(),
                now,
            }),
        ])
    }

    fn authorize_ssh_sign(&self, token: &str) -> Result<Vec<SignOption>> {
        if !self.claimer.is_ssh_ca_enabled() {
            return Err(self.ssh_disabled());
        }
        let authorized = self.authorize_token(token, &self.audiences.ssh_sign)?;
        let crt = &authorized.certificate;
        let claims = &authorized.payload;

        let mut key_id = claims.claims.subject.clone();
        let mut principals = identity(crt);
        let mut sign_options = Vec::new();
        let now = self.clock.now();

        if let Some(opts) = claims.ssh_options() {
            NebulaPrincipalsValidator::new(crt.details.name.clone(), crt.details.ips.clone()).valid(opts)?;

            if !opts.cert_type.is_empty() && opts.cert_type != SSH_HOST_CERT {
                return Err(MeshcaError::forbidden(format!(
                    "ssh certificate type does not match - got {}, want {SSH_HOST_CERT}",
                    opts.cert_type
                )));
            }

            sign_options.push(SignOption::SshCertOptions(SshCertOptionsValidator(SignSshOptions {
                cert_type: SSH_HOST_CERT.to_string(),
                key_id: key_id.clone(),
                ..SignSshOptions::default()
            })));
            sign_options.push(SignOption::SshCertOptions(SshCertOptionsValidator(opts.clone())));

            if !opts.key_id.is_empty() {
                key_id.clone_from(&opts.key_id);
            }
            if !opts.principals.is_empty() {
                principals.clone_from(&opts.principals);
            }
            if let Some(t) = opts.valid_after.relative_time(now) {
                sign_options.push(SignOption::SshValidAfter(SshCertValidAfterModifier(unix_seconds(t))));
            }
            if let Some(t) = opts.valid_before.relative_time(now) {
                sign_options.push(SignOption::SshValidBefore(SshCertValidBeforeModifier(unix_seconds(t))));
            }
        }

        let data = self.template_data(TemplateData::ssh(SshCertType::Host, &key_id, &principals), &authorized)?;
        let template = SshTemplateOptions::new(self.ssh_options(), data)?;

        sign_options.extend([
            SignOption::SshTemplate(template),
            SignOption::SshLimitDuration(SshLimitDuration {
                user: self.claimer.user_ssh(),
                host: self.claimer.host_ssh(),
                not_after: Some(crt.details.not_after),
                now,
            }),
            SignOption::SshDefaultPublicKey(SshDefaultPublicKeyValidator),
            SignOption::SshValidity(SshCertValidityValidator {
                user: self.claimer.user_ssh(),
                host: self.claimer.host_ssh(),
                now,
            }),
            SignOption::SshDefault(SshCertDefaultValidator { now }),
        ]);
        Ok(sign_options)
    }

    fn authorize_renew(&self, _cert: &Certificate) -> Result<()> {
        if self.claimer.is_disable_renewal() {
            return Err(MeshcaError::unauthorized(format!(
                "renew is disabled for nebula provisioner '{}'",
                self.name
            )));
        }
        Ok(())
    }

    fn authorize_revoke(&self, token: &str) -> Result<()> {
        self.authorize_token(token, &self.audiences.revoke).map(|_| ())
    }

    fn authorize_ssh_revoke(&self, token: &str) -> Result<()> {
        if !self.claimer.is_ssh_ca_enabled() {
            return Err(self.ssh_disabled());
        }
        self.authorize_token(token, &self.audiences.revoke).map(|_| ())
    }

    fn authorize_ssh_renew(&self, _token: &str) -> Result<SshCertificate> {
        Err(MeshcaError::unauthorized(
            "nebula provisioner does not support SSH renew",
        ))
    }

    fn authorize_ssh_rekey(&self, _token: &str) -> Result<(SshCertificate, Vec<SignOption>)> {
        Err(MeshcaError::unauthorized(
            "nebula provisioner does not support SSH rekey",
        ))
    }
}
