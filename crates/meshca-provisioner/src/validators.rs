//! Identity consistency checks against the verified mesh certificate
//!
//! A mesh node may only ask for names and addresses its own certificate
//! vouches for: its name (classified like any SAN) and the addresses of its
//! overlay networks.

use crate::sign_options::{
    CertificateRequestValidator, DnsNamesValidator, EmailAddressesValidator,
    SshCertificateOptionsValidator, UrisValidator,
};
use crate::ssh::SignSshOptions;
use crate::x509::{split_sans, CertificateRequest};
use meshca_core::{MeshcaError, Result};
use meshca_nebula::Ipv4Net;
use std::net::IpAddr;

fn same_ip(ip: IpAddr, other: IpAddr) -> bool {
    ip.to_canonical() == other.to_canonical()
}

/// Restricts requested SANs to the mesh identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NebulaSansValidator {
    /// Mesh certificate name
    pub name: String,
    /// Mesh certificate networks
    pub networks: Vec<Ipv4Net>,
}

impl NebulaSansValidator {
    /// Validator for `name` with `networks`
    pub fn new(name: impl Into<String>, networks: Vec<Ipv4Net>) -> Self {
        Self {
            name: name.into(),
            networks,
        }
    }
}

impl CertificateRequestValidator for NebulaSansValidator {
    fn valid(&self, csr: &CertificateRequest) -> Result<()> {
        let allowed = split_sans(std::slice::from_ref(&self.name));

        if !csr.dns_names.is_empty() {
            DnsNamesValidator(allowed.dns_names).valid(csr)?;
        }
        if !csr.email_addresses.is_empty() {
            EmailAddressesValidator(allowed.emails).valid(csr)?;
        }
        if !csr.uris.is_empty() {
            UrisValidator(allowed.uris).valid(csr)?;
        }

        let network_ips = self.networks.iter().map(|n| IpAddr::V4(n.addr()));
        let allowed_ips: Vec<IpAddr> = allowed.ips.iter().copied().chain(network_ips).collect();
        for ip in &csr.ip_addresses {
            if !allowed_ips.iter().any(|a| same_ip(*ip, *a)) {
                return Err(MeshcaError::forbidden(format!(
                    "certificate request contains invalid IP addresses - got {:?}, want {:?}",
                    csr.ip_addresses, allowed_ips
                )));
            }
        }
        Ok(())
    }
}

/// Restricts requested SSH principals to the mesh identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NebulaPrincipalsValidator {
    /// Mesh certificate name
    pub name: String,
    /// Mesh certificate networks
    pub networks: Vec<Ipv4Net>,
}

impl NebulaPrincipalsValidator {
    /// Validator for `name` with `networks`
    pub fn new(name: impl Into<String>, networks: Vec<Ipv4Net>) -> Self {
        Self {
            name: name.into(),
            networks,
        }
    }

    fn allows(&self, principal: &str) -> bool {
        if principal == self.name {
            return true;
        }
        principal.parse::<IpAddr>().is_ok_and(|ip| {
            self.networks
                .iter()
                .any(|n| same_ip(ip, IpAddr::V4(n.addr())))
        })
    }
}

impl SshCertificateOptionsValidator for NebulaPrincipalsValidator {
    fn valid(&self, got: &SignSshOptions) -> Result<()> {
        if got.principals.iter().all(|p| self.allows(p)) {
            return Ok(());
        }
        let ips: Vec<String> = self.networks.iter().map(|n| n.addr().to_string()).collect();
        Err(MeshcaError::forbidden(format!(
            "ssh certificate principals contains invalid name or ip addresses - got {:?}, want {} or {:?}",
            got.principals, self.name, ips
        )))
    }
}
