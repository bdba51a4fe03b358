use enum_dispatch::enum_dispatch;
pub use r01::{R01Client, R01_API_URL};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

mod r01;

/// A domain (zone) managed by the registrar account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Domain {
    pub id: u64,
    /// The zone apex, e.g. "example.com"
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
/// Represents a DNS record
pub struct Record {
    /// Unique identifier for the record
    pub id: u64,
    /// The name of the DNS record (e.g., "_acme-challenge.example.com")
    pub name: String,
    /// The type of DNS record (e.g., "TXT" for ACME challenges)
    pub r#type: String,
    #[serde(default)]
    pub ttl: u32,
}

/// Body of a record creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRecord {
    pub name: String,
    pub r#type: String,
    pub ttl: u32,
    /// The record value (the TXT content for ACME challenges)
    pub data: String,
    /// Free-form note shown in the registrar's control panel
    pub info: String,
}

impl NewRecord {
    pub fn txt(name: &str, ttl: u32, data: &str, info: &str) -> Self {
        Self {
            name: name.to_string(),
            r#type: "TXT".to_string(),
            ttl,
            data: data.to_string(),
            info: info.to_string(),
        }
    }
}

#[enum_dispatch]
#[allow(async_fn_in_trait)]
pub trait Dns01Api {
    /// Lists every domain in the account.
    async fn list_domains(&self) -> Result<Vec<Domain>>;

    /// Lists all records of a domain.
    async fn list_records(&self, domain_id: u64) -> Result<Vec<Record>>;

    /// Creates a DNS record in the given domain.
    ///
    /// Returns the ID of the created record.
    async fn create_record(&self, domain_id: u64, record: &NewRecord) -> Result<u64>;

    /// Remove a DNS record.
    ///
    /// Deletes a DNS record using its unique identifier.
    async fn delete_record(&self, domain_id: u64, record_id: u64) -> Result<()>;

    /// Finds the ID of the domain that hosts `fqdn`.
    async fn resolve_domain_id(&self, fqdn: &str) -> Result<u64> {
        let domains = self.list_domains().await?;
        Ok(find_domain(&domains, fqdn)?.id)
    }

    /// Get the TXT records with exactly the given name.
    async fn get_txt_records(&self, domain_id: u64, name: &str) -> Result<Vec<Record>> {
        Ok(self
            .list_records(domain_id)
            .await?
            .into_iter()
            .filter(|record| record.r#type == "TXT" && record.name == name)
            .collect())
    }
}

/// A DNS-01 client.
#[derive(Debug)]
#[enum_dispatch(Dns01Api)]
pub enum Dns01Client {
    R01(R01Client),
}

impl Dns01Client {
    pub fn new_r01(api_url: String, api_token: String) -> Self {
        Self::R01(R01Client::new(api_url, api_token))
    }
}

/// Picks the domain hosting `fqdn`.
///
/// An exact match wins. Otherwise the domain with the longest name that `fqdn`
/// ends with (on a label boundary) is chosen, so a delegated `sub.example.com`
/// beats `example.com` for `a.sub.example.com`.
pub fn find_domain<'a>(domains: &'a [Domain], fqdn: &str) -> Result<&'a Domain> {
    let fqdn = fqdn.trim_end_matches('.').to_ascii_lowercase();
    if let Some(exact) = domains
        .iter()
        .find(|d| d.domain.eq_ignore_ascii_case(&fqdn))
    {
        return Ok(exact);
    }
    domains
        .iter()
        .filter(|d| {
            let suffix = format!(".{}", d.domain.to_ascii_lowercase());
            fqdn.ends_with(&suffix)
        })
        .max_by_key(|d| d.domain.len())
        .ok_or_else(|| Error::DomainNotFound(fqdn.clone()))
}
