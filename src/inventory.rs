//! Cluster inventory: TLS secrets and ingresses.
//!
//! The pipeline only sees the plain structs below; `KubeInventory` converts
//! Kubernetes API objects into them. Listing failures are fatal for a run.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::networking::v1::Ingress as KubeIngress;
use kube::api::ListParams;
use kube::{Api, Client};

use crate::errors::{CheckerError, Result};

/// Secret type carrying a certificate / key pair.
pub const TLS_SECRET_TYPE: &str = "kubernetes.io/tls";

/// Data key holding the PEM certificate in a TLS secret.
pub const TLS_CERT_KEY: &str = "tls.crt";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSecret {
    pub name: String,
    pub namespace: String,
    pub secret_type: String,
    /// Contents of `tls.crt`; empty when the key is absent.
    pub certificate: Vec<u8>,
}

impl TlsSecret {
    pub fn is_tls(&self) -> bool {
        self.secret_type == TLS_SECRET_TYPE
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngressRule {
    pub host: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngressTls {
    pub secret_name: String,
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ingress {
    pub name: String,
    pub namespace: String,
    pub rules: Vec<IngressRule>,
    pub tls: Vec<IngressTls>,
}

impl Ingress {
    /// True when one of the TLS blocks names `secret`.
    pub fn references_secret(&self, secret: &str) -> bool {
        self.tls.iter().any(|t| t.secret_name == secret)
    }
}

/// Everything one run evaluates.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub secrets: Vec<TlsSecret>,
    pub ingresses: Vec<Ingress>,
}

/// Read-only inventory listing.
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn list_secrets(&self) -> Result<Vec<TlsSecret>>;
    async fn list_ingresses(&self) -> Result<Vec<Ingress>>;

    /// Secrets first, then ingresses; the first failure aborts.
    async fn fetch(&self) -> Result<Inventory> {
        let secrets = self.list_secrets().await?;
        let ingresses = self.list_ingresses().await?;
        Ok(Inventory { secrets, ingresses })
    }
}

/// Cluster-wide listing through the Kubernetes API.
pub struct KubeInventory {
    client: Client,
}

impl KubeInventory {
    /// In-cluster service account first, local kubeconfig otherwise.
    pub async fn connect() -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| CheckerError::inventory("cluster client", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl InventorySource for KubeInventory {
    async fn list_secrets(&self) -> Result<Vec<TlsSecret>> {
        let api: Api<Secret> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| CheckerError::inventory("secrets", e))?;
        Ok(list.items.into_iter().map(TlsSecret::from).collect())
    }

    async fn list_ingresses(&self) -> Result<Vec<Ingress>> {
        let api: Api<KubeIngress> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| CheckerError::inventory("ingresses", e))?;
        Ok(list.items.into_iter().map(Ingress::from).collect())
    }
}

impl From<Secret> for TlsSecret {
    fn from(secret: Secret) -> Self {
        let certificate = secret
            .data
            .and_then(|mut data| data.remove(TLS_CERT_KEY))
            .map(|bytes| bytes.0)
            .unwrap_or_default();
        Self {
            name: secret.metadata.name.unwrap_or_default(),
            namespace: secret.metadata.namespace.unwrap_or_default(),
            secret_type: secret.type_.unwrap_or_default(),
            certificate,
        }
    }
}

impl From<KubeIngress> for Ingress {
    fn from(ingress: KubeIngress) -> Self {
        let spec = ingress.spec.unwrap_or_default();
        let rules = spec
            .rules
            .unwrap_or_default()
            .into_iter()
            .map(|r| IngressRule {
                host: r.host.unwrap_or_default(),
            })
            .collect();
        let tls = spec
            .tls
            .unwrap_or_default()
            .into_iter()
            .map(|t| IngressTls {
                secret_name: t.secret_name.unwrap_or_default(),
                hosts: t.hosts.unwrap_or_default(),
            })
            .collect();
        Self {
            name: ingress.metadata.name.unwrap_or_default(),
            namespace: ingress.metadata.namespace.unwrap_or_default(),
            rules,
            tls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::ByteString;
    use k8s_openapi::api::networking::v1::{IngressRule as KubeRule, IngressSpec, IngressTLS};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn meta(name: &str, ns: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.into()),
            namespace: Some(ns.into()),
            ..Default::default()
        }
    }

    #[test]
    fn converts_tls_secret() {
        let mut data = BTreeMap::new();
        data.insert(TLS_CERT_KEY.to_string(), ByteString(b"PEM".to_vec()));
        data.insert("tls.key".to_string(), ByteString(b"KEY".to_vec()));
        let secret = Secret {
            metadata: meta("web-tls", "shop"),
            type_: Some(TLS_SECRET_TYPE.into()),
            data: Some(data),
            ..Default::default()
        };

        let converted = TlsSecret::from(secret);
        assert_eq!(converted.name, "web-tls");
        assert_eq!(converted.namespace, "shop");
        assert!(converted.is_tls());
        assert_eq!(converted.certificate, b"PEM".to_vec());
    }

    #[test]
    fn opaque_secret_without_cert() {
        let secret = Secret {
            metadata: meta("creds", "shop"),
            type_: Some("Opaque".into()),
            ..Default::default()
        };
        let converted = TlsSecret::from(secret);
        assert!(!converted.is_tls());
        assert!(converted.certificate.is_empty());
    }

    #[test]
    fn converts_ingress() {
        let ingress = KubeIngress {
            metadata: meta("storefront", "shop"),
            spec: Some(IngressSpec {
                rules: Some(vec![
                    KubeRule {
                        host: Some("shop.example.com".into()),
                        ..Default::default()
                    },
                    KubeRule::default(),
                ]),
                tls: Some(vec![IngressTLS {
                    hosts: Some(vec!["shop.example.com".into()]),
                    secret_name: Some("web-tls".into()),
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let converted = Ingress::from(ingress);
        assert_eq!(converted.rules.len(), 2);
        assert_eq!(converted.rules[0].host, "shop.example.com");
        assert_eq!(converted.rules[1].host, "");
        assert!(converted.references_secret("web-tls"));
        assert!(!converted.references_secret("other-tls"));
    }
}
