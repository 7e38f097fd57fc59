//! TLS setup for the hyper transport.
//!
//! A TLS configuration needs a crypto provider and a root store, each picked
//! by cargo features:
//!
//! | concern  | features                                    |
//! |----------|---------------------------------------------|
//! | provider | `tls-ring` (in `tls`), `tls-aws-lc`          |
//! | roots    | `tls-native-roots` (in `tls`), `tls-webpki-roots` |
//!
//! With no provider feature, a process-wide provider installed through
//! `rustls::crypto::CryptoProvider::install_default` is picked up instead.

use std::sync::Arc;

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, RootCertStore};

use crate::builder::ClientBuildError;

const NO_PROVIDER: &str = "no crypto provider: enable `tls-ring` or `tls-aws-lc`, \
                           or call `CryptoProvider::install_default()`";

#[cfg(not(any(feature = "tls-native-roots", feature = "tls-webpki-roots")))]
const NO_ROOTS: &str = "no root certificates: enable `tls-native-roots` or \
                        `tls-webpki-roots`, or pass a custom TLS config";

#[cfg(feature = "tls-ring")]
fn compiled_provider() -> Option<CryptoProvider> {
    Some(rustls::crypto::ring::default_provider())
}

#[cfg(all(feature = "tls-aws-lc", not(feature = "tls-ring")))]
fn compiled_provider() -> Option<CryptoProvider> {
    Some(rustls::crypto::aws_lc_rs::default_provider())
}

#[cfg(not(any(feature = "tls-ring", feature = "tls-aws-lc")))]
fn compiled_provider() -> Option<CryptoProvider> {
    None
}

/// The provider compiled in through features, else the process default.
fn crypto_provider() -> Result<Arc<CryptoProvider>, ClientBuildError> {
    compiled_provider()
        .map(Arc::new)
        .or_else(|| CryptoProvider::get_default().cloned())
        .ok_or_else(|| ClientBuildError::Tls(NO_PROVIDER.into()))
}

/// A client config for `roots`, on the selected provider's safe protocol
/// versions and without client certificates.
#[cfg_attr(
    not(any(feature = "tls-native-roots", feature = "tls-webpki-roots")),
    allow(dead_code)
)]
fn client_config(roots: RootCertStore) -> Result<ClientConfig, ClientBuildError> {
    let config = ClientConfig::builder_with_provider(crypto_provider()?)
        .with_safe_default_protocol_versions()
        .map_err(|err| ClientBuildError::Tls(err.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(config)
}

/// The TLS configuration [`HyperTransport`](super::HyperTransport) uses when
/// none is supplied.
#[cfg(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))]
pub fn default_tls_config() -> Result<ClientConfig, ClientBuildError> {
    client_config(trust_anchors())
}

/// System roots when `tls-native-roots` is on, bundled webpki roots otherwise.
#[cfg(feature = "tls-native-roots")]
fn trust_anchors() -> RootCertStore {
    let loaded = rustls_native_certs::load_native_certs();
    for err in &loaded.errors {
        // partial loads still yield usable roots
        tracing::debug!(error = %err, "skipping unreadable native certificate source");
    }
    let mut store = RootCertStore::empty();
    let (added, ignored) = store.add_parsable_certificates(loaded.certs);
    tracing::debug!(added, ignored, "native trust anchors");
    store
}

#[cfg(all(feature = "tls-webpki-roots", not(feature = "tls-native-roots")))]
fn trust_anchors() -> RootCertStore {
    RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    }
}

#[cfg(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))]
fn fallback_config() -> Result<ClientConfig, ClientBuildError> {
    default_tls_config()
}

#[cfg(not(any(feature = "tls-native-roots", feature = "tls-webpki-roots")))]
fn fallback_config() -> Result<ClientConfig, ClientBuildError> {
    // report a missing provider before missing roots
    crypto_provider()?;
    Err(ClientBuildError::Tls(NO_ROOTS.into()))
}

/// A connector for both `https://` and plain `http://` URLs.
///
/// `tls_config` overrides the feature-selected configuration.
///
/// # Errors
///
/// [`ClientBuildError::Tls`] when no configuration is given and the enabled
/// features lack either a crypto provider or a root store.
pub fn build_https_connector(
    tls_config: Option<ClientConfig>,
) -> Result<HttpsConnector<HttpConnector>, ClientBuildError> {
    let tls = tls_config.map_or_else(fallback_config, Ok)?;
    let connector = HttpsConnectorBuilder::new()
        .with_tls_config(tls)
        .https_or_http()
        .enable_all_versions()
        .build();
    Ok(connector)
}
