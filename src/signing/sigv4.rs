//! SigV4 canonical request construction and signature derivation.

use super::hash::{hex_hmac_sha256, hex_sha256, hmac_sha256};
use super::SigningError;
use chrono::{DateTime, Utc};
use http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, HOST};
use http::{Method, Uri};
use std::collections::BTreeMap;
use std::fmt::{self, Write};
use tracing::debug;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const X_AMZ_DATE: &str = "x-amz-date";
pub const X_AMZ_CONTENT_SHA_256: &str = "x-amz-content-sha256";
pub const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

const TERMINATOR: &str = "aws4_request";

/// Access key, secret key and optional session token used for one signature
#[derive(Clone, PartialEq, Eq)]
pub struct SigningCredential {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl SigningCredential {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }
}

impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Headers derived by signing one request
///
/// Valid for a single request only: the signature is bound to `amz_date`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequestHeaders {
    pub amz_date: String,
    pub content_sha256: String,
    pub security_token: Option<String>,
    pub signed_headers: String,
    pub signature: String,
    pub authorization: String,
}

impl SignedRequestHeaders {
    /// Attach the signing headers to an outbound header map
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<(), SigningError> {
        headers.insert(
            HeaderName::from_static(X_AMZ_DATE),
            header_value(X_AMZ_DATE, &self.amz_date)?,
        );
        headers.insert(
            HeaderName::from_static(X_AMZ_CONTENT_SHA_256),
            header_value(X_AMZ_CONTENT_SHA_256, &self.content_sha256)?,
        );
        if let Some(token) = &self.security_token {
            let mut value = header_value(X_AMZ_SECURITY_TOKEN, token)?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static(X_AMZ_SECURITY_TOKEN), value);
        }

        let mut authorization = header_value(AUTHORIZATION.as_str(), &self.authorization)?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        Ok(())
    }
}

/// The normalized form of a request that the signature is computed over
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    method: String,
    path: String,
    query: String,
    headers: BTreeMap<String, String>,
    payload_hash: String,
}

impl CanonicalRequest {
    /// Canonicalize a request; every header in `headers` becomes a signed header
    pub fn new(
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        payload_hash: &str,
    ) -> Result<Self, SigningError> {
        let mut canonical_headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in headers.iter() {
            let value = value
                .to_str()
                .map_err(|_| SigningError::InvalidHeaderValue(name.to_string()))?;
            let value = normalize_header_value(value);
            canonical_headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push(',');
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        Ok(Self {
            method: method.as_str().to_string(),
            path: canonical_path(uri.path()),
            query: canonical_query(uri.query())?,
            headers: canonical_headers,
            payload_hash: payload_hash.to_string(),
        })
    }

    /// Sorted, semicolon separated list of signed header names
    pub fn signed_headers(&self) -> String {
        self.headers.keys().cloned().collect::<Vec<_>>().join(";")
    }
}

impl fmt::Display for CanonicalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.method)?;
        writeln!(f, "{}", self.path)?;
        writeln!(f, "{}", self.query)?;
        for (name, value) in &self.headers {
            writeln!(f, "{name}:{value}")?;
        }
        writeln!(f)?;
        writeln!(f, "{}", self.signed_headers())?;
        write!(f, "{}", self.payload_hash)
    }
}

/// Signs requests for one service in one region
#[derive(Debug, Clone)]
pub struct RequestSigner {
    service: String,
    region: String,
}

impl RequestSigner {
    pub fn new(service: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            region: region.into(),
        }
    }

    /// Credential scope: `20220313/<region>/<service>/aws4_request`
    pub fn scope(&self, now: DateTime<Utc>) -> String {
        format!(
            "{}/{}/{}/{TERMINATOR}",
            format_date(now),
            self.region,
            self.service
        )
    }

    /// Produce the signing headers for a request
    ///
    /// `headers` are the outbound headers that should be covered by the
    /// signature; `host`, `x-amz-date`, `x-amz-content-sha256` and, when the
    /// credential carries one, `x-amz-security-token` are added on top.
    pub fn sign(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        payload_hash: &str,
        credential: &SigningCredential,
        now: DateTime<Utc>,
    ) -> Result<SignedRequestHeaders, SigningError> {
        let amz_date = format_iso8601(now);

        let mut signing_headers = headers.clone();
        signing_headers.remove(AUTHORIZATION);
        if !signing_headers.contains_key(HOST) {
            let authority = uri.authority().ok_or(SigningError::MissingHost)?;
            signing_headers.insert(HOST, header_value(HOST.as_str(), authority.as_str())?);
        }
        signing_headers.insert(
            HeaderName::from_static(X_AMZ_DATE),
            header_value(X_AMZ_DATE, &amz_date)?,
        );
        signing_headers.insert(
            HeaderName::from_static(X_AMZ_CONTENT_SHA_256),
            header_value(X_AMZ_CONTENT_SHA_256, payload_hash)?,
        );
        if let Some(token) = credential.session_token() {
            signing_headers.insert(
                HeaderName::from_static(X_AMZ_SECURITY_TOKEN),
                header_value(X_AMZ_SECURITY_TOKEN, token)?,
            );
        }

        let canonical = CanonicalRequest::new(method, uri, &signing_headers, payload_hash)?;
        let signature = self.signature(&canonical, credential, now)?;
        let signed_headers = canonical.signed_headers();

        let authorization = format!(
            "{ALGORITHM} Credential={}/{}, SignedHeaders={}, Signature={}",
            credential.access_key_id(),
            self.scope(now),
            signed_headers,
            signature
        );

        Ok(SignedRequestHeaders {
            amz_date,
            content_sha256: payload_hash.to_string(),
            security_token: credential.session_token().map(str::to_string),
            signed_headers,
            signature,
            authorization,
        })
    }

    /// Compute the hex signature of a canonical request
    pub fn signature(
        &self,
        canonical: &CanonicalRequest,
        credential: &SigningCredential,
        now: DateTime<Utc>,
    ) -> Result<String, SigningError> {
        let creq = canonical.to_string();
        debug!("calculated canonical request: {creq}");

        let scope = self.scope(now);
        let string_to_sign = string_to_sign(&creq, now, &scope);
        debug!("calculated string to sign: {string_to_sign}");

        let signing_key = derive_signing_key(
            &credential.secret_access_key,
            &format_date(now),
            &self.region,
            &self.service,
        )?;
        hex_hmac_sha256(&signing_key, string_to_sign.as_bytes())
    }
}

// StringToSign:
//
// AWS4-HMAC-SHA256
// 20220313T072004Z
// 20220313/<region>/<service>/aws4_request
// <hashed_canonical_request>
fn string_to_sign(canonical_request: &str, now: DateTime<Utc>, scope: &str) -> String {
    let mut f = String::with_capacity(128);
    let _ = writeln!(f, "{ALGORITHM}");
    let _ = writeln!(f, "{}", format_iso8601(now));
    let _ = writeln!(f, "{scope}");
    f.push_str(&hex_sha256(canonical_request.as_bytes()));
    f
}

/// Derive the per-day signing key from the secret access key
pub fn derive_signing_key(
    secret: &str,
    date: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, SigningError> {
    let secret = format!("AWS4{secret}");
    let sign_date = hmac_sha256(secret.as_bytes(), date.as_bytes())?;
    let sign_region = hmac_sha256(&sign_date, region.as_bytes())?;
    let sign_service = hmac_sha256(&sign_region, service.as_bytes())?;
    hmac_sha256(&sign_service, TERMINATOR.as_bytes())
}

/// Each segment of the wire path is encoded once more, as non-S3 services expect
fn canonical_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn canonical_query(query: Option<&str>) -> Result<String, SigningError> {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return Ok(String::new());
    };

    let mut pairs = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = urlencoding::decode(key)
                .map_err(|e| SigningError::InvalidPath(e.to_string()))?;
            let value = urlencoding::decode(value)
                .map_err(|e| SigningError::InvalidPath(e.to_string()))?;
            Ok((
                urlencoding::encode(&key).into_owned(),
                urlencoding::encode(&value).into_owned(),
            ))
        })
        .collect::<Result<Vec<(String, String)>, SigningError>>()?;
    pairs.sort();

    Ok(pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&"))
}

fn normalize_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, SigningError> {
    HeaderValue::from_str(value).map_err(|_| SigningError::InvalidHeaderValue(name.to_string()))
}

fn format_iso8601(t: DateTime<Utc>) -> String {
    t.format("%Y%m%dT%H%M%SZ").to_string()
}

fn format_date(t: DateTime<Utc>) -> String {
    t.format("%Y%m%d").to_string()
}
