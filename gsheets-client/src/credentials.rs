use crate::{
    Error,
    Result,
};
use base64::{
    engine::general_purpose::URL_SAFE_NO_PAD,
    Engine as _,
};
use chrono::{
    DateTime,
    Utc,
};
use ring::{
    rand::SystemRandom,
    signature::{
        RsaKeyPair,
        RSA_PKCS1_SHA256,
    },
};
use serde::{
    Deserialize,
    Serialize,
};
use rustls_pemfile::Item;
use std::{
    fmt,
    io::Cursor,
    path::Path,
};

/// Scopes requested for the access token. Sheets for reading and writing cells, Drive for
/// opening documents shared with the service account.
pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;

/// The JSON key file downloaded for a Google Cloud service account.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    pub token_uri: String,
}

// Keeps the private key out of logs.
impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Serialize)]
struct Header<'a> {
    alg: &'static str,
    typ: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'a str>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Bearer token returned by the token endpoint.
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::KeyFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let key: Self = serde_json::from_str(content).map_err(|e| Error::Credentials(e.to_string()))?;
        if let Some(key_type) = key.key_type.as_deref() {
            if key_type != "service_account" {
                return Err(Error::Credentials(format!(
                    "expected a service_account key, got {key_type:?}"
                )));
            }
        }
        Ok(key)
    }

    /// Build the signed JWT assertion for the token endpoint.
    pub(crate) fn assertion(&self, issued_at: DateTime<Utc>) -> Result<String> {
        let header = Header {
            alg: "RS256",
            typ: "JWT",
            kid: self.private_key_id.as_deref(),
        };
        let claims = Claims {
            iss: &self.client_email,
            scope: SCOPES.join(" "),
            aud: &self.token_uri,
            iat: issued_at.timestamp(),
            exp: issued_at.timestamp() + TOKEN_LIFETIME_SECS,
        };

        let header = serde_json::to_vec(&header).map_err(|e| Error::Credentials(e.to_string()))?;
        let claims = serde_json::to_vec(&claims).map_err(|e| Error::Credentials(e.to_string()))?;
        let message = format!("{}.{}", URL_SAFE_NO_PAD.encode(header), URL_SAFE_NO_PAD.encode(claims));

        let key_pair = self.key_pair()?;
        let mut signature = vec![0; key_pair.public().modulus_len()];
        key_pair
            .sign(&RSA_PKCS1_SHA256, &SystemRandom::new(), message.as_bytes(), &mut signature)
            .map_err(|_| Error::Signing)?;

        Ok(format!("{message}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Parse `private_key`, which Google issues as PKCS#8 PEM. PKCS#1 (`BEGIN RSA PRIVATE KEY`)
    /// is accepted too.
    fn key_pair(&self) -> Result<RsaKeyPair> {
        let mut reader = Cursor::new(self.private_key.as_bytes());
        let item = rustls_pemfile::read_one(&mut reader)
            .map_err(|e| Error::Credentials(format!("private_key is not valid PEM: {e}")))?;
        match item {
            Some(Item::Pkcs8Key(der)) => RsaKeyPair::from_pkcs8(der.secret_pkcs8_der())
                .map_err(|e| Error::Credentials(format!("unusable PKCS#8 private key: {e}"))),
            Some(Item::Pkcs1Key(der)) => RsaKeyPair::from_der(der.secret_pkcs1_der())
                .map_err(|e| Error::Credentials(format!("unusable PKCS#1 private key: {e}"))),
            Some(_) => Err(Error::Credentials("private_key is not an RSA private key".to_string())),
            None => Err(Error::Credentials("private_key holds no PEM section".to_string())),
        }
    }

    /// Exchange a freshly signed assertion for an access token.
    pub async fn fetch_token(&self, http: &reqwest::Client) -> Result<AccessToken> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;

        debug!(client_email = %self.client_email, token_uri = %self.token_uri, "requesting access token");
        let response = http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                method: "POST",
                url: self.token_uri.clone(),
                status,
                body,
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(AccessToken {
            token: token.access_token,
            expires_at: now + chrono::Duration::seconds(token.expires_in.unwrap_or(TOKEN_LIFETIME_SECS)),
        })
    }
}
