use crate::domain::model::Source;
use crate::domain::ports::AuthApplier;
use crate::utils::error::{IngestError, Result};

/// 不加任何認證
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl AuthApplier for NoAuth {
    fn apply(&self, request: reqwest::RequestBuilder, _source: &Source) -> Result<reqwest::RequestBuilder> {
        Ok(request)
    }
}

/// 依來源的 `auth` 描述套用憑證：bearer、api_key（標頭或查詢參數）、basic
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialAuth;

fn credential<'a>(source: &'a Source, key: &str) -> Result<&'a str> {
    source
        .auth
        .as_ref()
        .and_then(|auth| auth.credentials.get(key))
        .map(String::as_str)
        .ok_or_else(|| IngestError::MissingConfigError {
            field: format!("sources.{}.auth.credentials.{}", source.id, key),
        })
}

impl AuthApplier for CredentialAuth {
    fn apply(&self, request: reqwest::RequestBuilder, source: &Source) -> Result<reqwest::RequestBuilder> {
        let auth = match &source.auth {
            Some(auth) => auth,
            None => return Ok(request),
        };

        match auth.auth_type.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(request),
            "bearer" => Ok(request.bearer_auth(credential(source, "token")?)),
            "api_key" | "apikey" => {
                let key = credential(source, "key")?;
                let location = auth.credentials.get("in").map(String::as_str).unwrap_or("header");
                if location.eq_ignore_ascii_case("query") {
                    let param = auth.credentials.get("param").map(String::as_str).unwrap_or("api_key");
                    Ok(request.query(&[(param, key)]))
                } else {
                    let header = auth.credentials.get("header").map(String::as_str).unwrap_or("X-API-Key");
                    Ok(request.header(header, key))
                }
            }
            "basic" => {
                let username = credential(source, "username")?;
                let password = auth.credentials.get("password");
                Ok(request.basic_auth(username, password))
            }
            other => Err(IngestError::InvalidConfigValueError {
                field: format!("sources.{}.auth.auth_type", source.id),
                value: other.to_string(),
                reason: "Expected one of: none, bearer, api_key, basic".to_string(),
            }),
        }
    }
}
