use crate::collect::global_variables::FIELD_LEVEL_MAPS_VERSION;
use crate::collect::http::ProxyConfig;

/// Credentials and server origin for one pipeline run.
///
/// Supplied by the authentication collaborator and read-only afterwards:
/// an expired token is not refreshed, downstream calls simply fail.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub access_token: String,
    /// Bridge server origin, e.g. `https://bridge.geosys-na.com`
    pub base_url: String,
    pub proxy: Option<ProxyConfig>,
}

impl SessionContext {
    pub fn new(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            proxy: None,
        }
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = proxy.is_enabled().then_some(proxy);
        self
    }

    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Root of the field-level-maps API, without trailing slash.
    pub fn field_level_maps_url(&self) -> String {
        format!(
            "{}/field-level-maps/v{}",
            self.base_url, FIELD_LEVEL_MAPS_VERSION
        )
    }

    /// Joins path segments under the field-level-maps root.
    pub fn full_url<S: AsRef<str>>(&self, segments: &[S]) -> String {
        let mut url = self.field_level_maps_url();
        for segment in segments {
            url.push('/');
            url.push_str(segment.as_ref());
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_url() {
        let session = SessionContext::new("token", "https://bridge.geosys-na.com/");
        assert_eq!(
            session.full_url(&["maps", "base-reference-map", "INSEASON_NDVI"]),
            "https://bridge.geosys-na.com/field-level-maps/v4/maps/base-reference-map/INSEASON_NDVI"
        );
        assert_eq!(session.authorization(), "Bearer token");
    }

    #[test]
    fn test_disabled_proxy_is_dropped() {
        let session = SessionContext::new("t", "https://x").with_proxy(ProxyConfig::default());
        assert!(session.proxy.is_none());
    }
}
