use utoipa::openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::HealthResponse;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Podcast Proxy API",
        version = "1.0.0"
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "feed", description = "Feed rewriting endpoints"),
        (name = "proxy", description = "Media relay endpoints"),
        (name = "system", description = "Service endpoints")
    ),
    components(schemas(HealthResponse))
)]
pub struct ApiDoc;

/// Registers the accepted credential kinds
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::new("apikey"))),
        );
        components.add_security_scheme("bearer", SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)));
        components.add_security_scheme("basic", SecurityScheme::Http(Http::new(HttpAuthScheme::Basic)));
    }
}
