use super::handlers::{health, login};
use crate::handshake::{HandshakeState, LoginForm, Message, MessageKind, RenderInstruction};
use utoipa::OpenApi;

/// Documented routes. Static assets and `/docs` itself are left out.
#[derive(OpenApi)]
#[openapi(
    paths(health::health, login::login_form, login::login_submit),
    components(schemas(
        health::Health,
        LoginForm,
        RenderInstruction,
        HandshakeState,
        Message,
        MessageKind
    )),
    tags(
        (name = "login", description = "Bridge account login handshake"),
        (name = "health", description = "Service and registry health")
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_login_routes() {
        let doc = openapi();
        assert!(doc.paths.paths.contains_key("/login"));
        assert!(doc.paths.paths.contains_key("/health"));
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
    }

    #[test]
    fn document_has_render_instruction_schema() {
        let doc = openapi();
        let schemas = doc
            .components
            .as_ref()
            .map(|components| components.schemas.contains_key("RenderInstruction"));
        assert_eq!(schemas, Some(true));
    }
}
