//! OpenAPI document for the Weir API.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::ApiErrorBody;
use crate::routes::{claims, dlq, pools, worker};

/// The aggregated OpenAPI document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weir API",
        description = "Burst-to-queue ledger intake: claims, worker trigger, DLQ admin, seeding",
    ),
    paths(
        claims::claim,
        worker::drain,
        dlq::list,
        dlq::replay,
        dlq::discard,
        pools::create_slots,
        pools::slot_summary,
        pools::put_config,
        pools::get_config,
    ),
    components(schemas(
        ApiErrorBody,
        claims::ClaimRequest,
        claims::ClaimResponse,
        worker::DrainResponse,
        dlq::DlqMessageView,
        dlq::DlqListResponse,
        dlq::DlqSelection,
        dlq::ReplayResponse,
        dlq::DiscardResponse,
        pools::CreateSlotsRequest,
        pools::CreateSlotsResponse,
        pools::PoolConfigBody,
        pools::SlotSummaryResponse,
    )),
    modifiers(&BearerSchemes),
    tags(
        (name = "Claims", description = "Caller-facing claim operation"),
        (name = "Worker", description = "Bridge worker trigger"),
        (name = "DLQ Admin", description = "Dead-letter queue administration"),
        (name = "Seeding", description = "Operator provisioning"),
    )
)]
pub struct ApiDoc;

/// Registers the two bearer credentials as security schemes.
struct BearerSchemes;

impl Modify for BearerSchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let bearer = || {
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .build(),
            )
        };
        components.add_security_scheme("workerAuth", bearer());
        components.add_security_scheme("adminAuth", bearer());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_builds_and_lists_routes() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string(&doc).expect("openapi serializes");
        assert!(json.contains("/api/v1/pools/{pool_id}/claims"));
        assert!(json.contains("/api/v1/worker/drain"));
        assert!(json.contains("/api/v1/dlq"));
    }

    #[test]
    fn document_registers_security_schemes() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("workerAuth"));
        assert!(components.security_schemes.contains_key("adminAuth"));
    }
}
