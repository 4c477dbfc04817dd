use utoipa::OpenApi;

use crate::error::{ErrorResponse, HealthResponse, UnhealthyResponse};
use crate::handlers;
use crate::models::{DeleteResponse, GetResponse, ListResponse, MutationResponse};

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "tagalong-api",
        version = "1.0.0",
        description = "A minimal CRUD API over a single beacon table backed by Cloud Spanner"
    ),
    paths(
        handlers::health::health_handler,
        handlers::create::create_handler,
        handlers::get::get_handler,
        handlers::list::list_handler,
        handlers::update::update_handler,
        handlers::delete::delete_handler
    ),
    components(
        schemas(
            MutationResponse,
            GetResponse,
            ListResponse,
            DeleteResponse,
            ErrorResponse,
            HealthResponse,
            UnhealthyResponse
        )
    ),
    tags(
        (name = "health", description = "Health check operations"),
        (name = "items", description = "Item CRUD operations")
    )
)]
pub struct ApiDoc;
