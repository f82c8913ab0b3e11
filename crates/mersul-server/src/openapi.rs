use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mersul API",
        version = "0.3.0",
        description = "Live CFR train itineraries and station boards scraped from the Infofer timetable."
    ),
    paths(
        crate::routes::train_v1,
        crate::routes::cached_trains,
        crate::routes::train_v2,
        crate::routes::known_trains,
        crate::routes::station_v2,
        crate::routes::known_stations,
        crate::routes::itineraries_v3,
        crate::routes::train_schema_v1,
        crate::routes::train_schema_v2,
        crate::routes::station_schema_v2,
        crate::routes::itineraries_schema_v3,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::TrainListingResponse,
        crate::dto::StationListingResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "v1", description = "Legacy train documents with H:MM times"),
        (name = "v2", description = "Train and station documents with ISO 8601 timestamps"),
        (name = "v3", description = "Itinerary search between two stations"),
        (name = "schemas", description = "JSON Schemas of the published documents"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;
