/// Field and column name constants for the flow map datasets.
/// Single source of truth for the JSON loaders, the CSV loader and the
/// DataFrame exports.

// ── Trajectory fields ───────────────────────────────────────────────────────
pub mod trajectory {
    pub const ORIGIN: &str = "ORIGINE";
    pub const DESTINATION: &str = "DESTINATION";
    pub const ORIGIN_CAPACITY: &str = "ORIGINE_CAPACITE";
    pub const DESTINATION_CAPACITY: &str = "DESTINATION_CAPACITE";
    pub const QUANTITY: &str = "QUANTITE";
    pub const UNIT: &str = "UNITE";
    pub const ORIGIN_LAT: &str = "LAT01";
    pub const ORIGIN_LON: &str = "LONG01";
    pub const DESTINATION_LAT: &str = "LAT02";
    pub const DESTINATION_LON: &str = "LONG02";

    pub const REQUIRED: [&str; 10] = [
        ORIGIN,
        DESTINATION,
        ORIGIN_CAPACITY,
        DESTINATION_CAPACITY,
        QUANTITY,
        UNIT,
        ORIGIN_LAT,
        ORIGIN_LON,
        DESTINATION_LAT,
        DESTINATION_LON,
    ];
}

// ── Sector fields ───────────────────────────────────────────────────────────
pub mod sector {
    pub const NAME: &str = "secteur";
    pub const COLOR: &str = "color";
    pub const POLYGON: &str = "polygone";
}

// ── Aggregated edge table ───────────────────────────────────────────────────
pub mod edge {
    pub const ORIGIN: &str = "origin";
    pub const DESTINATION: &str = "destination";
    pub const QUANTITY: &str = "quantity";
    pub const UNIT: &str = "unit";
    pub const RECORD_COUNT: &str = "record_count";
    pub const DISTANCE_KM: &str = "distance_km";
}

// ── Summary tables ──────────────────────────────────────────────────────────
pub mod summary {
    /// The other end of the flow: destination for outgoing, origin for incoming.
    pub const SITE: &str = "site";
    pub const QUANTITY: &str = "quantity";
    pub const UNIT: &str = "unit";
    pub const DISTANCE_KM: &str = "distance_km";
    pub const TOTAL: &str = "total";
}
