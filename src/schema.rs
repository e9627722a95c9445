/// Column-name constants for the housing pipeline tables.
/// Single source of truth - exported to Python via PyO3.

// ── Source spreadsheet columns ──────────────────────────────────────────────
pub mod project {
    pub const NAME: &str = "Project";
    pub const ADDRESS: &str = "Property address";
    pub const STATUS: &str = "Status";
    pub const OCCUPANCY: &str = "Occupancy";
    pub const MARKET_RATE_RENTALS: &str = "Market Rate Rentals";
    pub const AFFORDABLE_RENTALS: &str = "Affordable Rentals";
    pub const MARKET_RATE_OWNER: &str = "Market Rate Owner";
    pub const AFFORDABLE_OWNER: &str = "Affordable Owner";
    pub const TOTAL_UNITS: &str = "Total units";
    pub const LATITUDE: &str = "Latitude";
    pub const LONGITUDE: &str = "Longitude";
    pub const MARKET_RATE_FLAG: &str = "Market rate";
    pub const CITY_PROJECT_INFO: &str = "City project info";
    pub const MEDIA: &str = "Media";
    pub const NOTES: &str = "Notes";

    /// Raw unit-count inputs, coerced to non-negative integers.
    pub const UNIT_INPUTS: [&str; 5] = [
        MARKET_RATE_RENTALS,
        AFFORDABLE_RENTALS,
        MARKET_RATE_OWNER,
        AFFORDABLE_OWNER,
        TOTAL_UNITS,
    ];

    /// Columns a fetched sheet must carry to be considered tabular project data.
    pub const REQUIRED: [&str; 7] = [
        NAME,
        OCCUPANCY,
        MARKET_RATE_RENTALS,
        AFFORDABLE_RENTALS,
        MARKET_RATE_OWNER,
        AFFORDABLE_OWNER,
        TOTAL_UNITS,
    ];
}

// ── Derived per-project columns ─────────────────────────────────────────────
pub mod derived {
    pub const RENTAL_UNITS: &str = "Rental Units";
    pub const OWNER_UNITS: &str = "Owner Units";
    pub const AFFORDABLE_UNITS: &str = "Affordable Units";
    pub const MARKET_RATE_UNITS: &str = "Market Rate Units";
    pub const MARKET_RENTALS: &str = "Market Rentals";
    pub const NON_MARKET_RENTALS: &str = "Non-Market Rentals";
    pub const AFFORDABILITY_RATIO: &str = "Affordability Ratio";
    pub const MOVE_IN_YEAR: &str = "Move-in Year";
}

// ── Yearly aggregate columns ────────────────────────────────────────────────
pub mod yearly {
    use super::{derived, project};

    pub const YEAR: &str = derived::MOVE_IN_YEAR;

    pub const CUMULATIVE_RENTALS: &str = "Cumulative Rentals";
    pub const CUMULATIVE_OWNER: &str = "Cumulative Owner";
    pub const CUMULATIVE_TOTAL: &str = "Cumulative Total";
    pub const CUMULATIVE_AFFORDABLE: &str = "Cumulative Affordable";
    pub const CUMULATIVE_MARKET_RATE: &str = "Cumulative Market Rate";
    pub const CUMULATIVE_MARKET_RENTALS: &str = "Cumulative Market Rentals";
    pub const CUMULATIVE_NON_MARKET_RENTALS: &str = "Cumulative Non-Market Rentals";

    /// (per-year sum column, cumulative column), in output order.
    pub const SUMMED: [(&str, &str); 7] = [
        (derived::RENTAL_UNITS, CUMULATIVE_RENTALS),
        (derived::OWNER_UNITS, CUMULATIVE_OWNER),
        (project::TOTAL_UNITS, CUMULATIVE_TOTAL),
        (derived::AFFORDABLE_UNITS, CUMULATIVE_AFFORDABLE),
        (derived::MARKET_RATE_UNITS, CUMULATIVE_MARKET_RATE),
        (derived::MARKET_RENTALS, CUMULATIVE_MARKET_RENTALS),
        (derived::NON_MARKET_RENTALS, CUMULATIVE_NON_MARKET_RENTALS),
    ];
}
