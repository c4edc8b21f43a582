use std::fmt;

/// The two ESIOS collections this crate knows how to fetch and cache.
///
/// Both expose the same `{id}` + date-range shape over HTTP; they differ
/// only in URL prefix and in which items live under them, so one `Endpoint`
/// enum threads through the cache path layout instead of two near-identical
/// code paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Endpoint {
    Indicators,
    OfferIndicators,
}

impl Endpoint {
    /// The path segment this endpoint uses both in ESIOS URLs and in the
    /// on-disk cache layout (`<root>/<segment>/<item-id>/...`).
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Indicators => "indicators",
            Self::OfferIndicators => "offer-indicators",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}
