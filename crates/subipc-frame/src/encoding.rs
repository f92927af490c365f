//! Payload encoding tags carried in every frame header.

/// Reference-graph encoding used by the `advanced` profile.
pub const ENCODING_ADVANCED: u16 = 1;

/// Plain JSON text used by the `json` profile.
pub const ENCODING_JSON: u16 = 2;

/// Returns a human-readable name for an encoding tag.
pub fn encoding_name(tag: u16) -> &'static str {
    match tag {
        ENCODING_ADVANCED => "advanced",
        ENCODING_JSON => "json",
        _ => "unknown",
    }
}
